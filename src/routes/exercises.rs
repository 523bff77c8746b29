use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::User;
use crate::db::Exercises;
use crate::forms::ExerciseForm;
use crate::models::Exercise;
use crate::routes::or_empty;
use crate::validation::{
    ActionErrorExt, ActionResult, ActionSuccess, FormValidateExt, require_user,
};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExercisesPage {
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExercisePage {
    pub exercise: Option<Exercise>,
}

#[get("/exercises")]
pub async fn exercises_page(user: Option<User>, db: &State<Pool<Sqlite>>) -> Json<ExercisesPage> {
    let Some(user) = user else {
        return Json(ExercisesPage::default());
    };

    let exercises = or_empty(
        Exercises::new(db, &user).list().await,
        "Loading exercises",
    );
    Json(ExercisesPage { exercises })
}

#[get("/exercises/<id>")]
pub async fn exercise_page(id: i64, user: User, db: &State<Pool<Sqlite>>) -> Json<ExercisePage> {
    let exercise = or_empty(
        Exercises::new(db, &user).get_by_id(id).await,
        "Loading exercise",
    );
    Json(ExercisePage { exercise })
}

#[post("/exercises/create", data = "<form>")]
pub async fn create_exercise(
    form: Form<ExerciseForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<Exercise>>> {
    const ACTION: &str = "create";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let payload = form.to_insert().or_fail_with(ACTION, &form)?;
    let exercise = Exercises::new(db, &user)
        .create(payload)
        .await
        .or_fail_with(ACTION, &form)?;

    info!(exercise_id = exercise.id, "Exercise created");
    Ok(ActionSuccess::new(exercise))
}

#[post("/exercises/<id>/update", data = "<form>")]
pub async fn update_exercise(
    id: i64,
    form: Form<ExerciseForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Redirect> {
    const ACTION: &str = "update";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let payload = form.to_update().or_fail_with(ACTION, &form)?;
    Exercises::new(db, &user)
        .update(id, payload)
        .await
        .or_fail_with(ACTION, &form)?;

    Ok(Redirect::to("/exercises"))
}

#[post("/exercises/<id>/delete")]
pub async fn delete_exercise(
    id: i64,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Redirect> {
    const ACTION: &str = "delete";
    let user = require_user(user, ACTION)?;

    Exercises::new(db, &user).delete(id).await.or_fail(ACTION)?;

    Ok(Redirect::to("/exercises"))
}
