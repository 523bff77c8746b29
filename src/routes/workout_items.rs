use rocket::State;
use rocket::form::Form;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::db::Repositories;
use crate::forms::{NewSetForm, SetUpdateForm, ToggleForm, WorkoutExerciseForm};
use crate::models::{WorkoutExercise, WorkoutSet};
use crate::validation::{
    ActionErrorExt, ActionResult, ActionSuccess, FormValidateExt, require_user,
};

#[post("/workout-exercises/<id>/update", data = "<form>")]
pub async fn update_workout_exercise(
    id: i64,
    form: Form<WorkoutExerciseForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<WorkoutExercise>>> {
    const ACTION: &str = "update-exercise";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let payload = form.to_update().or_fail_with(ACTION, &form)?;
    let updated = Repositories::new(db, &user)
        .workout_exercises
        .update(id, payload)
        .await
        .or_fail_with(ACTION, &form)?;

    Ok(ActionSuccess::new(updated))
}

#[post("/workout-exercises/<id>/toggle-complete", data = "<form>")]
pub async fn toggle_workout_exercise(
    id: i64,
    form: Form<ToggleForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<WorkoutExercise>>> {
    const ACTION: &str = "toggle-exercise";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let updated = Repositories::new(db, &user)
        .workout_exercises
        .toggle_complete(id, form.is_completed())
        .await
        .or_fail_with(ACTION, &form)?;

    Ok(ActionSuccess::new(updated))
}

#[post("/workout-exercises/<id>/delete")]
pub async fn delete_workout_exercise(
    id: i64,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<Value>>> {
    const ACTION: &str = "delete-exercise";
    let user = require_user(user, ACTION)?;

    Repositories::new(db, &user)
        .workout_exercises
        .delete(id)
        .await
        .or_fail(ACTION)?;

    Ok(ActionSuccess::new(json!({ "id": id })))
}

#[post("/workout-exercises/<id>/sets/add", data = "<form>")]
pub async fn add_set(
    id: i64,
    form: Form<NewSetForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<WorkoutSet>>> {
    const ACTION: &str = "add-set";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let repos = Repositories::new(db, &user);
    let next_order_index = repos
        .workout_sets
        .next_order_index(id)
        .await
        .or_fail_with(ACTION, &form)?;

    let payload = form
        .to_insert(id, next_order_index)
        .or_fail_with(ACTION, &form)?;
    let set = repos
        .workout_sets
        .add(payload)
        .await
        .or_fail_with(ACTION, &form)?;

    Ok(ActionSuccess::new(set))
}

#[post("/workout-sets/<id>/update", data = "<form>")]
pub async fn update_set(
    id: i64,
    form: Form<SetUpdateForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<WorkoutSet>>> {
    const ACTION: &str = "update-set";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let payload = form.to_update().or_fail_with(ACTION, &form)?;
    let set = Repositories::new(db, &user)
        .workout_sets
        .update(id, payload)
        .await
        .or_fail_with(ACTION, &form)?;

    Ok(ActionSuccess::new(set))
}

#[post("/workout-sets/<id>/delete")]
pub async fn delete_set(
    id: i64,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<Value>>> {
    const ACTION: &str = "delete-set";
    let user = require_user(user, ACTION)?;

    Repositories::new(db, &user)
        .workout_sets
        .delete(id)
        .await
        .or_fail(ACTION)?;

    Ok(ActionSuccess::new(json!({ "id": id })))
}
