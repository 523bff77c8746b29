use rocket::State;
use rocket::form::Form;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::User;
use crate::db::Repositories;
use crate::error::AppError;
use crate::forms::{
    AddWorkoutExerciseForm, HistoryToggleForm, NewWorkoutForm, SaveWorkoutForm, ToggleForm,
};
use crate::models::{Exercise, WorkoutExercise, WorkoutExerciseInsert, WorkoutSession, WorkoutType};
use crate::routes::or_empty;
use crate::validation::{
    ActionErrorExt, ActionResult, ActionSuccess, FormValidateExt, require_user,
};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WorkoutsPage {
    pub workouts: Vec<WorkoutSession>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NewWorkoutPage {
    pub workout_types: Vec<WorkoutType>,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkoutPage {
    pub workout: WorkoutSession,
    pub workout_types: Vec<WorkoutType>,
    pub available_exercises: Vec<Exercise>,
}

async fn load_workouts(user: Option<User>, db: &Pool<Sqlite>) -> Json<WorkoutsPage> {
    let Some(user) = user else {
        return Json(WorkoutsPage::default());
    };

    let repos = Repositories::new(db, &user);
    let workouts = or_empty(repos.workout_sessions.list().await, "Loading workouts");
    Json(WorkoutsPage { workouts })
}

#[get("/")]
pub async fn index(user: Option<User>, db: &State<Pool<Sqlite>>) -> Json<WorkoutsPage> {
    load_workouts(user, db).await
}

#[get("/history")]
pub async fn history(user: Option<User>, db: &State<Pool<Sqlite>>) -> Json<WorkoutsPage> {
    load_workouts(user, db).await
}

#[post("/history/toggle-complete", data = "<form>")]
pub async fn toggle_from_history(
    form: Form<HistoryToggleForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<WorkoutSession>>> {
    const ACTION: &str = "toggle-complete";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let workout_id = form.workout_id().or_fail_with(ACTION, &form)?;
    let workout = Repositories::new(db, &user)
        .workout_sessions
        .toggle_complete(workout_id, form.is_completed())
        .await
        .or_fail_with(ACTION, &form)?;

    Ok(ActionSuccess::new(workout))
}

#[get("/workout/new")]
pub async fn new_workout_page(user: Option<User>, db: &State<Pool<Sqlite>>) -> Json<NewWorkoutPage> {
    let Some(user) = user else {
        return Json(NewWorkoutPage::default());
    };

    let repos = Repositories::new(db, &user);
    let (types, exercises) = tokio::join!(repos.workout_types.list(), repos.exercises.list());

    Json(NewWorkoutPage {
        workout_types: or_empty(types, "Loading workout types"),
        exercises: or_empty(exercises, "Loading exercises"),
    })
}

#[post("/workout/new", data = "<form>")]
pub async fn create_workout(
    form: Form<NewWorkoutForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Redirect> {
    const ACTION: &str = "create";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let payload = form.to_insert().or_fail_with(ACTION, &form)?;
    let repos = Repositories::new(db, &user);

    let known_type = repos
        .workout_types
        .get_by_id(payload.workout_type_id)
        .await
        .or_fail_with(ACTION, &form)?;
    if known_type.is_none() {
        return Err::<Redirect, _>(AppError::Validation("Unknown workout type".to_string()))
            .or_fail_with(ACTION, &form);
    }

    let workout = repos
        .workout_sessions
        .create(payload)
        .await
        .or_fail_with(ACTION, &form)?;

    info!(workout_id = workout.id, "Workout created");
    Ok(Redirect::to(format!("/workout/{}", workout.id)))
}

/// The workout with its children in display order, plus what the editor
/// needs to change it. Someone else's workout is reported as missing.
#[get("/workout/<id>")]
pub async fn workout_page(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<WorkoutPage>, Status> {
    let repos = Repositories::new(db, &user);

    let (workout, types, exercises) = tokio::join!(
        repos.workout_sessions.get_by_id(id),
        repos.workout_types.list(),
        repos.exercises.list(),
    );

    let workout = workout
        .map_err(|err| err.to_status_with_log("Loading workout"))?
        .ok_or(Status::NotFound)?;

    Ok(Json(WorkoutPage {
        workout,
        workout_types: or_empty(types, "Loading workout types"),
        available_exercises: or_empty(exercises, "Loading exercises"),
    }))
}

#[post("/workout/<id>/save", data = "<form>")]
pub async fn save_workout(
    id: i64,
    form: Form<SaveWorkoutForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Redirect> {
    const ACTION: &str = "save";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let payload = form.to_update().or_fail_with(ACTION, &form)?;
    let removed = form.removed().or_fail_with(ACTION, &form)?;
    let repos = Repositories::new(db, &user);

    if let Some(type_id) = payload.workout_type_id {
        let known_type = repos
            .workout_types
            .get_by_id(type_id)
            .await
            .or_fail_with(ACTION, &form)?;
        if known_type.is_none() {
            return Err::<Redirect, _>(AppError::Validation("Unknown workout type".to_string()))
                .or_fail_with(ACTION, &form);
        }
    }

    repos
        .workout_sessions
        .save(id, payload, removed)
        .await
        .or_fail_with(ACTION, &form)?;

    Ok(Redirect::to("/history"))
}

#[post("/workout/<id>/delete")]
pub async fn delete_workout(
    id: i64,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Redirect> {
    const ACTION: &str = "delete";
    let user = require_user(user, ACTION)?;

    Repositories::new(db, &user)
        .workout_sessions
        .delete(id)
        .await
        .or_fail(ACTION)?;

    Ok(Redirect::to("/history"))
}

#[post("/workout/<id>/toggle-complete", data = "<form>")]
pub async fn toggle_workout(
    id: i64,
    form: Form<ToggleForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<WorkoutSession>>> {
    const ACTION: &str = "toggle-complete";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let workout = Repositories::new(db, &user)
        .workout_sessions
        .toggle_complete(id, form.is_completed())
        .await
        .or_fail_with(ACTION, &form)?;

    Ok(ActionSuccess::new(workout))
}

/// Logs an exercise into the workout under the name it has right now.
#[post("/workout/<id>/exercises/add", data = "<form>")]
pub async fn add_workout_exercise(
    id: i64,
    form: Form<AddWorkoutExerciseForm>,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> ActionResult<Json<ActionSuccess<WorkoutExercise>>> {
    const ACTION: &str = "add-exercise";
    let user = require_user(user, ACTION)?;
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let repos = Repositories::new(db, &user);
    let exercise_id = form.exercise_id().or_fail_with(ACTION, &form)?;

    let exercise = repos
        .exercises
        .get_by_id(exercise_id)
        .await
        .or_fail_with(ACTION, &form)?
        .ok_or_else(|| AppError::NotFound(format!("Exercise {} not found", exercise_id)))
        .or_fail_with(ACTION, &form)?;

    let order_index = match form.order_index().or_fail_with(ACTION, &form)? {
        Some(index) => index,
        None => repos
            .workout_exercises
            .next_order_index(id)
            .await
            .or_fail_with(ACTION, &form)?,
    };

    let added = repos
        .workout_exercises
        .add(WorkoutExerciseInsert {
            workout_session_id: id,
            exercise_id: exercise.id,
            name_snapshot: exercise.name,
            order_index,
            notes: form.notes(),
        })
        .await
        .or_fail_with(ACTION, &form)?;

    info!(workout_exercise_id = added.id, "Exercise added to workout");
    Ok(ActionSuccess::new(added))
}
