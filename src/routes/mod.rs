pub mod auth;
pub mod exercises;
pub mod workout_items;
pub mod workouts;

use rocket::Route;
use rocket::serde::json::Json;
use serde_json::{Value, json};

use crate::error::AppError;

/// Page loaders show an empty page rather than an error when a read fails.
pub(crate) fn or_empty<T: Default>(result: Result<T, AppError>, context: &str) -> T {
    result.unwrap_or_else(|err| {
        err.log_and_record(context);
        T::default()
    })
}

#[get("/health")]
pub fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn routes() -> Vec<Route> {
    routes![
        health,
        auth::sign_in_page,
        auth::sign_in,
        auth::sign_up,
        auth::sign_out,
        exercises::exercises_page,
        exercises::exercise_page,
        exercises::create_exercise,
        exercises::update_exercise,
        exercises::delete_exercise,
        workouts::index,
        workouts::history,
        workouts::toggle_from_history,
        workouts::new_workout_page,
        workouts::create_workout,
        workouts::workout_page,
        workouts::save_workout,
        workouts::delete_workout,
        workouts::toggle_workout,
        workouts::add_workout_exercise,
        workout_items::update_workout_exercise,
        workout_items::toggle_workout_exercise,
        workout_items::delete_workout_exercise,
        workout_items::add_set,
        workout_items::update_set,
        workout_items::delete_set,
    ]
}
