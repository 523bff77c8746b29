pub mod exercises;
pub mod ownership;
pub mod patch;
pub mod workout_exercises;
pub mod workout_sessions;
pub mod workout_sets;
pub mod workout_types;

pub use exercises::Exercises;
pub use ownership::Owned;
pub use workout_exercises::WorkoutExercises;
pub use workout_sessions::{RemovedChildren, WorkoutSessions};
pub use workout_sets::WorkoutSets;
pub use workout_types::WorkoutTypes;

use sqlx::{Pool, Sqlite};

use crate::auth::User;

/// Every repository for one request, bound to the user that request
/// authenticated as. Built per request and never shared across requests.
pub struct Repositories<'r> {
    pub exercises: Exercises<'r>,
    pub workout_sessions: WorkoutSessions<'r>,
    pub workout_exercises: WorkoutExercises<'r>,
    pub workout_sets: WorkoutSets<'r>,
    pub workout_types: WorkoutTypes<'r>,
}

impl<'r> Repositories<'r> {
    pub fn new(pool: &'r Pool<Sqlite>, user: &'r User) -> Self {
        Self {
            exercises: Exercises::new(pool, user),
            workout_sessions: WorkoutSessions::new(pool, user),
            workout_exercises: WorkoutExercises::new(pool, user),
            workout_sets: WorkoutSets::new(pool, user),
            workout_types: WorkoutTypes::new(pool),
        }
    }
}
