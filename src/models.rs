use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ExerciseType {
    #[default]
    Strength,
    Cardio,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Strength => "strength",
            ExerciseType::Cardio => "cardio",
        }
    }
}

impl FromStr for ExerciseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "strength" => Ok(ExerciseType::Strength),
            "cardio" => Ok(ExerciseType::Cardio),
            other => Err(format!("Unknown exercise type: {}", other)),
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkoutType {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Exercise {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub notes: Option<String>,
    pub exercise_type: ExerciseType,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkoutSession {
    pub id: i64,
    pub user_id: i64,
    pub workout_type_id: i64,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub is_completed: bool,
    pub created_at: NaiveDateTime,
    #[sqlx(skip)]
    #[serde(default)]
    pub workout_type: Option<WorkoutType>,
    #[sqlx(skip)]
    #[serde(default)]
    pub workout_exercises: Vec<WorkoutExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkoutExercise {
    pub id: i64,
    pub workout_session_id: i64,
    pub exercise_id: Option<i64>,
    pub name_snapshot: String,
    pub notes: Option<String>,
    pub is_completed: bool,
    pub order_index: i64,
    pub created_at: NaiveDateTime,
    /// Type of the source exercise, absent once that exercise is deleted.
    #[serde(default)]
    pub exercise_type: Option<ExerciseType>,
    #[sqlx(skip)]
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkoutSet {
    pub id: i64,
    pub workout_exercise_id: i64,
    pub reps: i64,
    pub weight: Option<f64>,
    pub calories: Option<f64>,
    pub distance: Option<f64>,
    pub order_index: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ExerciseInsert {
    pub name: String,
    pub notes: Option<String>,
    pub exercise_type: ExerciseType,
}

/// Partial patch: `None` leaves a column alone. For nullable columns the
/// inner `Option` is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ExerciseUpdate {
    pub name: Option<String>,
    pub notes: Option<Option<String>>,
    pub exercise_type: Option<ExerciseType>,
}

#[derive(Debug, Clone)]
pub struct WorkoutSessionInsert {
    pub workout_type_id: i64,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutSessionUpdate {
    pub workout_type_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub notes: Option<Option<String>>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct WorkoutExerciseInsert {
    pub workout_session_id: i64,
    pub exercise_id: i64,
    pub name_snapshot: String,
    pub order_index: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutExerciseUpdate {
    pub name_snapshot: Option<String>,
    pub notes: Option<Option<String>>,
    pub is_completed: Option<bool>,
    pub order_index: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutSetInsert {
    pub workout_exercise_id: i64,
    pub reps: i64,
    pub weight: Option<f64>,
    pub calories: Option<f64>,
    pub distance: Option<f64>,
    pub order_index: i64,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutSetUpdate {
    pub reps: Option<i64>,
    pub weight: Option<Option<f64>>,
    pub calories: Option<Option<f64>>,
    pub distance: Option<Option<f64>>,
    pub order_index: Option<i64>,
}
