use std::collections::HashMap;

use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::WorkoutType;

const WORKOUT_TYPE_COLUMNS: &str = "id, key, name, icon";

/// Workout types are shared by every user and never written by the app.
pub struct WorkoutTypes<'r> {
    pool: &'r Pool<Sqlite>,
}

impl<'r> WorkoutTypes<'r> {
    pub fn new(pool: &'r Pool<Sqlite>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<WorkoutType>, AppError> {
        info!("Listing workout types");
        let sql = format!("SELECT {WORKOUT_TYPE_COLUMNS} FROM workout_types ORDER BY name ASC");

        Ok(sqlx::query_as::<_, WorkoutType>(&sql)
            .fetch_all(self.pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<WorkoutType>, AppError> {
        let sql = format!("SELECT {WORKOUT_TYPE_COLUMNS} FROM workout_types WHERE id = ?");

        Ok(sqlx::query_as::<_, WorkoutType>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_by_key(&self, key: &str) -> Result<Option<WorkoutType>, AppError> {
        let sql = format!("SELECT {WORKOUT_TYPE_COLUMNS} FROM workout_types WHERE key = ?");

        Ok(sqlx::query_as::<_, WorkoutType>(&sql)
            .bind(key)
            .fetch_optional(self.pool)
            .await?)
    }
}

pub(crate) async fn types_by_id(
    conn: &mut SqliteConnection,
) -> Result<HashMap<i64, WorkoutType>, AppError> {
    let sql = format!("SELECT {WORKOUT_TYPE_COLUMNS} FROM workout_types");
    let rows = sqlx::query_as::<_, WorkoutType>(&sql)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(|t| (t.id, t)).collect())
}
