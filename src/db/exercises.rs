use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::User;
use crate::db::patch::Patch;
use crate::error::AppError;
use crate::models::{Exercise, ExerciseInsert, ExerciseUpdate};

const EXERCISE_COLUMNS: &str = "id, user_id, name, notes, exercise_type, created_at";

/// Exercise definitions. Every query is scoped to the acting user.
pub struct Exercises<'r> {
    pool: &'r Pool<Sqlite>,
    user: &'r User,
}

impl<'r> Exercises<'r> {
    pub fn new(pool: &'r Pool<Sqlite>, user: &'r User) -> Self {
        Self { pool, user }
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn list(&self) -> Result<Vec<Exercise>, AppError> {
        info!("Listing exercises");
        let sql = format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC"
        );

        let rows = sqlx::query_as::<_, Exercise>(&sql)
            .bind(self.user.id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Exercise>, AppError> {
        info!("Getting exercise");
        let sql = format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ? AND user_id = ?");

        let row = sqlx::query_as::<_, Exercise>(&sql)
            .bind(id)
            .bind(self.user.id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row)
    }

    #[instrument(skip(self, payload), fields(user_id = self.user.id))]
    pub async fn create(&self, payload: ExerciseInsert) -> Result<Exercise, AppError> {
        info!("Creating exercise");
        let sql = format!(
            "INSERT INTO exercises (user_id, name, notes, exercise_type)
             VALUES (?, ?, ?, ?)
             RETURNING {EXERCISE_COLUMNS}"
        );

        let row = sqlx::query_as::<_, Exercise>(&sql)
            .bind(self.user.id)
            .bind(payload.name)
            .bind(payload.notes)
            .bind(payload.exercise_type)
            .fetch_one(self.pool)
            .await?;

        Ok(row)
    }

    #[instrument(skip(self, payload), fields(user_id = self.user.id))]
    pub async fn update(&self, id: i64, payload: ExerciseUpdate) -> Result<Exercise, AppError> {
        info!("Updating exercise");
        let mut patch = Patch::new("exercises");
        patch
            .set("name", payload.name)
            .set("notes", payload.notes)
            .set("exercise_type", payload.exercise_type);

        let row = if patch.is_empty() {
            self.get_by_id(id).await?
        } else {
            let mut query = patch.finish(id, Some(self.user.id));
            query.push(format!(" RETURNING {EXERCISE_COLUMNS}"));
            query
                .build_query_as::<Exercise>()
                .fetch_optional(self.pool)
                .await?
        };

        row.ok_or_else(|| AppError::NotFound(format!("Exercise {} not found", id)))
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        info!("Deleting exercise");
        let result = sqlx::query("DELETE FROM exercises WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(self.user.id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Exercise {} not found", id)));
        }

        Ok(())
    }
}
