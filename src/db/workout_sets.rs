use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::auth::User;
use crate::db::ownership::{Owned, ensure_all_owned, ensure_owned, owner_of};
use crate::db::patch::{Patch, push_id_list};
use crate::error::AppError;
use crate::models::{WorkoutSet, WorkoutSetInsert, WorkoutSetUpdate};

const SET_COLUMNS: &str =
    "id, workout_exercise_id, reps, weight, calories, distance, order_index, created_at";

/// Sets belong to a workout exercise; ownership is proven through
/// set -> workout exercise -> session before anything is read or written.
pub struct WorkoutSets<'r> {
    pool: &'r Pool<Sqlite>,
    user: &'r User,
}

impl<'r> WorkoutSets<'r> {
    pub fn new(pool: &'r Pool<Sqlite>, user: &'r User) -> Self {
        Self { pool, user }
    }

    /// Every set in the user's sessions, grouped by exercise and ordered
    /// within each.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn list(&self) -> Result<Vec<WorkoutSet>, AppError> {
        info!("Listing workout sets");
        let rows = sqlx::query_as::<_, WorkoutSet>(
            "SELECT ws.id AS id, ws.workout_exercise_id AS workout_exercise_id, ws.reps AS reps,
                    ws.weight AS weight, ws.calories AS calories, ws.distance AS distance,
                    ws.order_index AS order_index, ws.created_at AS created_at
             FROM workout_sets ws
             JOIN workout_exercises we ON we.id = ws.workout_exercise_id
             JOIN workout_sessions s ON s.id = we.workout_session_id
             WHERE s.user_id = ?
             ORDER BY ws.workout_exercise_id ASC, ws.order_index ASC, ws.id ASC",
        )
        .bind(self.user.id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn list_for_exercise(&self, workout_exercise_id: i64) -> Result<Vec<WorkoutSet>, AppError> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, self.user, Owned::WorkoutExercise, workout_exercise_id).await?;

        fetch_for_exercises(&mut conn, &[workout_exercise_id]).await
    }

    /// `None` both when the set is missing and when someone else owns it.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<WorkoutSet>, AppError> {
        let mut conn = self.pool.acquire().await?;
        if owner_of(&mut conn, Owned::WorkoutSet, id).await? != Some(self.user.id) {
            return Ok(None);
        }

        fetch_one(&mut conn, id).await
    }

    #[instrument(skip(self, payload), fields(user_id = self.user.id))]
    pub async fn add(&self, payload: WorkoutSetInsert) -> Result<WorkoutSet, AppError> {
        info!("Adding workout set");
        let mut conn = self.pool.acquire().await?;
        ensure_owned(
            &mut conn,
            self.user,
            Owned::WorkoutExercise,
            payload.workout_exercise_id,
        )
        .await?;

        let sql = format!(
            "INSERT INTO workout_sets
                (workout_exercise_id, reps, weight, calories, distance, order_index)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {SET_COLUMNS}"
        );

        let row = sqlx::query_as::<_, WorkoutSet>(&sql)
            .bind(payload.workout_exercise_id)
            .bind(payload.reps)
            .bind(payload.weight)
            .bind(payload.calories)
            .bind(payload.distance)
            .bind(payload.order_index)
            .fetch_one(&mut *conn)
            .await?;

        Ok(row)
    }

    #[instrument(skip(self, payload), fields(user_id = self.user.id))]
    pub async fn update(&self, id: i64, payload: WorkoutSetUpdate) -> Result<WorkoutSet, AppError> {
        info!("Updating workout set");
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, self.user, Owned::WorkoutSet, id).await?;

        let mut patch = Patch::new("workout_sets");
        patch
            .set("reps", payload.reps)
            .set("weight", payload.weight)
            .set("calories", payload.calories)
            .set("distance", payload.distance)
            .set("order_index", payload.order_index);

        let row = if patch.is_empty() {
            fetch_one(&mut conn, id).await?
        } else {
            let mut query = patch.finish(id, None);
            query.push(format!(" RETURNING {SET_COLUMNS}"));
            query
                .build_query_as::<WorkoutSet>()
                .fetch_optional(&mut *conn)
                .await?
        };

        row.ok_or_else(|| AppError::NotFound(format!("Workout set {} not found", id)))
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        info!("Deleting workout set");
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, self.user, Owned::WorkoutSet, id).await?;

        delete_sets(&mut conn, &[id]).await?;
        Ok(())
    }

    /// Ownership for the whole batch is settled before the single delete.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn delete_many(&self, ids: &[i64]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }

        info!("Deleting workout sets");
        let mut conn = self.pool.acquire().await?;
        let existing = ensure_all_owned(&mut conn, self.user, Owned::WorkoutSet, ids).await?;

        delete_sets(&mut conn, &existing).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn next_order_index(&self, workout_exercise_id: i64) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, self.user, Owned::WorkoutExercise, workout_exercise_id).await?;

        let next = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(order_index), -1) + 1 FROM workout_sets WHERE workout_exercise_id = ?",
        )
        .bind(workout_exercise_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(next)
    }
}

async fn fetch_one(conn: &mut SqliteConnection, id: i64) -> Result<Option<WorkoutSet>, AppError> {
    let sql = format!("SELECT {SET_COLUMNS} FROM workout_sets WHERE id = ?");

    Ok(sqlx::query_as::<_, WorkoutSet>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub(crate) async fn fetch_for_exercises(
    conn: &mut SqliteConnection,
    workout_exercise_ids: &[i64],
) -> Result<Vec<WorkoutSet>, AppError> {
    if workout_exercise_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
        "SELECT {SET_COLUMNS} FROM workout_sets WHERE workout_exercise_id IN "
    ));
    push_id_list(&mut query, workout_exercise_ids);
    query.push(" ORDER BY order_index ASC, id ASC");

    Ok(query
        .build_query_as::<WorkoutSet>()
        .fetch_all(&mut *conn)
        .await?)
}

pub(crate) async fn delete_sets(conn: &mut SqliteConnection, ids: &[i64]) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("DELETE FROM workout_sets WHERE id IN ");
    push_id_list(&mut query, ids);

    Ok(query.build().execute(&mut *conn).await?.rows_affected())
}

/// Removes every set hanging off the given workout exercises.
pub(crate) async fn delete_sets_of_exercises(
    conn: &mut SqliteConnection,
    workout_exercise_ids: &[i64],
) -> Result<u64, AppError> {
    if workout_exercise_ids.is_empty() {
        return Ok(0);
    }

    let mut query: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("DELETE FROM workout_sets WHERE workout_exercise_id IN ");
    push_id_list(&mut query, workout_exercise_ids);

    Ok(query.build().execute(&mut *conn).await?.rows_affected())
}
