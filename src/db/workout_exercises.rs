use std::collections::HashMap;

use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::auth::User;
use crate::db::ownership::{Owned, ensure_all_owned, ensure_owned, owner_of};
use crate::db::patch::{Patch, push_id_list};
use crate::db::workout_sets::{delete_sets_of_exercises, fetch_for_exercises};
use crate::error::AppError;
use crate::models::{WorkoutExercise, WorkoutExerciseInsert, WorkoutExerciseUpdate, WorkoutSet};

/// Workout exercise columns joined with the source exercise's type.
const EXERCISE_SELECT: &str = "SELECT we.id AS id, we.workout_session_id AS workout_session_id,
        we.exercise_id AS exercise_id, we.name_snapshot AS name_snapshot, we.notes AS notes,
        we.is_completed AS is_completed, we.order_index AS order_index,
        we.created_at AS created_at, e.exercise_type AS exercise_type
    FROM workout_exercises we
    LEFT JOIN exercises e ON e.id = we.exercise_id";

/// Exercises as logged inside a workout session, not the exercise
/// definitions. Ownership is proven through the parent session.
pub struct WorkoutExercises<'r> {
    pool: &'r Pool<Sqlite>,
    user: &'r User,
}

impl<'r> WorkoutExercises<'r> {
    pub fn new(pool: &'r Pool<Sqlite>, user: &'r User) -> Self {
        Self { pool, user }
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn list(&self) -> Result<Vec<WorkoutExercise>, AppError> {
        info!("Listing workout exercises");
        let sql = format!(
            "{EXERCISE_SELECT}
             JOIN workout_sessions s ON s.id = we.workout_session_id
             WHERE s.user_id = ?
             ORDER BY we.workout_session_id ASC, we.order_index ASC, we.id ASC"
        );

        let mut conn = self.pool.acquire().await?;
        let mut rows = sqlx::query_as::<_, WorkoutExercise>(&sql)
            .bind(self.user.id)
            .fetch_all(&mut *conn)
            .await?;

        attach_sets(&mut conn, &mut rows).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn list_for_session(
        &self,
        workout_session_id: i64,
    ) -> Result<Vec<WorkoutExercise>, AppError> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, self.user, Owned::WorkoutSession, workout_session_id).await?;

        let mut grouped = fetch_for_sessions(&mut conn, &[workout_session_id]).await?;
        Ok(grouped.remove(&workout_session_id).unwrap_or_default())
    }

    /// `None` both when the row is missing and when someone else owns it.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<WorkoutExercise>, AppError> {
        let mut conn = self.pool.acquire().await?;
        if owner_of(&mut conn, Owned::WorkoutExercise, id).await? != Some(self.user.id) {
            return Ok(None);
        }

        fetch_one(&mut conn, id).await
    }

    #[instrument(skip(self, payload), fields(user_id = self.user.id))]
    pub async fn add(&self, payload: WorkoutExerciseInsert) -> Result<WorkoutExercise, AppError> {
        info!("Adding exercise to workout");
        let mut conn = self.pool.acquire().await?;
        ensure_owned(
            &mut conn,
            self.user,
            Owned::WorkoutSession,
            payload.workout_session_id,
        )
        .await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO workout_exercises
                (workout_session_id, exercise_id, name_snapshot, order_index, notes, is_completed)
             VALUES (?, ?, ?, ?, ?, FALSE)
             RETURNING id",
        )
        .bind(payload.workout_session_id)
        .bind(payload.exercise_id)
        .bind(payload.name_snapshot)
        .bind(payload.order_index)
        .bind(payload.notes)
        .fetch_one(&mut *conn)
        .await?;

        fetch_one(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workout exercise {} not found", id)))
    }

    #[instrument(skip(self, payload), fields(user_id = self.user.id))]
    pub async fn update(
        &self,
        id: i64,
        payload: WorkoutExerciseUpdate,
    ) -> Result<WorkoutExercise, AppError> {
        info!("Updating workout exercise");
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, self.user, Owned::WorkoutExercise, id).await?;

        let mut patch = Patch::new("workout_exercises");
        patch
            .set("name_snapshot", payload.name_snapshot)
            .set("notes", payload.notes)
            .set("is_completed", payload.is_completed)
            .set("order_index", payload.order_index);

        if !patch.is_empty() {
            patch.finish(id, None).build().execute(&mut *conn).await?;
        }

        fetch_one(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workout exercise {} not found", id)))
    }

    pub async fn toggle_complete(
        &self,
        id: i64,
        is_completed: bool,
    ) -> Result<WorkoutExercise, AppError> {
        self.update(
            id,
            WorkoutExerciseUpdate {
                is_completed: Some(is_completed),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes the exercise and its sets in one transaction.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        info!("Deleting workout exercise");
        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, self.user, Owned::WorkoutExercise, id).await?;

        delete_exercises_with_sets(&mut tx, &[id]).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn delete_many(&self, ids: &[i64]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }

        info!("Deleting workout exercises");
        let mut tx = self.pool.begin().await?;
        let existing = ensure_all_owned(&mut tx, self.user, Owned::WorkoutExercise, ids).await?;

        delete_exercises_with_sets(&mut tx, &existing).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn next_order_index(&self, workout_session_id: i64) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, self.user, Owned::WorkoutSession, workout_session_id).await?;

        let next = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(order_index), -1) + 1 FROM workout_exercises WHERE workout_session_id = ?",
        )
        .bind(workout_session_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(next)
    }
}

async fn fetch_one(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<WorkoutExercise>, AppError> {
    let sql = format!("{EXERCISE_SELECT} WHERE we.id = ?");
    let row = sqlx::query_as::<_, WorkoutExercise>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(exercise) => {
            let mut rows = vec![exercise];
            attach_sets(conn, &mut rows).await?;
            Ok(rows.pop())
        }
        None => Ok(None),
    }
}

async fn attach_sets(
    conn: &mut SqliteConnection,
    exercises: &mut [WorkoutExercise],
) -> Result<(), AppError> {
    let ids: Vec<i64> = exercises.iter().map(|e| e.id).collect();
    let mut sets_by_exercise: HashMap<i64, Vec<WorkoutSet>> = HashMap::new();
    for set in fetch_for_exercises(conn, &ids).await? {
        sets_by_exercise
            .entry(set.workout_exercise_id)
            .or_default()
            .push(set);
    }

    for exercise in exercises.iter_mut() {
        let mut sets = sets_by_exercise.remove(&exercise.id).unwrap_or_default();
        sets.sort_by_key(|s| (s.order_index, s.id));
        exercise.sets = sets;
    }

    Ok(())
}

/// Loads the exercises (with sets) of each session, keyed by session id and
/// ordered by `order_index`.
pub(crate) async fn fetch_for_sessions(
    conn: &mut SqliteConnection,
    session_ids: &[i64],
) -> Result<HashMap<i64, Vec<WorkoutExercise>>, AppError> {
    if session_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new(format!("{EXERCISE_SELECT} WHERE we.workout_session_id IN "));
    push_id_list(&mut query, session_ids);
    query.push(" ORDER BY we.order_index ASC, we.id ASC");

    let mut rows = query
        .build_query_as::<WorkoutExercise>()
        .fetch_all(&mut *conn)
        .await?;
    attach_sets(conn, &mut rows).await?;

    let mut grouped: HashMap<i64, Vec<WorkoutExercise>> = HashMap::new();
    for exercise in rows {
        grouped
            .entry(exercise.workout_session_id)
            .or_default()
            .push(exercise);
    }

    for exercises in grouped.values_mut() {
        exercises.sort_by_key(|e| (e.order_index, e.id));
    }

    Ok(grouped)
}

/// Sets first, then the exercises themselves.
pub(crate) async fn delete_exercises_with_sets(
    conn: &mut SqliteConnection,
    ids: &[i64],
) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Ok(0);
    }

    delete_sets_of_exercises(conn, ids).await?;

    let mut query: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("DELETE FROM workout_exercises WHERE id IN ");
    push_id_list(&mut query, ids);

    Ok(query.build().execute(&mut *conn).await?.rows_affected())
}
