use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::auth::User;
use crate::db::ownership::{Owned, ensure_all_owned};
use crate::db::patch::{Patch, push_id_list};
use crate::db::workout_exercises::{delete_exercises_with_sets, fetch_for_sessions};
use crate::db::workout_sets::delete_sets;
use crate::db::workout_types::types_by_id;
use crate::error::AppError;
use crate::models::{WorkoutSession, WorkoutSessionInsert, WorkoutSessionUpdate};

const SESSION_COLUMNS: &str =
    "id, user_id, workout_type_id, date, notes, is_completed, created_at";

/// Workout sessions carry the `user_id` every child's ownership resolves to.
pub struct WorkoutSessions<'r> {
    pool: &'r Pool<Sqlite>,
    user: &'r User,
}

/// Child rows dropped from a workout while it is being edited.
#[derive(Debug, Clone, Default)]
pub struct RemovedChildren {
    pub exercise_ids: Vec<i64>,
    pub set_ids: Vec<i64>,
}

impl<'r> WorkoutSessions<'r> {
    pub fn new(pool: &'r Pool<Sqlite>, user: &'r User) -> Self {
        Self { pool, user }
    }

    /// The user's sessions, newest date first, each with its workout type
    /// and ordered exercises and sets.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn list(&self) -> Result<Vec<WorkoutSession>, AppError> {
        info!("Listing workout sessions");
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM workout_sessions
             WHERE user_id = ?
             ORDER BY date DESC, created_at DESC, id DESC"
        );

        let mut conn = self.pool.acquire().await?;
        let mut sessions = sqlx::query_as::<_, WorkoutSession>(&sql)
            .bind(self.user.id)
            .fetch_all(&mut *conn)
            .await?;

        attach_children(&mut conn, &mut sessions).await?;
        Ok(sessions)
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<WorkoutSession>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_owned(&mut conn, id, self.user.id).await
    }

    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn exists(&self, id: i64) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM workout_sessions WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(self.user.id)
        .fetch_optional(self.pool)
        .await?;

        Ok(found.is_some())
    }

    #[instrument(skip(self, payload), fields(user_id = self.user.id))]
    pub async fn create(&self, payload: WorkoutSessionInsert) -> Result<WorkoutSession, AppError> {
        info!("Creating workout session");
        let mut conn = self.pool.acquire().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO workout_sessions (user_id, workout_type_id, date, notes)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(self.user.id)
        .bind(payload.workout_type_id)
        .bind(payload.date)
        .bind(payload.notes)
        .fetch_one(&mut *conn)
        .await?;

        fetch_owned(&mut conn, id, self.user.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workout session {} not found", id)))
    }

    #[instrument(skip(self, payload), fields(user_id = self.user.id))]
    pub async fn update(
        &self,
        id: i64,
        payload: WorkoutSessionUpdate,
    ) -> Result<WorkoutSession, AppError> {
        info!("Updating workout session");
        let mut conn = self.pool.acquire().await?;
        apply_update(&mut conn, id, self.user.id, payload).await?;

        fetch_owned(&mut conn, id, self.user.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workout session {} not found", id)))
    }

    pub async fn toggle_complete(
        &self,
        id: i64,
        is_completed: bool,
    ) -> Result<WorkoutSession, AppError> {
        self.update(
            id,
            WorkoutSessionUpdate {
                is_completed: Some(is_completed),
                ..Default::default()
            },
        )
        .await
    }

    /// Removes the session with its exercises and sets, in one transaction.
    #[instrument(skip(self), fields(user_id = self.user.id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        info!("Deleting workout session");
        let mut tx = self.pool.begin().await?;

        if !owned_by(&mut tx, id, self.user.id).await? {
            return Err(AppError::NotFound(format!("Workout session {} not found", id)));
        }

        let exercise_ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM workout_exercises WHERE workout_session_id = ?",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        delete_exercises_with_sets(&mut tx, &exercise_ids).await?;

        sqlx::query("DELETE FROM workout_sessions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(self.user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Saves an edited workout: drops removed sets, then removed exercises,
    /// then patches the session. Runs in one transaction so a failure at any
    /// step leaves the workout as it was.
    #[instrument(skip(self, payload, removed), fields(user_id = self.user.id))]
    pub async fn save(
        &self,
        id: i64,
        payload: WorkoutSessionUpdate,
        removed: RemovedChildren,
    ) -> Result<WorkoutSession, AppError> {
        info!(
            removed_exercises = removed.exercise_ids.len(),
            removed_sets = removed.set_ids.len(),
            "Saving workout session"
        );
        let mut tx = self.pool.begin().await?;

        if !owned_by(&mut tx, id, self.user.id).await? {
            return Err(AppError::NotFound(format!("Workout session {} not found", id)));
        }

        let set_ids = ensure_all_owned(&mut tx, self.user, Owned::WorkoutSet, &removed.set_ids).await?;
        let exercise_ids = ensure_all_owned(
            &mut tx,
            self.user,
            Owned::WorkoutExercise,
            &removed.exercise_ids,
        )
        .await?;
        ensure_in_session(&mut tx, id, Owned::WorkoutSet, &set_ids).await?;
        ensure_in_session(&mut tx, id, Owned::WorkoutExercise, &exercise_ids).await?;

        delete_sets(&mut tx, &set_ids).await?;
        delete_exercises_with_sets(&mut tx, &exercise_ids).await?;
        apply_update(&mut tx, id, self.user.id, payload).await?;

        let saved = fetch_owned(&mut tx, id, self.user.id).await?;
        tx.commit().await?;

        saved.ok_or_else(|| AppError::NotFound(format!("Workout session {} not found", id)))
    }
}

async fn owned_by(conn: &mut SqliteConnection, id: i64, user_id: i64) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM workout_sessions WHERE id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(found.is_some())
}

/// Removed children must hang off the workout being saved, not just any
/// workout of the same user.
async fn ensure_in_session(
    conn: &mut SqliteConnection,
    session_id: i64,
    entity: Owned,
    ids: &[i64],
) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }

    let (select, id_column) = match entity {
        Owned::WorkoutSet => (
            "SELECT COUNT(*) FROM workout_sets s \
             JOIN workout_exercises we ON we.id = s.workout_exercise_id \
             WHERE we.workout_session_id != ",
            " AND s.id IN ",
        ),
        _ => (
            "SELECT COUNT(*) FROM workout_exercises we WHERE we.workout_session_id != ",
            " AND we.id IN ",
        ),
    };

    let mut query = QueryBuilder::<Sqlite>::new(select);
    query.push_bind(session_id).push(id_column);
    push_id_list(&mut query, ids);

    let outside: i64 = query.build_query_scalar().fetch_one(&mut *conn).await?;
    if outside > 0 {
        return Err(AppError::Authorization(format!(
            "Cannot remove {}s that belong to another workout",
            entity.label()
        )));
    }

    Ok(())
}

async fn apply_update(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: i64,
    payload: WorkoutSessionUpdate,
) -> Result<(), AppError> {
    let mut patch = Patch::new("workout_sessions");
    patch
        .set("workout_type_id", payload.workout_type_id)
        .set("date", payload.date)
        .set("notes", payload.notes)
        .set("is_completed", payload.is_completed);

    if patch.is_empty() {
        return Ok(());
    }

    let result = patch
        .finish(id, Some(user_id))
        .build()
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Workout session {} not found", id)));
    }

    Ok(())
}

async fn fetch_owned(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: i64,
) -> Result<Option<WorkoutSession>, AppError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM workout_sessions WHERE id = ? AND user_id = ?");
    let row = sqlx::query_as::<_, WorkoutSession>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(session) => {
            let mut sessions = vec![session];
            attach_children(conn, &mut sessions).await?;
            Ok(sessions.pop())
        }
        None => Ok(None),
    }
}

async fn attach_children(
    conn: &mut SqliteConnection,
    sessions: &mut [WorkoutSession],
) -> Result<(), AppError> {
    if sessions.is_empty() {
        return Ok(());
    }

    let types = types_by_id(conn).await?;
    let ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
    let mut exercises = fetch_for_sessions(conn, &ids).await?;

    for session in sessions.iter_mut() {
        session.workout_type = types.get(&session.workout_type_id).cloned();
        session.workout_exercises = exercises.remove(&session.id).unwrap_or_default();
    }

    Ok(())
}
