//! Ownership of workout data is decided by the `user_id` on the
//! `workout_sessions` row at the top of each chain. Children carry only a
//! foreign key to their parent, so proving ownership means walking
//! set -> workout exercise -> session one hop at a time.

use std::collections::{BTreeSet, HashMap};

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{instrument, warn};

use crate::auth::User;
use crate::db::patch::push_id_list;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owned {
    WorkoutSession,
    WorkoutExercise,
    WorkoutSet,
}

#[derive(Debug)]
struct ParentLink {
    child: Owned,
    table: &'static str,
    parent_column: &'static str,
    parent: Owned,
}

const PARENT_LINKS: [ParentLink; 2] = [
    ParentLink {
        child: Owned::WorkoutSet,
        table: "workout_sets",
        parent_column: "workout_exercise_id",
        parent: Owned::WorkoutExercise,
    },
    ParentLink {
        child: Owned::WorkoutExercise,
        table: "workout_exercises",
        parent_column: "workout_session_id",
        parent: Owned::WorkoutSession,
    },
];

const ROOT_TABLE: &str = "workout_sessions";
const ROOT_OWNER_COLUMN: &str = "user_id";

impl Owned {
    fn parent_link(self) -> Option<&'static ParentLink> {
        PARENT_LINKS.iter().find(|link| link.child == self)
    }

    pub fn label(self) -> &'static str {
        match self {
            Owned::WorkoutSession => "workout session",
            Owned::WorkoutExercise => "workout exercise",
            Owned::WorkoutSet => "workout set",
        }
    }
}

/// Resolves the user owning `id`, or `None` when any hop is missing.
#[instrument(skip(conn))]
pub async fn owner_of(
    conn: &mut SqliteConnection,
    entity: Owned,
    id: i64,
) -> Result<Option<i64>, AppError> {
    let mut current = entity;
    let mut current_id = id;

    // Bounded by the link table so a bad mapping cannot loop forever.
    for _ in 0..=PARENT_LINKS.len() {
        match current.parent_link() {
            Some(link) => {
                let sql = format!(
                    "SELECT {} FROM {} WHERE id = ?",
                    link.parent_column, link.table
                );
                let parent_id = sqlx::query_scalar::<_, i64>(&sql)
                    .bind(current_id)
                    .fetch_optional(&mut *conn)
                    .await?;

                match parent_id {
                    Some(parent_id) => {
                        current = link.parent;
                        current_id = parent_id;
                    }
                    None => return Ok(None),
                }
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM {} WHERE id = ?",
                    ROOT_OWNER_COLUMN, ROOT_TABLE
                );
                let owner = sqlx::query_scalar::<_, i64>(&sql)
                    .bind(current_id)
                    .fetch_optional(&mut *conn)
                    .await?;
                return Ok(owner);
            }
        }
    }

    Err(AppError::Internal(format!(
        "Ownership chain for {} did not reach a session",
        entity.label()
    )))
}

pub async fn ensure_owned(
    conn: &mut SqliteConnection,
    user: &User,
    entity: Owned,
    id: i64,
) -> Result<(), AppError> {
    match owner_of(conn, entity, id).await? {
        Some(owner) if owner == user.id => Ok(()),
        _ => {
            warn!(user_id = user.id, entity = entity.label(), id, "Ownership check failed");
            Err(AppError::Authorization(format!(
                "Not authorized to access this {}",
                entity.label()
            )))
        }
    }
}

/// Batched form of [`ensure_owned`]: one `IN (...)` query per hop. Ids with no
/// row are dropped; any existing id whose chain ends at another user fails
/// the whole batch. Returns the ids that exist.
#[instrument(skip(conn, user), fields(user_id = user.id, count = ids.len()))]
pub async fn ensure_all_owned(
    conn: &mut SqliteConnection,
    user: &User,
    entity: Owned,
    ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let requested: BTreeSet<i64> = ids.iter().copied().collect();
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    // Maps each requested id to its ancestor at the current level.
    let mut ancestors: HashMap<i64, i64> = requested.iter().map(|id| (*id, *id)).collect();
    let mut current = entity;

    for _ in 0..=PARENT_LINKS.len() {
        let level: Vec<i64> = ancestors
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        match current.parent_link() {
            Some(link) => {
                let parents = fetch_pairs(conn, link.table, link.parent_column, &level).await?;
                ancestors.retain(|_, ancestor| match parents.get(ancestor) {
                    Some(parent) => {
                        *ancestor = *parent;
                        true
                    }
                    None => false,
                });
                current = link.parent;
            }
            None => {
                let owners = fetch_pairs(conn, ROOT_TABLE, ROOT_OWNER_COLUMN, &level).await?;
                let mut existing = Vec::with_capacity(ancestors.len());
                for (id, session_id) in &ancestors {
                    match owners.get(session_id) {
                        Some(owner) if *owner == user.id => existing.push(*id),
                        Some(_) => {
                            warn!(entity = entity.label(), id, "Batch ownership check failed");
                            return Err(AppError::Authorization(format!(
                                "Not authorized to modify one or more {}s",
                                entity.label()
                            )));
                        }
                        None => {}
                    }
                }
                existing.sort_unstable();
                return Ok(existing);
            }
        }

        if ancestors.is_empty() {
            return Ok(Vec::new());
        }
    }

    Err(AppError::Internal(format!(
        "Ownership chain for {} did not reach a session",
        entity.label()
    )))
}

async fn fetch_pairs(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    ids: &[i64],
) -> Result<HashMap<i64, i64>, AppError> {
    let mut query: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new(format!("SELECT id, {} FROM {} WHERE id IN ", column, table));
    push_id_list(&mut query, ids);

    let rows = query
        .build_query_as::<(i64, i64)>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().collect())
}
