use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in identity as the auth provider reports it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCredentials {
    pub id: i64,
    pub email: String,
    pub password: String,
}

impl From<DbCredentials> for User {
    fn from(row: DbCredentials) -> Self {
        Self {
            id: row.id,
            email: row.email,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: NaiveDateTime,
}

impl From<DbUserSession> for UserSession {
    fn from(row: DbUserSession) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token: row.token,
            created_at: row.created_at.unwrap_or_else(|| Utc::now().naive_utc()),
            expires_at: row.expires_at,
        }
    }
}

impl UserSession {
    pub fn generate_token() -> String {
        format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        )
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::UserSession;
    use chrono::{Duration, Utc};

    fn session_expiring_in(offset: Duration) -> UserSession {
        let now = Utc::now().naive_utc();
        UserSession {
            id: 1,
            user_id: 1,
            token: UserSession::generate_token(),
            created_at: now,
            expires_at: now + offset,
        }
    }

    #[test]
    fn tokens_are_long_and_unique() {
        let a = UserSession::generate_token();
        let b = UserSession::generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn validity_follows_expiry() {
        assert!(session_expiring_in(Duration::minutes(5)).is_valid());
        assert!(!session_expiring_in(Duration::minutes(-5)).is_valid());
    }
}
