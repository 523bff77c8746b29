use std::time::Duration;

use chrono::Utc;
use rocket::Request;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};
use tracing::{Instrument, info, warn};

use crate::error::AppError;

use super::{User, UserSession, create_user_session, invalidate_session, user_for_token};

pub const SESSION_COOKIE: &str = "session_token";

/// Upper bound on resolving the current user, retry included.
pub const SESSION_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Looks the token up once more after yielding when the first attempt misses,
/// so a session written by a sign-in that just committed is still found.
pub async fn current_user(pool: &Pool<Sqlite>, token: &str) -> Result<User, AppError> {
    let lookup = async {
        match user_for_token(pool, token).await {
            Err(AppError::Authentication(msg)) => {
                info!(reason = %msg, "Session lookup missed, retrying once");
                tokio::task::yield_now().await;
                user_for_token(pool, token).await
            }
            other => other,
        }
    };

    match tokio::time::timeout(SESSION_LOOKUP_TIMEOUT, lookup).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Authentication(
            "Timed out resolving session".to_string(),
        )),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let span = tracing::info_span!("user_auth_guard");

        async {
            let token = match request.cookies().get_private(SESSION_COOKIE) {
                Some(cookie) => cookie.value().to_string(),
                None => {
                    return Outcome::Error((
                        Status::Unauthorized,
                        AppError::Authentication("No session cookie".to_string()),
                    ));
                }
            };

            let pool = match request.rocket().state::<Pool<Sqlite>>() {
                Some(pool) => pool,
                None => {
                    tracing::error!("Database pool not found in managed state");
                    return Outcome::Error((
                        Status::InternalServerError,
                        AppError::Internal("Database pool not configured".to_string()),
                    ));
                }
            };

            match current_user(pool, &token).await {
                Ok(user) => {
                    info!(user_id = user.id, "User authenticated via session token");
                    Outcome::Success(user)
                }
                Err(AppError::Authentication(msg)) => {
                    warn!(reason = %msg, "Rejected session token");
                    Outcome::Error((Status::Unauthorized, AppError::Authentication(msg)))
                }
                Err(AppError::NotFound(msg)) => {
                    warn!(reason = %msg, "Session refers to a missing user");
                    Outcome::Error((Status::Unauthorized, AppError::Authentication(msg)))
                }
                Err(err) => {
                    err.log_and_record("Resolving current user");
                    Outcome::Error((Status::InternalServerError, err))
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Stores a new auth session for `user` and hands its token to the browser.
pub async fn start_session(
    pool: &Pool<Sqlite>,
    cookies: &CookieJar<'_>,
    user: &User,
    ttl: chrono::Duration,
) -> Result<(), AppError> {
    let token = UserSession::generate_token();
    let expires_at = Utc::now() + ttl;

    create_user_session(pool, user.id, &token, expires_at.naive_utc()).await?;

    let max_age = rocket::time::Duration::seconds(ttl.num_seconds());
    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(max_age),
    );

    Ok(())
}

pub async fn end_session(pool: &Pool<Sqlite>, cookies: &CookieJar<'_>) {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        if let Err(err) = invalidate_session(pool, cookie.value()).await {
            err.log_and_record("Invalidating session on sign-out");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE).path("/"));
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Redirect {
    warn!("Unauthenticated page request");
    Redirect::to("/sign-in")
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::Forbidden,
        Json(json!({
            "error": "Forbidden",
            "message": "You do not have access to this resource"
        })),
    )
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::NotFound,
        Json(json!({
            "error": "Not found",
            "message": "Resource not found"
        })),
    )
}
