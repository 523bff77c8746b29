use rocket::State;
use rocket::form::Form;
use rocket::http::{CookieJar, Status};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::auth::{User, authenticate_user, create_user, end_session, get_user, start_session};
use crate::config::AppConfig;
use crate::forms::{SignInForm, SignUpForm};
use crate::validation::{ActionErrorExt, ActionFailure, ActionResult, FormValidateExt};

#[derive(Debug, Serialize, Deserialize)]
pub struct SignInPage {
    pub error: Option<String>,
    pub email: Option<String>,
    pub user: Option<User>,
}

#[get("/sign-in?<error>&<email>")]
pub fn sign_in_page(error: Option<String>, email: Option<String>, user: Option<User>) -> Json<SignInPage> {
    Json(SignInPage { error, email, user })
}

#[post("/sign-in", data = "<form>")]
pub async fn sign_in(
    form: Form<SignInForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ActionResult<Redirect> {
    const ACTION: &str = "sign-in";
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let values = json!({ "email": form.email });
    let (email, password) = form.credentials();

    let user = authenticate_user(db, email, password)
        .await
        .or_fail_with(ACTION, &values)?;

    match user {
        Some(user) => {
            start_session(db, cookies, &user, config.session_ttl())
                .await
                .or_fail_with(ACTION, &values)?;

            info!(user_id = user.id, "User signed in");
            Ok(Redirect::to("/"))
        }
        None => {
            warn!("Rejected sign-in attempt");
            Err(ActionFailure::new(ACTION, "Invalid login credentials")
                .with_values(&values)
                .respond(Status::BadRequest))
        }
    }
}

#[post("/sign-up", data = "<form>")]
pub async fn sign_up(
    form: Form<SignUpForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ActionResult<Redirect> {
    const ACTION: &str = "sign-up";
    let form = form.into_inner();
    form.validate_for(ACTION)?;

    let (email, password) = form.credentials();
    let user_id = create_user(db, email, password)
        .await
        .or_fail_with(ACTION, &form)?;
    let user = get_user(db, user_id).await.or_fail_with(ACTION, &form)?;

    start_session(db, cookies, &user, config.session_ttl())
        .await
        .or_fail_with(ACTION, &form)?;

    info!(user_id = user.id, "User signed up");
    Ok(Redirect::to("/"))
}

#[get("/sign-out")]
pub async fn sign_out(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Redirect {
    end_session(db, cookies).await;
    Redirect::to("/sign-in")
}
