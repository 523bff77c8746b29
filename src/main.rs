#[macro_use]
extern crate rocket;

mod auth;
mod config;
mod db;
mod error;
mod forms;
mod models;
mod routes;
mod security;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use std::time::Duration;

use anyhow::Context;
use auth::{clean_expired_sessions, forbidden, not_found, unauthorized};
use config::{AppConfig, load_environment};
use error::AppError;
use rocket::{Build, Rocket, tokio};
use security::SecurityHeaders;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::{error, info};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(#[from] rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("Rocket error: {0}")]
    Rocket(#[from] rocket::Error),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    if let Err(err) = load_environment() {
        eprintln!("Failed to load environment files: {}", err);
    }
    init_tracing();

    let config = AppConfig::load()?;
    info!(database_url = %config.database_url, "Connecting to database");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_url))?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    spawn_session_cleanup(pool.clone());

    let result = build_rocket(pool, config).launch().await;
    shutdown_telemetry();
    result?;

    Ok(())
}

fn spawn_session_cleanup(pool: SqlitePool) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(SESSION_CLEANUP_INTERVAL).await;
        }
    });
}

pub fn build_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting workout tracker");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount("/", routes::routes())
        .register("/", catchers![unauthorized, forbidden, not_found])
        .attach(TelemetryFairing)
        .attach(SecurityHeaders)
}
