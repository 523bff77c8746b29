use std::collections::HashMap;
use std::sync::Once;

use chrono::NaiveDate;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tracing::log::LevelFilter;

use crate::auth::{User, create_user, get_user};
use crate::build_rocket;
use crate::config::AppConfig;
use crate::db::{Exercises, WorkoutExercises, WorkoutSessions, WorkoutSets};
use crate::error::AppError;
use crate::models::{
    Exercise, ExerciseInsert, ExerciseType, WorkoutExercise, WorkoutExerciseInsert,
    WorkoutSession, WorkoutSessionInsert, WorkoutSet, WorkoutSetInsert,
};

static INIT: Once = Once::new();
pub static STANDARD_PASSWORD: &str = "password123";

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// One connection only: every connection to `sqlite::memory:` opens its own
/// empty database.
pub async fn memory_pool() -> Result<Pool<Sqlite>, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

struct TestExercise {
    owner: String,
    name: String,
    exercise_type: ExerciseType,
}

#[derive(Default)]
pub struct TestDbBuilder {
    users: Vec<String>,
    exercises: Vec<TestExercise>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, email: &str) -> Self {
        self.users.push(email.to_string());
        self
    }

    pub fn exercise(mut self, owner: &str, name: &str, exercise_type: ExerciseType) -> Self {
        self.exercises.push(TestExercise {
            owner: owner.to_string(),
            name: name.to_string(),
            exercise_type,
        });
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        init_test_logging();
        let pool = memory_pool().await?;

        let mut users: HashMap<String, User> = HashMap::new();
        for email in &self.users {
            let id = create_user(&pool, email, STANDARD_PASSWORD).await?;
            users.insert(email.clone(), get_user(&pool, id).await?);
        }

        let mut exercises: HashMap<String, Exercise> = HashMap::new();
        for exercise in self.exercises {
            let owner = users.get(&exercise.owner).ok_or_else(|| {
                AppError::NotFound(format!("Test user {} not declared", exercise.owner))
            })?;

            let created = Exercises::new(&pool, owner)
                .create(ExerciseInsert {
                    name: exercise.name.clone(),
                    notes: None,
                    exercise_type: exercise.exercise_type,
                })
                .await?;
            exercises.insert(exercise.name, created);
        }

        Ok(TestDb {
            pool,
            users,
            exercises,
        })
    }
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    users: HashMap<String, User>,
    exercises: HashMap<String, Exercise>,
}

impl TestDb {
    pub fn user(&self, email: &str) -> User {
        self.users
            .get(email)
            .cloned()
            .unwrap_or_else(|| panic!("Unknown test user {}", email))
    }

    pub fn exercise(&self, name: &str) -> Exercise {
        self.exercises
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("Unknown test exercise {}", name))
    }

    /// A strength session on 2024-01-01 holding `exercise` with one set of
    /// `reps`.
    pub async fn logged_workout(
        &self,
        email: &str,
        exercise: &str,
        reps: i64,
    ) -> (WorkoutSession, WorkoutExercise, WorkoutSet) {
        let user = self.user(email);
        let exercise = self.exercise(exercise);

        let session = WorkoutSessions::new(&self.pool, &user)
            .create(WorkoutSessionInsert {
                workout_type_id: 1,
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                notes: None,
            })
            .await
            .expect("Failed to create session");

        let workout_exercise = WorkoutExercises::new(&self.pool, &user)
            .add(WorkoutExerciseInsert {
                workout_session_id: session.id,
                exercise_id: exercise.id,
                name_snapshot: exercise.name.clone(),
                order_index: 0,
                notes: None,
            })
            .await
            .expect("Failed to add exercise");

        let set = WorkoutSets::new(&self.pool, &user)
            .add(WorkoutSetInsert {
                workout_exercise_id: workout_exercise.id,
                reps,
                weight: Some(60.0),
                ..Default::default()
            })
            .await
            .expect("Failed to add set");

        (session, workout_exercise, set)
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count rows")
    }
}

pub async fn create_standard_test_db() -> TestDb {
    TestDbBuilder::new()
        .user("alice@example.com")
        .user("bob@example.com")
        .exercise("alice@example.com", "Bench Press", ExerciseType::Strength)
        .exercise("alice@example.com", "Rowing", ExerciseType::Cardio)
        .exercise("bob@example.com", "Squat", ExerciseType::Strength)
        .build()
        .await
        .expect("Failed to build test database")
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    let rocket = build_rocket(test_db.pool.clone(), AppConfig::default());
    let client = Client::tracked(rocket)
        .await
        .expect("Failed to build Rocket client");

    (client, test_db)
}

/// Signs in through the form action; the tracked client keeps the cookie.
pub async fn login_test_user(client: &Client, email: &str, password: &str) {
    let response = client
        .post("/sign-in")
        .header(ContentType::Form)
        .body(format!("email={}&password={}", email, password))
        .dispatch()
        .await;

    assert_eq!(
        response.status(),
        Status::SeeOther,
        "Sign-in for {} failed",
        email
    );
}
