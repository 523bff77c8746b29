use std::borrow::Cow;
use std::collections::HashMap;

use chrono::NaiveDate;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::User;
use crate::error::AppError;

/// Body of every failed form action. `values` echoes what was submitted so
/// the form can be shown again.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActionFailure {
    pub status: String,
    pub action: String,
    pub error: String,
    #[serde(default)]
    pub errors: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub values: Option<Value>,
}

pub type ActionResult<T> = Result<T, Custom<Json<ActionFailure>>>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionSuccess<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ActionSuccess<T> {
    pub fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

impl ActionFailure {
    pub fn new(action: &str, error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            action: action.to_string(),
            error: error.into(),
            errors: HashMap::new(),
            values: None,
        }
    }

    pub fn with_values<V: Serialize + ?Sized>(mut self, values: &V) -> Self {
        self.values = serde_json::to_value(values).ok();
        self
    }

    pub fn with_field_error(mut self, field: &str, message: &str) -> Self {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
        self
    }

    pub fn from_validation(action: &str, errors: &ValidationErrors) -> Self {
        let mut failure = Self::new(action, "Please correct the highlighted fields");

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            if let Some(first) = messages.first() {
                failure.error = first.clone();
            }
            // Struct-level checks land under "__all__".
            let key = if field == "__all__" { "form".to_string() } else { field.to_string() };
            failure.errors.insert(key, messages);
        }

        failure
    }

    pub fn respond(self, status: Status) -> Custom<Json<ActionFailure>> {
        Custom(status, Json(self))
    }
}

pub trait ActionErrorExt<T> {
    fn or_fail(self, action: &str) -> ActionResult<T>;
    fn or_fail_with<V: Serialize>(self, action: &str, values: &V) -> ActionResult<T>;
}

impl<T> ActionErrorExt<T> for Result<T, AppError> {
    fn or_fail(self, action: &str) -> ActionResult<T> {
        self.map_err(|err| {
            let status = err.to_status_with_log(action);
            ActionFailure::new(action, err.public_message()).respond(status)
        })
    }

    fn or_fail_with<V: Serialize>(self, action: &str, values: &V) -> ActionResult<T> {
        self.map_err(|err| {
            let status = err.to_status_with_log(action);
            ActionFailure::new(action, err.public_message())
                .with_values(values)
                .respond(status)
        })
    }
}

pub trait FormValidateExt: Validate + Serialize {
    /// Runs the form's validators; on failure echoes the submitted values
    /// back with a 400.
    #[instrument(skip(self))]
    fn validate_for(&self, action: &str) -> ActionResult<()> {
        self.validate().map_err(|errors| {
            AppError::Validation(errors.to_string()).log_and_record(action);
            ActionFailure::from_validation(action, &errors)
                .with_values(self)
                .respond(Status::BadRequest)
        })
    }
}

impl<T: Validate + Serialize> FormValidateExt for T {}

/// Actions answer a missing session with a structured 401 rather than the
/// sign-in redirect pages get.
pub fn require_user(user: Option<User>, action: &str) -> ActionResult<User> {
    user.ok_or_else(|| ActionFailure::new(action, "Not authenticated").respond(Status::Unauthorized))
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Trimmed field content; blank counts as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid("blank", "This field cannot be blank"));
    }
    Ok(())
}

pub fn positive_id(value: &str) -> Result<(), ValidationError> {
    match value.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(()),
        _ => Err(invalid("id", "Must be a valid id")),
    }
}

pub fn non_negative_integer(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    match value.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(()),
        _ => Err(invalid("integer", "Must be a whole number of 0 or more")),
    }
}

pub fn non_negative_number(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Ok(()),
        _ => Err(invalid("number", "Must be a number of 0 or more")),
    }
}

pub fn iso_date(value: &str) -> Result<(), ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| invalid("date", "Must be a date in YYYY-MM-DD format"))
}

pub fn known_exercise_type(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    value
        .parse::<crate::models::ExerciseType>()
        .map(|_| ())
        .map_err(|_| invalid("exercise_type", "Exercise type must be strength or cardio"))
}

pub fn boolean_flag(value: &str) -> Result<(), ValidationError> {
    match value.trim() {
        "" | "true" | "false" | "on" | "off" | "1" | "0" => Ok(()),
        _ => Err(invalid("boolean", "Must be true or false")),
    }
}

pub fn json_id_list(value: &str) -> Result<(), ValidationError> {
    parse_id_list_str(value)
        .map(|_| ())
        .map_err(|_| invalid("json", "Must be a JSON array of ids"))
}

fn parse_id_list_str(value: &str) -> Result<Vec<i64>, serde_json::Error> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<i64>>(value)
}

pub fn parse_flag(value: &Option<String>) -> bool {
    matches!(present(value), Some("true" | "on" | "1"))
}

pub fn parse_id(value: &Option<String>, field: &str) -> Result<i64, AppError> {
    present(value)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Validation(format!("Missing or invalid {}", field)))
}

pub fn parse_optional_i64(value: &Option<String>, field: &str) -> Result<Option<i64>, AppError> {
    present(value)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| AppError::Validation(format!("Invalid {}", field)))
        })
        .transpose()
}

pub fn parse_optional_f64(value: &Option<String>, field: &str) -> Result<Option<f64>, AppError> {
    present(value)
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| AppError::Validation(format!("Invalid {}", field)))
        })
        .transpose()
}

pub fn parse_date(value: &Option<String>) -> Result<Option<NaiveDate>, AppError> {
    present(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| AppError::Validation("Invalid date".to_string()))
        })
        .transpose()
}

pub fn parse_id_list(value: &Option<String>, field: &str) -> Result<Vec<i64>, AppError> {
    match value {
        Some(raw) => parse_id_list_str(raw)
            .map_err(|err| AppError::Validation(format!("Malformed {}: {}", field, err))),
        None => Ok(Vec::new()),
    }
}

/// Patch semantics for a nullable text column: absent field leaves it,
/// a blank field clears it.
pub fn patch_text(value: &Option<String>) -> Option<Option<String>> {
    value
        .as_ref()
        .map(|v| Some(v.trim().to_string()).filter(|v| !v.is_empty()))
}

pub fn patch_f64(value: &Option<String>, field: &str) -> Result<Option<Option<f64>>, AppError> {
    match value {
        None => Ok(None),
        Some(_) => parse_optional_f64(value, field).map(Some),
    }
}
