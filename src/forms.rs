use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::db::RemovedChildren;
use crate::error::AppError;
use crate::models::{
    ExerciseInsert, ExerciseType, ExerciseUpdate, WorkoutExerciseUpdate, WorkoutSessionInsert,
    WorkoutSessionUpdate, WorkoutSetInsert, WorkoutSetUpdate,
};
use crate::validation::{
    boolean_flag, iso_date, json_id_list, known_exercise_type, non_negative_integer,
    non_negative_number, not_blank, parse_date, parse_flag, parse_id, parse_id_list,
    parse_optional_f64, parse_optional_i64, patch_f64, patch_text, positive_id, present,
};

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct SignInForm {
    #[validate(
        required(message = "Email is required"),
        email(message = "Enter a valid email address")
    )]
    pub email: Option<String>,
    #[serde(skip_serializing)]
    #[validate(
        required(message = "Password is required"),
        length(min = 1, message = "Password is required")
    )]
    pub password: Option<String>,
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct SignUpForm {
    #[validate(
        required(message = "Email is required"),
        email(message = "Enter a valid email address")
    )]
    pub email: Option<String>,
    #[serde(skip_serializing)]
    #[validate(
        required(message = "Password is required"),
        length(min = 8, message = "Password must be at least 8 characters")
    )]
    pub password: Option<String>,
}

impl SignInForm {
    pub fn credentials(&self) -> (&str, &str) {
        (
            self.email.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
        )
    }
}

impl SignUpForm {
    pub fn credentials(&self) -> (&str, &str) {
        (
            self.email.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct ExerciseForm {
    #[validate(
        required(message = "Exercise name is required"),
        custom(function = "not_blank", message = "Exercise name is required"),
        length(max = 100, message = "Exercise name must be 100 characters or fewer")
    )]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Notes must be 1000 characters or fewer"))]
    pub notes: Option<String>,
    #[validate(custom(function = "known_exercise_type"))]
    pub exercise_type: Option<String>,
}

impl ExerciseForm {
    fn parsed_type(&self) -> Result<Option<ExerciseType>, AppError> {
        present(&self.exercise_type)
            .map(|v| v.parse::<ExerciseType>().map_err(AppError::Validation))
            .transpose()
    }

    pub fn to_insert(&self) -> Result<ExerciseInsert, AppError> {
        let name = present(&self.name)
            .ok_or_else(|| AppError::Validation("Exercise name is required".to_string()))?;

        Ok(ExerciseInsert {
            name: name.to_string(),
            notes: present(&self.notes).map(String::from),
            exercise_type: self.parsed_type()?.unwrap_or_default(),
        })
    }

    pub fn to_update(&self) -> Result<ExerciseUpdate, AppError> {
        Ok(ExerciseUpdate {
            name: present(&self.name).map(String::from),
            notes: patch_text(&self.notes),
            exercise_type: self.parsed_type()?,
        })
    }
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct NewWorkoutForm {
    #[validate(
        required(message = "Workout type is required"),
        custom(function = "positive_id", message = "Workout type is required")
    )]
    pub workout_type_id: Option<String>,
    #[validate(
        required(message = "Date is required"),
        custom(function = "iso_date")
    )]
    pub date: Option<String>,
    #[validate(length(max = 1000, message = "Notes must be 1000 characters or fewer"))]
    pub notes: Option<String>,
}

impl NewWorkoutForm {
    pub fn to_insert(&self) -> Result<WorkoutSessionInsert, AppError> {
        let date = parse_date(&self.date)?
            .ok_or_else(|| AppError::Validation("Date is required".to_string()))?;

        Ok(WorkoutSessionInsert {
            workout_type_id: parse_id(&self.workout_type_id, "workout_type_id")?,
            date,
            notes: present(&self.notes).map(String::from),
        })
    }
}

/// Everything the workout editor submits on save. The removed id lists are
/// JSON arrays.
#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct SaveWorkoutForm {
    #[validate(custom(function = "positive_id", message = "Invalid workout type"))]
    pub workout_type_id: Option<String>,
    #[validate(custom(function = "iso_date"))]
    pub date: Option<String>,
    #[validate(length(max = 1000, message = "Notes must be 1000 characters or fewer"))]
    pub notes: Option<String>,
    #[validate(custom(function = "boolean_flag"))]
    pub is_completed: Option<String>,
    #[validate(custom(function = "json_id_list", message = "Invalid removed exercise list"))]
    pub removed_exercise_ids: Option<String>,
    #[validate(custom(function = "json_id_list", message = "Invalid removed set list"))]
    pub removed_set_ids: Option<String>,
}

impl SaveWorkoutForm {
    pub fn to_update(&self) -> Result<WorkoutSessionUpdate, AppError> {
        Ok(WorkoutSessionUpdate {
            workout_type_id: present(&self.workout_type_id)
                .map(|_| parse_id(&self.workout_type_id, "workout_type_id"))
                .transpose()?,
            date: parse_date(&self.date)?,
            notes: patch_text(&self.notes),
            is_completed: self.is_completed.as_ref().map(|_| parse_flag(&self.is_completed)),
        })
    }

    pub fn removed(&self) -> Result<RemovedChildren, AppError> {
        Ok(RemovedChildren {
            exercise_ids: parse_id_list(&self.removed_exercise_ids, "removed_exercise_ids")?,
            set_ids: parse_id_list(&self.removed_set_ids, "removed_set_ids")?,
        })
    }
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct ToggleForm {
    #[validate(custom(function = "boolean_flag"))]
    pub is_completed: Option<String>,
}

impl ToggleForm {
    pub fn is_completed(&self) -> bool {
        parse_flag(&self.is_completed)
    }
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct HistoryToggleForm {
    #[validate(
        required(message = "Workout id is required"),
        custom(function = "positive_id", message = "Workout id is required")
    )]
    pub workout_id: Option<String>,
    #[validate(custom(function = "boolean_flag"))]
    pub is_completed: Option<String>,
}

impl HistoryToggleForm {
    pub fn workout_id(&self) -> Result<i64, AppError> {
        parse_id(&self.workout_id, "workout_id")
    }

    pub fn is_completed(&self) -> bool {
        parse_flag(&self.is_completed)
    }
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct AddWorkoutExerciseForm {
    #[validate(
        required(message = "Choose an exercise"),
        custom(function = "positive_id", message = "Choose an exercise")
    )]
    pub exercise_id: Option<String>,
    #[validate(custom(function = "non_negative_integer"))]
    pub order_index: Option<String>,
    #[validate(length(max = 1000, message = "Notes must be 1000 characters or fewer"))]
    pub notes: Option<String>,
}

impl AddWorkoutExerciseForm {
    pub fn exercise_id(&self) -> Result<i64, AppError> {
        parse_id(&self.exercise_id, "exercise_id")
    }

    pub fn order_index(&self) -> Result<Option<i64>, AppError> {
        parse_optional_i64(&self.order_index, "order_index")
    }

    pub fn notes(&self) -> Option<String> {
        present(&self.notes).map(String::from)
    }
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
pub struct WorkoutExerciseForm {
    #[validate(
        custom(function = "not_blank", message = "Exercise name cannot be blank"),
        length(max = 100, message = "Exercise name must be 100 characters or fewer")
    )]
    pub name_snapshot: Option<String>,
    #[validate(length(max = 1000, message = "Notes must be 1000 characters or fewer"))]
    pub notes: Option<String>,
    #[validate(custom(function = "non_negative_integer"))]
    pub order_index: Option<String>,
}

impl WorkoutExerciseForm {
    pub fn to_update(&self) -> Result<WorkoutExerciseUpdate, AppError> {
        Ok(WorkoutExerciseUpdate {
            name_snapshot: present(&self.name_snapshot).map(String::from),
            notes: patch_text(&self.notes),
            is_completed: None,
            order_index: parse_optional_i64(&self.order_index, "order_index")?,
        })
    }
}

/// A set needs some measure of effort: reps for strength work, calories or
/// distance for cardio.
fn has_effort(reps: &Option<String>, calories: &Option<String>, distance: &Option<String>) -> bool {
    let positive = |value: &Option<String>| {
        present(value)
            .and_then(|v| v.parse::<f64>().ok())
            .is_some_and(|n| n > 0.0)
    };

    positive(reps) || positive(calories) || positive(distance)
}

fn effort_error() -> ValidationError {
    ValidationError::new("effort")
        .with_message("A set needs reps, calories or distance greater than 0".into())
}

fn new_set_has_effort(form: &NewSetForm) -> Result<(), ValidationError> {
    if has_effort(&form.reps, &form.calories, &form.distance) {
        Ok(())
    } else {
        Err(effort_error())
    }
}

fn updated_set_has_effort(form: &SetUpdateForm) -> Result<(), ValidationError> {
    let touches_effort =
        present(&form.reps).is_some() || form.calories.is_some() || form.distance.is_some();
    if !touches_effort || has_effort(&form.reps, &form.calories, &form.distance) {
        Ok(())
    } else {
        Err(effort_error())
    }
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
#[validate(schema(function = "new_set_has_effort"))]
pub struct NewSetForm {
    #[validate(custom(function = "non_negative_integer"))]
    pub reps: Option<String>,
    #[validate(custom(function = "non_negative_number"))]
    pub weight: Option<String>,
    #[validate(custom(function = "non_negative_number"))]
    pub calories: Option<String>,
    #[validate(custom(function = "non_negative_number"))]
    pub distance: Option<String>,
    #[validate(custom(function = "non_negative_integer"))]
    pub order_index: Option<String>,
}

impl NewSetForm {
    /// `order_index` falls back to the caller's next free slot.
    pub fn to_insert(
        &self,
        workout_exercise_id: i64,
        next_order_index: i64,
    ) -> Result<WorkoutSetInsert, AppError> {
        Ok(WorkoutSetInsert {
            workout_exercise_id,
            reps: parse_optional_i64(&self.reps, "reps")?.unwrap_or(0),
            weight: parse_optional_f64(&self.weight, "weight")?,
            calories: parse_optional_f64(&self.calories, "calories")?,
            distance: parse_optional_f64(&self.distance, "distance")?,
            order_index: parse_optional_i64(&self.order_index, "order_index")?
                .unwrap_or(next_order_index),
        })
    }
}

#[derive(Debug, Clone, FromForm, Serialize, Validate)]
#[validate(schema(function = "updated_set_has_effort"))]
pub struct SetUpdateForm {
    #[validate(custom(function = "non_negative_integer"))]
    pub reps: Option<String>,
    #[validate(custom(function = "non_negative_number"))]
    pub weight: Option<String>,
    #[validate(custom(function = "non_negative_number"))]
    pub calories: Option<String>,
    #[validate(custom(function = "non_negative_number"))]
    pub distance: Option<String>,
    #[validate(custom(function = "non_negative_integer"))]
    pub order_index: Option<String>,
}

impl SetUpdateForm {
    pub fn to_update(&self) -> Result<WorkoutSetUpdate, AppError> {
        Ok(WorkoutSetUpdate {
            // A blank reps field leaves the stored count alone.
            reps: parse_optional_i64(&self.reps, "reps")?,
            weight: patch_f64(&self.weight, "weight")?,
            calories: patch_f64(&self.calories, "calories")?,
            distance: patch_f64(&self.distance, "distance")?,
            order_index: parse_optional_i64(&self.order_index, "order_index")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn new_set_requires_some_effort() {
        let empty = NewSetForm {
            reps: some("0"),
            weight: some("20"),
            calories: None,
            distance: some(""),
            order_index: None,
        };
        let errors = empty.validate().unwrap_err();
        assert!(errors.errors().contains_key("__all__"));

        let cardio = NewSetForm {
            reps: None,
            weight: None,
            calories: some("120"),
            distance: None,
            order_index: None,
        };
        assert!(cardio.validate().is_ok());

        let insert = cardio.to_insert(7, 3).unwrap();
        assert_eq!(insert.workout_exercise_id, 7);
        assert_eq!(insert.reps, 0);
        assert_eq!(insert.calories, Some(120.0));
        assert_eq!(insert.order_index, 3);
    }

    #[test]
    fn set_update_only_checks_effort_when_it_changes() {
        let reorder = SetUpdateForm {
            reps: None,
            weight: None,
            calories: None,
            distance: None,
            order_index: some("2"),
        };
        assert!(reorder.validate().is_ok());

        let zeroed = SetUpdateForm {
            reps: some("0"),
            ..reorder.clone()
        };
        assert!(zeroed.validate().is_err());

        let clear_weight = SetUpdateForm {
            weight: some(""),
            ..reorder
        };
        let update = clear_weight.to_update().unwrap();
        assert_eq!(update.weight, Some(None));
        assert_eq!(update.reps, None);
        assert_eq!(update.order_index, Some(2));
    }

    #[test]
    fn blank_reps_on_update_keeps_stored_count() {
        let form = SetUpdateForm {
            reps: some(""),
            weight: some("10"),
            calories: None,
            distance: None,
            order_index: None,
        };
        assert!(form.validate().is_ok());

        let update = form.to_update().unwrap();
        assert_eq!(update.reps, None);
        assert_eq!(update.weight, Some(Some(10.0)));
    }

    #[test]
    fn exercise_form_rejects_blank_names_and_unknown_types() {
        let form = ExerciseForm {
            name: some("   "),
            notes: None,
            exercise_type: some("yoga"),
        };
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("exercise_type"));

        let missing = ExerciseForm {
            name: None,
            notes: None,
            exercise_type: None,
        };
        assert!(missing.validate().is_err());
    }

    #[test]
    fn exercise_form_defaults_to_strength() {
        let form = ExerciseForm {
            name: some(" Bench Press "),
            notes: some(""),
            exercise_type: None,
        };
        let insert = form.to_insert().unwrap();
        assert_eq!(insert.name, "Bench Press");
        assert_eq!(insert.notes, None);
        assert_eq!(insert.exercise_type, ExerciseType::Strength);

        let update = form.to_update().unwrap();
        assert_eq!(update.notes, Some(None));
        assert_eq!(update.exercise_type, None);
    }

    #[test]
    fn save_form_flags_malformed_removed_ids() {
        let form = SaveWorkoutForm {
            workout_type_id: None,
            date: None,
            notes: None,
            is_completed: None,
            removed_exercise_ids: some("[]"),
            removed_set_ids: some("[1, 2"),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("removed_set_ids"));
        assert!(form.removed().is_err());
    }

    #[test]
    fn save_form_leaves_absent_fields_untouched() {
        let form = SaveWorkoutForm {
            workout_type_id: None,
            date: some("2024-03-01"),
            notes: None,
            is_completed: some("true"),
            removed_exercise_ids: None,
            removed_set_ids: some("[4]"),
        };
        assert!(form.validate().is_ok());

        let update = form.to_update().unwrap();
        assert_eq!(update.workout_type_id, None);
        assert_eq!(update.notes, None);
        assert_eq!(update.is_completed, Some(true));
        assert_eq!(
            update.date,
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        );

        let removed = form.removed().unwrap();
        assert!(removed.exercise_ids.is_empty());
        assert_eq!(removed.set_ids, vec![4]);
    }

    #[test]
    fn sign_up_requires_long_password_and_hides_it() {
        let form = SignUpForm {
            email: some("lifter@example.com"),
            password: some("short"),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));

        let echoed = serde_json::to_value(&form).unwrap();
        assert!(echoed.get("password").is_none());
        assert_eq!(echoed["email"], "lifter@example.com");
    }
}
