#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::db::{
        Exercises, RemovedChildren, Repositories, WorkoutExercises, WorkoutSessions, WorkoutSets,
        WorkoutTypes,
    };
    use crate::error::AppError;
    use crate::models::{
        ExerciseInsert, ExerciseType, ExerciseUpdate, WorkoutExerciseInsert,
        WorkoutExerciseUpdate, WorkoutSessionInsert, WorkoutSessionUpdate, WorkoutSetInsert,
        WorkoutSetUpdate,
    };
    use crate::test::utils::create_standard_test_db;

    #[tokio::test]
    async fn test_exercises_listed_newest_first() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");

        let exercises = Exercises::new(&test_db.pool, &alice)
            .list()
            .await
            .expect("Failed to list exercises");

        let names: Vec<&str> = exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Rowing", "Bench Press"]);
        assert_eq!(exercises[0].exercise_type, ExerciseType::Cardio);
    }

    #[tokio::test]
    async fn test_foreign_exercise_reads_as_missing() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let squat = test_db.exercise("Squat");

        let repo = Exercises::new(&test_db.pool, &alice);
        assert_eq!(repo.get_by_id(squat.id).await.unwrap(), None);

        let update = repo
            .update(
                squat.id,
                ExerciseUpdate {
                    name: Some("Stolen".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(update, Err(AppError::NotFound(_))));

        let delete = repo.delete(squat.id).await;
        assert!(matches!(delete, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_omitted_fields() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let repo = Exercises::new(&test_db.pool, &alice);

        let created = repo
            .create(ExerciseInsert {
                name: "Deadlift".to_string(),
                notes: Some("Hook grip".to_string()),
                exercise_type: ExerciseType::Strength,
            })
            .await
            .expect("Failed to create exercise");

        let renamed = repo
            .update(
                created.id,
                ExerciseUpdate {
                    name: Some("Sumo Deadlift".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to update exercise");
        assert_eq!(renamed.name, "Sumo Deadlift");
        assert_eq!(renamed.notes.as_deref(), Some("Hook grip"));
        assert_eq!(renamed.exercise_type, ExerciseType::Strength);

        let cleared = repo
            .update(
                created.id,
                ExerciseUpdate {
                    notes: Some(None),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to clear notes");
        assert_eq!(cleared.name, "Sumo Deadlift");
        assert_eq!(cleared.notes, None);

        let unchanged = repo
            .update(created.id, ExerciseUpdate::default())
            .await
            .expect("Empty patch failed");
        assert_eq!(unchanged, cleared);
    }

    #[tokio::test]
    async fn test_workout_types_are_shared_and_sorted() {
        let test_db = create_standard_test_db().await;
        let repo = WorkoutTypes::new(&test_db.pool);

        let types = repo.list().await.expect("Failed to list workout types");
        let names: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Cardio", "HIIT", "Mobility", "Sport", "Strength"]);

        let hiit = repo.get_by_key("hiit").await.unwrap().expect("hiit missing");
        assert_eq!(repo.get_by_id(hiit.id).await.unwrap(), Some(hiit));
        assert_eq!(repo.get_by_key("yoga").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nested_workout_scenario() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let repos = Repositories::new(&test_db.pool, &alice);

        let exercise = repos
            .exercises
            .create(ExerciseInsert {
                name: "Overhead Press".to_string(),
                notes: None,
                exercise_type: ExerciseType::Strength,
            })
            .await
            .unwrap();

        let session = repos
            .workout_sessions
            .create(WorkoutSessionInsert {
                workout_type_id: 1,
                date: NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(),
                notes: Some("Push day".to_string()),
            })
            .await
            .unwrap();
        assert!(!session.is_completed);
        assert_eq!(session.workout_type.as_ref().map(|t| t.key.as_str()), Some("strength"));

        let workout_exercise = repos
            .workout_exercises
            .add(WorkoutExerciseInsert {
                workout_session_id: session.id,
                exercise_id: exercise.id,
                name_snapshot: exercise.name.clone(),
                order_index: 0,
                notes: None,
            })
            .await
            .unwrap();

        repos
            .workout_sets
            .add(WorkoutSetInsert {
                workout_exercise_id: workout_exercise.id,
                reps: 5,
                weight: Some(40.0),
                ..Default::default()
            })
            .await
            .unwrap();

        let sessions = repos.workout_sessions.list().await.unwrap();
        assert_eq!(sessions.len(), 1);

        let listed = &sessions[0];
        assert_eq!(listed.id, session.id);
        assert_eq!(listed.workout_exercises.len(), 1);
        assert_eq!(listed.workout_exercises[0].name_snapshot, "Overhead Press");
        assert_eq!(
            listed.workout_exercises[0].exercise_type,
            Some(ExerciseType::Strength)
        );
        assert_eq!(listed.workout_exercises[0].sets.len(), 1);
        assert_eq!(listed.workout_exercises[0].sets[0].reps, 5);
    }

    #[tokio::test]
    async fn test_children_ordered_by_order_index() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let (session, workout_exercise, first_set) =
            test_db.logged_workout("alice@example.com", "Bench Press", 8).await;
        let rowing = test_db.exercise("Rowing");

        let sets = WorkoutSets::new(&test_db.pool, &alice);
        let next = sets.next_order_index(workout_exercise.id).await.unwrap();
        assert_eq!(next, 1);

        let warmup = sets
            .add(WorkoutSetInsert {
                workout_exercise_id: workout_exercise.id,
                reps: 12,
                order_index: 0,
                ..Default::default()
            })
            .await
            .unwrap();

        WorkoutExercises::new(&test_db.pool, &alice)
            .add(WorkoutExerciseInsert {
                workout_session_id: session.id,
                exercise_id: rowing.id,
                name_snapshot: rowing.name.clone(),
                order_index: -1,
                notes: None,
            })
            .await
            .unwrap();

        let loaded = WorkoutSessions::new(&test_db.pool, &alice)
            .get_by_id(session.id)
            .await
            .unwrap()
            .expect("Session missing");

        let names: Vec<&str> = loaded
            .workout_exercises
            .iter()
            .map(|e| e.name_snapshot.as_str())
            .collect();
        assert_eq!(names, vec!["Rowing", "Bench Press"]);

        let set_ids: Vec<i64> = loaded.workout_exercises[1].sets.iter().map(|s| s.id).collect();
        // Both sets sit at order_index 0, so id breaks the tie.
        assert_eq!(set_ids, vec![first_set.id, warmup.id]);
    }

    #[tokio::test]
    async fn test_name_snapshot_survives_rename_and_delete() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let bench = test_db.exercise("Bench Press");
        let (_, workout_exercise, _) =
            test_db.logged_workout("alice@example.com", "Bench Press", 8).await;

        let exercises = Exercises::new(&test_db.pool, &alice);
        exercises
            .update(
                bench.id,
                ExerciseUpdate {
                    name: Some("Incline Bench".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let workout_exercises = WorkoutExercises::new(&test_db.pool, &alice);
        let reloaded = workout_exercises
            .get_by_id(workout_exercise.id)
            .await
            .unwrap()
            .expect("Workout exercise missing");
        assert_eq!(reloaded.name_snapshot, "Bench Press");

        exercises.delete(bench.id).await.unwrap();

        let orphaned = workout_exercises
            .get_by_id(workout_exercise.id)
            .await
            .unwrap()
            .expect("Workout exercise missing");
        assert_eq!(orphaned.name_snapshot, "Bench Press");
        assert_eq!(orphaned.exercise_id, None);
        assert_eq!(orphaned.exercise_type, None);
        assert_eq!(orphaned.sets.len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let (session, workout_exercise, _) =
            test_db.logged_workout("alice@example.com", "Bench Press", 8).await;

        let sessions = WorkoutSessions::new(&test_db.pool, &alice);
        let done = sessions.toggle_complete(session.id, true).await.unwrap();
        assert!(done.is_completed);
        let again = sessions.toggle_complete(session.id, true).await.unwrap();
        assert!(again.is_completed);
        let reopened = sessions.toggle_complete(session.id, false).await.unwrap();
        assert_eq!(reopened.is_completed, session.is_completed);

        let exercises = WorkoutExercises::new(&test_db.pool, &alice);
        exercises.toggle_complete(workout_exercise.id, true).await.unwrap();
        let restored = exercises
            .toggle_complete(workout_exercise.id, false)
            .await
            .unwrap();
        assert!(!restored.is_completed);
    }

    #[tokio::test]
    async fn test_foreign_children_are_not_authorized() {
        let test_db = create_standard_test_db().await;
        let bob = test_db.user("bob@example.com");
        let (session, workout_exercise, set) =
            test_db.logged_workout("alice@example.com", "Bench Press", 8).await;

        let sets = WorkoutSets::new(&test_db.pool, &bob);
        let result = sets
            .update(
                set.id,
                WorkoutSetUpdate {
                    reps: Some(100),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
        assert_eq!(sets.get_by_id(set.id).await.unwrap(), None);

        let added = sets
            .add(WorkoutSetInsert {
                workout_exercise_id: workout_exercise.id,
                reps: 1,
                ..Default::default()
            })
            .await;
        assert!(matches!(added, Err(AppError::Authorization(_))));

        let exercises = WorkoutExercises::new(&test_db.pool, &bob);
        let renamed = exercises
            .update(
                workout_exercise.id,
                WorkoutExerciseUpdate {
                    name_snapshot: Some("Mine now".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(renamed, Err(AppError::Authorization(_))));

        let listed = exercises.list_for_session(session.id).await;
        assert!(matches!(listed, Err(AppError::Authorization(_))));

        let sessions = WorkoutSessions::new(&test_db.pool, &bob);
        assert_eq!(sessions.get_by_id(session.id).await.unwrap(), None);
        assert!(!sessions.exists(session.id).await.unwrap());
        let deleted = sessions.delete(session.id).await;
        assert!(matches!(deleted, Err(AppError::NotFound(_))));

        let alice = test_db.user("alice@example.com");
        let untouched = WorkoutSets::new(&test_db.pool, &alice)
            .get_by_id(set.id)
            .await
            .unwrap()
            .expect("Set missing");
        assert_eq!(untouched.reps, 8);
    }

    #[tokio::test]
    async fn test_delete_many_of_nothing_touches_no_backend() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");

        // A closed pool fails any query, so success proves none was issued.
        test_db.pool.close().await;

        WorkoutSets::new(&test_db.pool, &alice)
            .delete_many(&[])
            .await
            .expect("Empty set batch hit the database");
        WorkoutExercises::new(&test_db.pool, &alice)
            .delete_many(&[])
            .await
            .expect("Empty exercise batch hit the database");
    }

    #[tokio::test]
    async fn test_delete_many_ignores_missing_ids() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let (_, workout_exercise, set) =
            test_db.logged_workout("alice@example.com", "Bench Press", 8).await;
        let (_, _, rowing_set) = test_db.logged_workout("alice@example.com", "Rowing", 20).await;

        WorkoutSets::new(&test_db.pool, &alice)
            .delete_many(&[set.id, 777])
            .await
            .expect("Failed to delete sets");
        assert_eq!(test_db.count("workout_sets").await, 1);

        WorkoutExercises::new(&test_db.pool, &alice)
            .delete_many(&[workout_exercise.id])
            .await
            .expect("Failed to delete exercises");
        assert_eq!(test_db.count("workout_exercises").await, 1);

        let remaining = WorkoutSets::new(&test_db.pool, &alice).list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, rowing_set.id);
    }

    #[tokio::test]
    async fn test_deleting_session_cascades_to_children() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let (session, _, _) = test_db.logged_workout("alice@example.com", "Bench Press", 8).await;
        let (other, _, _) = test_db.logged_workout("alice@example.com", "Rowing", 20).await;

        WorkoutSessions::new(&test_db.pool, &alice)
            .delete(session.id)
            .await
            .expect("Failed to delete session");

        assert_eq!(test_db.count("workout_sessions").await, 1);
        assert_eq!(test_db.count("workout_exercises").await, 1);
        assert_eq!(test_db.count("workout_sets").await, 1);

        let left = WorkoutSessions::new(&test_db.pool, &alice).list().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, other.id);
    }

    #[tokio::test]
    async fn test_save_applies_removals_and_patch() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let (session, bench, bench_set) =
            test_db.logged_workout("alice@example.com", "Bench Press", 8).await;

        let extra_set = WorkoutSets::new(&test_db.pool, &alice)
            .add(WorkoutSetInsert {
                workout_exercise_id: bench.id,
                reps: 6,
                order_index: 1,
                ..Default::default()
            })
            .await
            .unwrap();

        let saved = WorkoutSessions::new(&test_db.pool, &alice)
            .save(
                session.id,
                WorkoutSessionUpdate {
                    notes: Some(Some("Felt strong".to_string())),
                    is_completed: Some(true),
                    ..Default::default()
                },
                RemovedChildren {
                    exercise_ids: vec![],
                    set_ids: vec![bench_set.id],
                },
            )
            .await
            .expect("Failed to save workout");

        assert!(saved.is_completed);
        assert_eq!(saved.notes.as_deref(), Some("Felt strong"));
        assert_eq!(saved.date, session.date);
        assert_eq!(saved.workout_exercises.len(), 1);
        let set_ids: Vec<i64> = saved.workout_exercises[0].sets.iter().map(|s| s.id).collect();
        assert_eq!(set_ids, vec![extra_set.id]);
    }

    #[tokio::test]
    async fn test_save_with_foreign_removal_changes_nothing() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let (session, _, alice_set) =
            test_db.logged_workout("alice@example.com", "Bench Press", 8).await;
        let (_, _, bob_set) = test_db.logged_workout("bob@example.com", "Squat", 5).await;

        let result = WorkoutSessions::new(&test_db.pool, &alice)
            .save(
                session.id,
                WorkoutSessionUpdate {
                    is_completed: Some(true),
                    ..Default::default()
                },
                RemovedChildren {
                    exercise_ids: vec![],
                    set_ids: vec![alice_set.id, bob_set.id],
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));

        assert_eq!(test_db.count("workout_sets").await, 2);
        let reloaded = WorkoutSessions::new(&test_db.pool, &alice)
            .get_by_id(session.id)
            .await
            .unwrap()
            .expect("Session missing");
        assert!(!reloaded.is_completed);
    }

    #[tokio::test]
    async fn test_save_only_removes_children_of_the_saved_workout() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user("alice@example.com");
        let (edited, _, _) = test_db.logged_workout("alice@example.com", "Bench Press", 8).await;
        let (_, other_exercise, other_set) =
            test_db.logged_workout("alice@example.com", "Rowing", 10).await;
        let sessions = WorkoutSessions::new(&test_db.pool, &alice);

        let result = sessions
            .save(
                edited.id,
                WorkoutSessionUpdate::default(),
                RemovedChildren {
                    exercise_ids: vec![],
                    set_ids: vec![other_set.id],
                },
            )
            .await;
        match result {
            Err(AppError::Authorization(msg)) => {
                assert_eq!(msg, "Cannot remove workout sets that belong to another workout");
            }
            other => panic!("Expected Authorization error, got {:?}", other),
        }

        let result = sessions
            .save(
                edited.id,
                WorkoutSessionUpdate::default(),
                RemovedChildren {
                    exercise_ids: vec![other_exercise.id],
                    set_ids: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));

        assert_eq!(test_db.count("workout_sets").await, 2);
        assert_eq!(test_db.count("workout_exercises").await, 2);
    }
}
