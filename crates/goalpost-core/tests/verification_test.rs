//! Integration tests for task completion, verification and XP accounting.

use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use goalpost_core::UserId;
use goalpost_core::goal::{self, GoalInput};
use goalpost_core::plan::PlanSources;
use goalpost_core::task::{self, TaskError};
use goalpost_core::verify::{self, VerificationMethod, VerifyError};
use goalpost_db::models::{GoalType, Task, TaskStatus, VerificationMode};
use goalpost_db::queries::{profiles, progress_entries, tasks};
use goalpost_test_utils::{create_free_profile, create_test_db, drop_test_db};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Create a 7-day deterministic goal and return its first task.
async fn first_task(pool: &PgPool, user: UserId, mode: VerificationMode) -> Task {
    let created = goal::create_goal(
        pool,
        &PlanSources::new(None),
        user,
        GoalInput {
            title: "Run 5k".to_string(),
            description: String::new(),
            goal_type: GoalType::Fitness,
            verification_mode: mode,
            start_date: date(2024, 3, 1),
            end_date: Some(date(2024, 3, 8)),
            duration_days: None,
            intensity: 3,
            use_ai: false,
            custom_prompt: None,
        },
    )
    .await
    .expect("create_goal should succeed");
    created
        .tasks
        .into_iter()
        .min_by_key(|t| t.scheduled_date)
        .expect("goal has tasks")
}

async fn total_xp(pool: &PgPool, user: UserId) -> i32 {
    profiles::get_profile(pool, user.as_uuid())
        .await
        .expect("get should succeed")
        .expect("profile should exist")
        .total_xp
}

#[tokio::test]
async fn normal_verification_awards_fifty_xp() {
    let (pool, db_name) = create_test_db().await;
    let user = UserId(create_free_profile(&pool, "ana").await.id);
    let t = first_task(&pool, user, VerificationMode::Normal).await;

    task::set_task_completion(&pool, user, t.id, true)
        .await
        .expect("complete should succeed");
    let entry = verify::verify(&pool, user, t.id, VerificationMethod::Normal)
        .await
        .expect("verify should succeed");

    assert_eq!(entry.xp_gained, 50);
    assert!(entry.verified);
    assert!(entry.notes.is_none());
    assert_eq!(entry.task_id, Some(t.id));

    let stored = tasks::get_task(&pool, t.id)
        .await
        .expect("get should succeed")
        .expect("task should exist");
    assert!(stored.verified);
    assert_eq!(stored.xp_earned, 50);
    assert!(stored.verification_data.is_none());

    let entries = progress_entries::list_entries_for_task(&pool, t.id)
        .await
        .expect("list should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(total_xp(&pool, user).await, 50);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn camera_verification_awards_hundred_xp() {
    let (pool, db_name) = create_test_db().await;
    let user = UserId(create_free_profile(&pool, "ana").await.id);
    let t = first_task(&pool, user, VerificationMode::Strict).await;

    task::set_task_completion(&pool, user, t.id, true)
        .await
        .expect("complete should succeed");
    let captured_at = Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap();
    let entry = verify::verify(&pool, user, t.id, VerificationMethod::Camera { captured_at })
        .await
        .expect("verify should succeed");

    assert_eq!(entry.xp_gained, 100);
    assert_eq!(entry.notes.as_deref(), Some("Camera verified"));

    let stored = tasks::get_task(&pool, t.id)
        .await
        .expect("get should succeed")
        .expect("task should exist");
    assert_eq!(stored.xp_earned, 100);
    let data = stored.verification_data.expect("camera data stored");
    assert_eq!(data["method"], "camera");
    assert_eq!(data["timestamp"], "2024-03-01T07:30:00.000Z");
    assert_eq!(total_xp(&pool, user).await, 100);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn double_verification_is_rejected() {
    let (pool, db_name) = create_test_db().await;
    let user = UserId(create_free_profile(&pool, "ana").await.id);
    let t = first_task(&pool, user, VerificationMode::Normal).await;

    task::set_task_completion(&pool, user, t.id, true)
        .await
        .expect("complete should succeed");
    verify::verify(&pool, user, t.id, VerificationMethod::Normal)
        .await
        .expect("first verify should succeed");

    let err = verify::verify(&pool, user, t.id, VerificationMethod::Normal)
        .await
        .expect_err("second verify should fail");
    assert!(matches!(err, VerifyError::AlreadyVerified));

    let entries = progress_entries::list_entries_for_task(&pool, t.id)
        .await
        .expect("list should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(total_xp(&pool, user).await, 50);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn pending_task_cannot_be_verified() {
    let (pool, db_name) = create_test_db().await;
    let user = UserId(create_free_profile(&pool, "ana").await.id);
    let t = first_task(&pool, user, VerificationMode::Normal).await;

    let err = verify::verify(&pool, user, t.id, VerificationMethod::Normal)
        .await
        .expect_err("pending task should fail");
    assert!(matches!(err, VerifyError::NotCompleted));
    assert_eq!(total_xp(&pool, user).await, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn strict_goal_requires_camera() {
    let (pool, db_name) = create_test_db().await;
    let user = UserId(create_free_profile(&pool, "ana").await.id);
    let t = first_task(&pool, user, VerificationMode::Strict).await;

    task::set_task_completion(&pool, user, t.id, true)
        .await
        .expect("complete should succeed");
    let err = verify::verify(&pool, user, t.id, VerificationMethod::Normal)
        .await
        .expect_err("normal verify on strict goal should fail");
    assert!(matches!(err, VerifyError::CameraRequired));

    let entries = progress_entries::list_entries_for_task(&pool, t.id)
        .await
        .expect("list should succeed");
    assert!(entries.is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn normal_goal_accepts_camera() {
    let (pool, db_name) = create_test_db().await;
    let user = UserId(create_free_profile(&pool, "ana").await.id);
    let t = first_task(&pool, user, VerificationMode::Normal).await;

    task::set_task_completion(&pool, user, t.id, true)
        .await
        .expect("complete should succeed");
    let entry = verify::verify(
        &pool,
        user,
        t.id,
        VerificationMethod::Camera {
            captured_at: Utc::now(),
        },
    )
    .await
    .expect("camera verify should succeed");
    assert_eq!(entry.xp_gained, 100);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn other_users_task_is_not_found() {
    let (pool, db_name) = create_test_db().await;
    let owner = UserId(create_free_profile(&pool, "owner").await.id);
    let stranger = UserId(create_free_profile(&pool, "stranger").await.id);
    let t = first_task(&pool, owner, VerificationMode::Normal).await;

    let err = task::set_task_completion(&pool, stranger, t.id, true)
        .await
        .expect_err("stranger cannot complete");
    assert!(matches!(err, TaskError::NotFound(_)));

    task::set_task_completion(&pool, owner, t.id, true)
        .await
        .expect("owner can complete");
    let err = verify::verify(&pool, stranger, t.id, VerificationMethod::Normal)
        .await
        .expect_err("stranger cannot verify");
    assert!(matches!(err, VerifyError::TaskNotFound(_)));

    let missing = Uuid::new_v4();
    let err = verify::verify(&pool, owner, missing, VerificationMethod::Normal)
        .await
        .expect_err("missing task");
    assert!(matches!(err, VerifyError::TaskNotFound(id) if id == missing));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn completion_toggle_round_trip_and_verified_freeze() {
    let (pool, db_name) = create_test_db().await;
    let user = UserId(create_free_profile(&pool, "ana").await.id);
    let t = first_task(&pool, user, VerificationMode::Normal).await;

    let done = task::set_task_completion(&pool, user, t.id, true)
        .await
        .expect("complete should succeed");
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.completed_at.is_some());

    let undone = task::set_task_completion(&pool, user, t.id, false)
        .await
        .expect("uncomplete should succeed");
    assert_eq!(undone.status, TaskStatus::Pending);
    assert!(undone.completed_at.is_none());

    task::set_task_completion(&pool, user, t.id, true)
        .await
        .expect("complete should succeed");
    verify::verify(&pool, user, t.id, VerificationMethod::Normal)
        .await
        .expect("verify should succeed");

    let err = task::set_task_completion(&pool, user, t.id, false)
        .await
        .expect_err("verified task cannot be reopened");
    assert!(matches!(err, TaskError::AlreadyVerified));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn daily_list_shows_only_that_day() {
    let (pool, db_name) = create_test_db().await;
    let user = UserId(create_free_profile(&pool, "ana").await.id);
    first_task(&pool, user, VerificationMode::Strict).await;

    let day_three = task::list_tasks_for_day(&pool, user, date(2024, 3, 3))
        .await
        .expect("list should succeed");
    assert_eq!(day_three.len(), 1);
    assert_eq!(day_three[0].task.title, "Day 3: Run 5k");
    assert_eq!(day_three[0].verification_mode, VerificationMode::Strict);

    let after_end = task::list_tasks_for_day(&pool, user, date(2024, 3, 8))
        .await
        .expect("list should succeed");
    assert!(after_end.is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}
