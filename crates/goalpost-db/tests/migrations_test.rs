//! Integration tests for the embedded migrations and schema constraints.
//!
//! Each test gets its own temporary database from `goalpost_test_utils`.

use sqlx::Row;

use goalpost_db::pool;
use goalpost_test_utils::{create_free_profile, create_test_db, drop_test_db};

#[tokio::test]
async fn migrations_create_all_tables() {
    let (pool, db_name) = create_test_db().await;

    let report = pool::schema_report(&pool)
        .await
        .expect("schema_report should succeed");

    assert_eq!(report.applied.len(), pool::MIGRATOR.iter().count());
    assert_eq!(report.pending, 0);
    let names: Vec<&str> = report.tables.iter().map(|t| t.name).collect();
    assert_eq!(names, pool::TABLES.to_vec());
    assert!(report.tables.iter().all(|t| t.rows == Some(0)));
    assert!(report.is_ready());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn schema_report_counts_rows_and_flags_missing_tables() {
    let (pool, db_name) = create_test_db().await;
    create_free_profile(&pool, "ana").await;
    create_free_profile(&pool, "ben").await;
    sqlx::query("DROP TABLE progress_entries")
        .execute(&pool)
        .await
        .expect("drop should succeed");

    let report = pool::schema_report(&pool)
        .await
        .expect("schema_report should succeed");

    let rows = |name: &str| report.tables.iter().find(|t| t.name == name).unwrap().rows;
    assert_eq!(rows("profiles"), Some(2));
    assert_eq!(rows("progress_entries"), None);
    assert!(!report.is_ready());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (pool, db_name) = create_test_db().await;

    pool::run_migrations(&pool)
        .await
        .expect("second migration run should be a no-op");

    let row = sqlx::query("SELECT COUNT(*) AS n FROM _sqlx_migrations")
        .fetch_one(&pool)
        .await
        .expect("query should succeed");
    let applied: i64 = row.get("n");
    assert_eq!(applied, 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn goal_date_constraints_are_enforced() {
    let (pool, db_name) = create_test_db().await;
    let profile = create_free_profile(&pool, "ana").await;

    // end_date == start_date
    let same_day = sqlx::query(
        "INSERT INTO goals (user_id, title, goal_type, start_date, end_date, duration_days) \
         VALUES ($1, 'x', 'fitness', '2025-01-01', '2025-01-01', 1)",
    )
    .bind(profile.id)
    .execute(&pool)
    .await;
    assert!(same_day.is_err(), "end_date must be after start_date");

    // duration disagrees with the date span
    let mismatched = sqlx::query(
        "INSERT INTO goals (user_id, title, goal_type, start_date, end_date, duration_days) \
         VALUES ($1, 'x', 'fitness', '2025-01-01', '2025-01-31', 7)",
    )
    .bind(profile.id)
    .execute(&pool)
    .await;
    assert!(mismatched.is_err(), "duration_days must equal the date span");

    let blank_title = sqlx::query(
        "INSERT INTO goals (user_id, title, goal_type, start_date, end_date, duration_days) \
         VALUES ($1, '   ', 'fitness', '2025-01-01', '2025-01-31', 30)",
    )
    .bind(profile.id)
    .execute(&pool)
    .await;
    assert!(blank_title.is_err(), "blank titles are rejected");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn verified_task_requires_positive_xp() {
    let (pool, db_name) = create_test_db().await;
    let profile = create_free_profile(&pool, "ana").await;

    let goal_id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO goals (user_id, title, goal_type, start_date, end_date, duration_days) \
         VALUES ($1, 'Run', 'fitness', '2025-01-01', '2025-01-31', 30) RETURNING id",
    )
    .bind(profile.id)
    .fetch_one(&pool)
    .await
    .expect("goal insert should succeed");

    let result = sqlx::query(
        "INSERT INTO tasks (user_id, goal_id, title, scheduled_date, status, verified, xp_earned) \
         VALUES ($1, $2, 'Day 1', '2025-01-01', 'completed', true, 0)",
    )
    .bind(profile.id)
    .bind(goal_id)
    .execute(&pool)
    .await;
    assert!(result.is_err());

    pool.close().await;
    drop_test_db(&db_name).await;
}
