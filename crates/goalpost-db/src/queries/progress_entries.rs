//! Database query functions for the append-only `progress_entries` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::ProgressEntry;

/// Parameters for a progress entry.
#[derive(Debug, Clone)]
pub struct NewProgressEntry<'a> {
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub task_id: Uuid,
    pub verified: bool,
    pub xp_gained: i32,
    pub notes: Option<&'a str>,
    pub date: NaiveDate,
}

/// Append a progress entry. Usable inside a transaction.
pub async fn insert_progress_entry<'e>(
    executor: impl PgExecutor<'e>,
    entry: &NewProgressEntry<'_>,
) -> Result<ProgressEntry> {
    let row = sqlx::query_as::<_, ProgressEntry>(
        "INSERT INTO progress_entries (user_id, goal_id, task_id, verified, xp_gained, notes, date) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING *",
    )
    .bind(entry.user_id)
    .bind(entry.goal_id)
    .bind(entry.task_id)
    .bind(entry.verified)
    .bind(entry.xp_gained)
    .bind(entry.notes)
    .bind(entry.date)
    .fetch_one(executor)
    .await
    .context("failed to insert progress entry")?;

    Ok(row)
}

/// All progress entries recorded for a task, oldest first.
pub async fn list_entries_for_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<ProgressEntry>> {
    let rows = sqlx::query_as::<_, ProgressEntry>(
        "SELECT * FROM progress_entries WHERE task_id = $1 ORDER BY created_at ASC",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
    .context("failed to list progress entries for task")?;

    Ok(rows)
}

/// All progress entries for a goal, oldest first.
pub async fn list_entries_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<Vec<ProgressEntry>> {
    let rows = sqlx::query_as::<_, ProgressEntry>(
        "SELECT * FROM progress_entries WHERE goal_id = $1 ORDER BY created_at ASC",
    )
    .bind(goal_id)
    .fetch_all(pool)
    .await
    .context("failed to list progress entries for goal")?;

    Ok(rows)
}
