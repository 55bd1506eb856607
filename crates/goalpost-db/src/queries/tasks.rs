//! Database query functions for the `tasks` table.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{Task, TaskStatus, VerificationMode};

/// A task row ready for insertion. Status, verification, and XP take their
/// column defaults (`pending`, unverified, zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub description: String,
    pub scheduled_date: NaiveDate,
}

/// Rows per `INSERT` statement. Postgres caps a statement at 65,535 bind
/// parameters and each row binds five.
pub const INSERT_CHUNK_ROWS: usize = 1_000;

/// Insert a batch of tasks, `INSERT_CHUNK_ROWS` rows per statement, in one
/// transaction: either every row is inserted or none is.
pub async fn insert_tasks(pool: &PgPool, tasks: &[NewTask]) -> Result<Vec<Task>> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut inserted = Vec::with_capacity(tasks.len());

    for chunk in tasks.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO tasks (user_id, goal_id, title, description, scheduled_date) ",
        );
        builder.push_values(chunk, |mut row, task| {
            row.push_bind(task.user_id)
                .push_bind(task.goal_id)
                .push_bind(task.title.clone())
                .push_bind(task.description.clone())
                .push_bind(task.scheduled_date);
        });
        builder.push(" RETURNING *");

        let rows = builder
            .build_query_as::<Task>()
            .fetch_all(&mut *tx)
            .await
            .with_context(|| format!("failed to insert batch of {} tasks", tasks.len()))?;
        inserted.extend(rows);
    }

    tx.commit().await.context("failed to commit task batch")?;
    Ok(inserted)
}

/// Fetch a single task by ID.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// Fetch a task by ID, only if it belongs to `user_id`.
pub async fn get_task_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// List all tasks for a goal in schedule order.
pub async fn list_tasks_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE goal_id = $1 ORDER BY scheduled_date ASC, created_at ASC",
    )
    .bind(goal_id)
    .fetch_all(pool)
    .await
    .context("failed to list tasks for goal")?;

    Ok(tasks)
}

/// Count the tasks attached to a goal.
pub async fn count_tasks_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE goal_id = $1")
        .bind(goal_id)
        .fetch_one(pool)
        .await
        .context("failed to count tasks for goal")?;

    Ok(row.0)
}

/// A task joined with the fields of its goal that the daily view needs.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TaskWithGoal {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,
    pub goal_title: String,
    pub verification_mode: VerificationMode,
}

/// List a user's tasks scheduled on `date`, oldest first.
pub async fn list_tasks_for_day(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<TaskWithGoal>> {
    let rows = sqlx::query_as::<_, TaskWithGoal>(
        "SELECT t.*, g.title AS goal_title, g.verification_mode \
         FROM tasks t \
         JOIN goals g ON g.id = t.goal_id \
         WHERE t.user_id = $1 AND t.scheduled_date = $2 \
         ORDER BY t.created_at ASC",
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(pool)
    .await
    .context("failed to list tasks for day")?;

    Ok(rows)
}

/// Set a task's completion status.
///
/// `completed = true` moves the task to `completed` and stamps
/// `completed_at`; `false` moves it back to `pending` and clears the stamp.
/// Verified tasks are left untouched. Returns `None` when no row matched
/// (missing, not owned, or already verified).
pub async fn set_task_completion(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    completed: bool,
    now: DateTime<Utc>,
) -> Result<Option<Task>> {
    let (status, completed_at) = if completed {
        (TaskStatus::Completed, Some(now))
    } else {
        (TaskStatus::Pending, None)
    };

    let task = sqlx::query_as::<_, Task>(
        "UPDATE tasks \
         SET status = $1, completed_at = $2 \
         WHERE id = $3 AND user_id = $4 AND verified = false \
         RETURNING *",
    )
    .bind(status)
    .bind(completed_at)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to update task completion")?;

    Ok(task)
}

/// Mark a completed, not-yet-verified task as verified, recording the XP
/// award and verification payload.
///
/// The WHERE clause guards on `status = 'completed' AND verified = false`,
/// so concurrent verifications of the same task cannot both succeed.
/// Returns the updated row, or `None` if the guard did not match.
pub async fn mark_task_verified<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    xp_earned: i32,
    verification_data: Option<&serde_json::Value>,
) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>(
        "UPDATE tasks \
         SET verified = true, xp_earned = $1, verification_data = $2 \
         WHERE id = $3 AND status = 'completed' AND verified = false \
         RETURNING *",
    )
    .bind(xp_earned)
    .bind(verification_data)
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to mark task verified")?;

    Ok(task)
}
