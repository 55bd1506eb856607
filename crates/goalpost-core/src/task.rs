//! Task completion toggling and the daily task list.

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use goalpost_db::models::Task;
use goalpost_db::queries::tasks::{self as task_queries, TaskWithGoal};

use crate::UserId;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(Uuid),

    #[error("verified tasks cannot be changed")]
    AlreadyVerified,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Mark a task completed (stamping `completed_at`) or back to pending.
pub async fn set_task_completion(
    pool: &PgPool,
    user: UserId,
    task_id: Uuid,
    completed: bool,
) -> Result<Task, TaskError> {
    if let Some(task) =
        task_queries::set_task_completion(pool, task_id, user.as_uuid(), completed, Utc::now())
            .await?
    {
        info!(task_id = %task_id, completed, "task completion updated");
        return Ok(task);
    }

    // Nothing matched: tell apart a missing task from a verified one.
    match task_queries::get_task_for_user(pool, task_id, user.as_uuid()).await? {
        Some(task) if task.verified => Err(TaskError::AlreadyVerified),
        _ => Err(TaskError::NotFound(task_id)),
    }
}

/// The user's tasks scheduled on `date`, with their goal's title and
/// verification mode.
pub async fn list_tasks_for_day(
    pool: &PgPool,
    user: UserId,
    date: NaiveDate,
) -> Result<Vec<TaskWithGoal>, TaskError> {
    Ok(task_queries::list_tasks_for_day(pool, user.as_uuid(), date).await?)
}
