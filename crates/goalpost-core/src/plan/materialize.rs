//! Task materialization: turn descriptors into dated task rows.
//!
//! - [`schedule`] computes the dates (pure).
//! - [`materialize`] loads the goal, schedules, and inserts all rows in one
//!   batch.

use chrono::{Days, NaiveDate};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use goalpost_db::models::Task;
use goalpost_db::queries::{goals as goal_queries, tasks as task_queries};

use super::descriptor::TaskDescriptor;
use crate::UserId;

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("goal {0} not found")]
    GoalNotFound(Uuid),

    #[error("task {index} (day {offset}) falls after the goal's end date {end_date}")]
    DescriptorOutOfRange {
        index: usize,
        offset: u32,
        end_date: NaiveDate,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A descriptor with its computed date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub title: String,
    pub description: String,
    pub scheduled_date: NaiveDate,
}

/// Assign each descriptor a date: `start + day`, or `start + index` when the
/// descriptor has no day. Any date after `end` rejects the whole batch.
pub fn schedule(
    start: NaiveDate,
    end: NaiveDate,
    descriptors: &[TaskDescriptor],
) -> Result<Vec<ScheduledTask>, MaterializeError> {
    descriptors
        .iter()
        .enumerate()
        .map(|(index, d)| {
            let offset = d.day.unwrap_or(index as u32);
            let out_of_range = || MaterializeError::DescriptorOutOfRange {
                index,
                offset,
                end_date: end,
            };
            let date = start
                .checked_add_days(Days::new(u64::from(offset)))
                .ok_or_else(out_of_range)?;
            if date > end {
                return Err(out_of_range());
            }
            Ok(ScheduledTask {
                title: d.title.clone(),
                description: d.description.clone(),
                scheduled_date: date,
            })
        })
        .collect()
}

/// Persist one pending task per descriptor for a goal owned by `user`.
///
/// Not idempotent: calling twice inserts the tasks twice.
pub async fn materialize(
    pool: &PgPool,
    user: UserId,
    goal_id: Uuid,
    descriptors: &[TaskDescriptor],
) -> Result<Vec<Task>, MaterializeError> {
    let goal = goal_queries::get_goal_for_user(pool, goal_id, user.as_uuid())
        .await?
        .ok_or(MaterializeError::GoalNotFound(goal_id))?;

    let scheduled = schedule(goal.start_date, goal.end_date, descriptors)?;

    let rows: Vec<task_queries::NewTask> = scheduled
        .into_iter()
        .map(|s| task_queries::NewTask {
            user_id: user.as_uuid(),
            goal_id,
            title: s.title,
            description: s.description,
            scheduled_date: s.scheduled_date,
        })
        .collect();

    let tasks = task_queries::insert_tasks(pool, &rows).await?;

    info!(goal_id = %goal_id, tasks = tasks.len(), "tasks materialized");
    Ok(tasks)
}
