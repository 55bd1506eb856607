//! Database query functions for the `goals` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Goal, GoalStatus, GoalType, VerificationMode};

/// Parameters for inserting a goal. Validation happens before this point;
/// the table's CHECK constraints are the last line.
#[derive(Debug, Clone)]
pub struct NewGoal<'a> {
    pub user_id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub goal_type: GoalType,
    pub verification_mode: VerificationMode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i32,
    pub intensity_level: i32,
    pub ai_generated: bool,
}

/// Insert a new goal row with `status = active`. Returns the inserted goal
/// with server-generated defaults (id, created_at).
pub async fn insert_goal(pool: &PgPool, goal: &NewGoal<'_>) -> Result<Goal> {
    let row = sqlx::query_as::<_, Goal>(
        "INSERT INTO goals \
            (user_id, title, description, goal_type, verification_mode, \
             start_date, end_date, duration_days, intensity_level, status, ai_generated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING *",
    )
    .bind(goal.user_id)
    .bind(goal.title)
    .bind(goal.description)
    .bind(goal.goal_type)
    .bind(goal.verification_mode)
    .bind(goal.start_date)
    .bind(goal.end_date)
    .bind(goal.duration_days)
    .bind(goal.intensity_level)
    .bind(GoalStatus::Active)
    .bind(goal.ai_generated)
    .fetch_one(pool)
    .await
    .context("failed to insert goal")?;

    Ok(row)
}

/// Fetch a goal by its ID.
pub async fn get_goal(pool: &PgPool, id: Uuid) -> Result<Option<Goal>> {
    let goal = sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch goal")?;

    Ok(goal)
}

/// Fetch a goal by ID, only if it belongs to `user_id`.
pub async fn get_goal_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Goal>> {
    let goal = sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch goal")?;

    Ok(goal)
}

/// List a user's goals, newest first.
pub async fn list_goals_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Goal>> {
    let goals = sqlx::query_as::<_, Goal>(
        "SELECT * FROM goals WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list goals")?;

    Ok(goals)
}

/// Record whether the goal's current task set came from the AI source.
pub async fn set_ai_generated(pool: &PgPool, id: Uuid, ai_generated: bool) -> Result<()> {
    let result = sqlx::query("UPDATE goals SET ai_generated = $1 WHERE id = $2")
        .bind(ai_generated)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update goal ai_generated flag")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("goal {id} not found");
    }

    Ok(())
}
