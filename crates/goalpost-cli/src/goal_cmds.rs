//! CLI handlers for `goalpost goal` subcommands.
//!
//! Implements:
//! - `goalpost goal create <title>`      -- create a goal and schedule its tasks
//! - `goalpost goal show <goal-id>`      -- show a goal and its tasks
//! - `goalpost goal regenerate <goal-id>` -- recreate tasks for a goal that has none

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use goalpost_core::goal::{self, GoalInput};
use goalpost_core::plan::PlanSources;
use goalpost_db::models::{GoalType, Task, VerificationMode};

use crate::{GoalCommands, parse_user_id};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `GoalCommands` variant to the appropriate handler.
pub async fn run_goal_command(
    command: GoalCommands,
    pool: &PgPool,
    sources: &PlanSources,
) -> Result<()> {
    match command {
        GoalCommands::Create {
            user,
            title,
            description,
            goal_type,
            verification,
            start,
            end,
            days,
            intensity,
            ai,
            prompt,
        } => {
            let input = GoalInput {
                title,
                description,
                goal_type: goal_type
                    .parse::<GoalType>()
                    .with_context(|| format!("invalid goal type: {goal_type}"))?,
                verification_mode: verification
                    .parse::<VerificationMode>()
                    .with_context(|| format!("invalid verification mode: {verification}"))?,
                start_date: match start {
                    Some(s) => parse_date(&s)?,
                    None => Utc::now().date_naive(),
                },
                end_date: end.as_deref().map(parse_date).transpose()?,
                duration_days: days,
                intensity,
                use_ai: ai,
                custom_prompt: prompt,
            };
            cmd_create(pool, sources, &user, input).await
        }
        GoalCommands::Show { goal_id, user } => cmd_show(pool, &goal_id, &user).await,
        GoalCommands::Regenerate {
            goal_id,
            user,
            ai,
            prompt,
        } => cmd_regenerate(pool, sources, &goal_id, &user, ai, prompt.as_deref()).await,
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date (expected YYYY-MM-DD): {raw}"))
}

fn parse_goal_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid goal ID: {raw}"))
}

// -----------------------------------------------------------------------
// goalpost goal create
// -----------------------------------------------------------------------

async fn cmd_create(
    pool: &PgPool,
    sources: &PlanSources,
    user_id: &str,
    input: GoalInput,
) -> Result<()> {
    let user = parse_user_id(user_id)?;
    let created = goal::create_goal(pool, sources, user, input).await?;
    let g = &created.goal;

    println!("Goal created.");
    println!();
    println!("  Goal ID:      {}", g.id);
    println!("  Title:        {}", g.title);
    println!("  Type:         {}", g.goal_type);
    println!("  Verification: {}", g.verification_mode);
    println!("  Dates:        {} .. {} ({} days)", g.start_date, g.end_date, g.duration_days);
    println!("  Planner:      {}", if g.ai_generated { "ai" } else { "template" });
    println!("  Tasks:        {}", created.tasks_created);

    if let Some(err) = &created.task_error {
        println!();
        println!("Warning: {err}");
        println!(
            "The goal was saved without tasks. Run `goalpost goal regenerate {} --user {user}` to retry.",
            g.id
        );
    }

    Ok(())
}

// -----------------------------------------------------------------------
// goalpost goal show
// -----------------------------------------------------------------------

async fn cmd_show(pool: &PgPool, goal_id: &str, user_id: &str) -> Result<()> {
    let user = parse_user_id(user_id)?;
    let id = parse_goal_id(goal_id)?;
    let (g, tasks) = goal::get_goal_with_tasks(pool, user, id).await?;

    println!("Goal: {} ({})", g.title, g.id);
    println!("  Type:         {}", g.goal_type);
    println!("  Verification: {}", g.verification_mode);
    println!("  Status:       {}", g.status);
    println!("  Dates:        {} .. {}", g.start_date, g.end_date);
    println!("  Intensity:    {}", g.intensity_level);
    if !g.description.is_empty() {
        println!("  Description:  {}", g.description);
    }
    println!();

    if tasks.is_empty() {
        println!("No tasks. Use `goalpost goal regenerate` to create them.");
        return Ok(());
    }

    let verified = tasks.iter().filter(|t| t.verified).count();
    let xp: i32 = tasks.iter().map(|t| t.xp_earned).sum();
    print_task_table(&tasks);
    println!();
    println!("{verified}/{} verified, {xp} XP earned.", tasks.len());
    Ok(())
}

fn print_task_table(tasks: &[Task]) {
    let title_w = tasks.iter().map(|t| t.title.len()).max().unwrap_or(5).max(5);
    println!("  {:<10}  {:<title_w$}  {:<9}  {:>3}", "DATE", "TITLE", "STATUS", "XP");
    for t in tasks {
        let status = if t.verified {
            "verified".to_string()
        } else {
            t.status.to_string()
        };
        println!(
            "  {:<10}  {:<title_w$}  {:<9}  {:>3}",
            t.scheduled_date, t.title, status, t.xp_earned
        );
    }
}

// -----------------------------------------------------------------------
// goalpost goal regenerate
// -----------------------------------------------------------------------

async fn cmd_regenerate(
    pool: &PgPool,
    sources: &PlanSources,
    goal_id: &str,
    user_id: &str,
    use_ai: bool,
    prompt: Option<&str>,
) -> Result<()> {
    let user = parse_user_id(user_id)?;
    let id = parse_goal_id(goal_id)?;
    let tasks = goal::regenerate_tasks(pool, sources, user, id, use_ai, prompt).await?;
    println!("Created {} tasks for goal {id}.", tasks.len());
    Ok(())
}
