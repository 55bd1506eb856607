//! Goal orchestration: validate input, persist the goal, generate a plan,
//! and materialize its tasks.
//!
//! The goal row and its tasks are written in two steps. When plan
//! generation or materialization fails after the goal is stored, the goal
//! is kept and the failure is reported in [`GoalCreation::task_error`];
//! [`regenerate_tasks`] fills in the tasks later.

use chrono::{Days, NaiveDate};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use goalpost_db::models::{Goal, GoalType, Task, VerificationMode};
use goalpost_db::queries::{goals as goal_queries, tasks as task_queries};

use crate::UserId;
use crate::plan::{MaterializeError, PlanRequest, PlanSource, PlanSourceError, PlanSources, materialize};

pub const MIN_DURATION_DAYS: i32 = 1;
pub const MAX_DURATION_DAYS: i32 = 365;

/// Caller-supplied goal parameters.
#[derive(Debug, Clone)]
pub struct GoalInput {
    pub title: String,
    pub description: String,
    pub goal_type: GoalType,
    pub verification_mode: VerificationMode,
    pub start_date: NaiveDate,
    /// Derived from `duration_days` when absent.
    pub end_date: Option<NaiveDate>,
    /// Must match the span between start and end when both are given.
    pub duration_days: Option<i32>,
    pub intensity: i32,
    pub use_ai: bool,
    pub custom_prompt: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GoalError {
    #[error("{0}")]
    Validation(String),

    #[error("goal {0} not found")]
    NotFound(Uuid),

    #[error("goal {goal_id} already has {count} tasks")]
    TasksExist { goal_id: Uuid, count: i64 },

    #[error(transparent)]
    Plan(#[from] PlanSourceError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Why the task half of goal creation failed.
#[derive(Debug, thiserror::Error)]
pub enum TaskStageError {
    #[error("plan generation failed: {0}")]
    Plan(#[from] PlanSourceError),

    #[error("task materialization failed: {0}")]
    Materialize(#[from] MaterializeError),
}

/// Outcome of [`create_goal`]. `task_error` is set on partial success.
#[derive(Debug)]
pub struct GoalCreation {
    pub goal: Goal,
    pub tasks_created: usize,
    pub tasks: Vec<Task>,
    pub task_error: Option<TaskStageError>,
}

/// Goal fields after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedGoal {
    pub title: String,
    pub end_date: NaiveDate,
    pub duration_days: i32,
    pub intensity: i32,
}

/// Check goal input and fill in the derived end date or duration.
pub fn validate(input: &GoalInput) -> Result<ValidatedGoal, GoalError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(GoalError::Validation("Goal title is required".to_string()));
    }

    if !(1..=5).contains(&input.intensity) {
        return Err(GoalError::Validation(format!(
            "intensity must be between 1 and 5, got {}",
            input.intensity
        )));
    }

    let check_duration = |days: i64| -> Result<i32, GoalError> {
        i32::try_from(days)
            .ok()
            .filter(|d| (MIN_DURATION_DAYS..=MAX_DURATION_DAYS).contains(d))
            .ok_or_else(|| {
                GoalError::Validation(format!(
                    "duration must be between {MIN_DURATION_DAYS} and {MAX_DURATION_DAYS} days, got {days}"
                ))
            })
    };

    let (end_date, duration_days) = match (input.end_date, input.duration_days) {
        (Some(end), supplied) => {
            if end <= input.start_date {
                return Err(GoalError::Validation(
                    "end date must be after start date".to_string(),
                ));
            }
            let span = (end - input.start_date).num_days();
            if let Some(d) = supplied {
                if i64::from(d) != span {
                    return Err(GoalError::Validation(format!(
                        "duration_days ({d}) does not match the {span} days between start and end"
                    )));
                }
            }
            (end, check_duration(span)?)
        }
        (None, Some(d)) => {
            let d = check_duration(i64::from(d))?;
            let end = input
                .start_date
                .checked_add_days(Days::new(d as u64))
                .ok_or_else(|| GoalError::Validation("end date is out of range".to_string()))?;
            (end, d)
        }
        (None, None) => {
            return Err(GoalError::Validation(
                "either end_date or duration_days is required".to_string(),
            ));
        }
    };

    Ok(ValidatedGoal {
        title: title.to_string(),
        end_date,
        duration_days,
        intensity: input.intensity,
    })
}

/// Build the plan request for a stored goal.
///
/// AI plans without a custom prompt ask for a plan for the goal itself.
pub fn plan_request(goal: &Goal, use_ai: bool, custom_prompt: Option<&str>) -> PlanRequest {
    let custom_prompt = match custom_prompt.map(str::trim) {
        Some(p) if !p.is_empty() => Some(p.to_string()),
        _ if use_ai => Some(
            format!(
                "Generate a {}-day plan for: {}. {}",
                goal.duration_days, goal.title, goal.description
            )
            .trim_end()
            .to_string(),
        ),
        _ => None,
    };

    PlanRequest {
        goal_type: goal.goal_type,
        title: goal.title.clone(),
        description: goal.description.clone(),
        duration_days: u32::try_from(goal.duration_days).unwrap_or(0),
        intensity: u8::try_from(goal.intensity_level.clamp(1, 5)).unwrap_or(3),
        custom_prompt,
    }
}

async fn generate_and_materialize(
    pool: &PgPool,
    source: &dyn PlanSource,
    user: UserId,
    goal: &Goal,
    request: &PlanRequest,
) -> Result<Vec<Task>, TaskStageError> {
    let descriptors = source.generate(request).await?;
    let tasks = materialize(pool, user, goal.id, &descriptors).await?;
    Ok(tasks)
}

/// Create a goal and its tasks.
///
/// Validation failures and a failed goal insert return `Err` with nothing
/// written. Once the goal is stored, plan or materialization failures are
/// returned as a partial success.
pub async fn create_goal(
    pool: &PgPool,
    sources: &PlanSources,
    user: UserId,
    input: GoalInput,
) -> Result<GoalCreation, GoalError> {
    let valid = validate(&input)?;
    let source = sources.select(input.use_ai)?;

    let goal = goal_queries::insert_goal(
        pool,
        &goal_queries::NewGoal {
            user_id: user.as_uuid(),
            title: &valid.title,
            description: input.description.trim(),
            goal_type: input.goal_type,
            verification_mode: input.verification_mode,
            start_date: input.start_date,
            end_date: valid.end_date,
            duration_days: valid.duration_days,
            intensity_level: valid.intensity,
            ai_generated: input.use_ai,
        },
    )
    .await?;

    info!(
        goal_id = %goal.id,
        user_id = %user,
        source = source.name(),
        duration_days = goal.duration_days,
        "goal created"
    );

    let request = plan_request(&goal, input.use_ai, input.custom_prompt.as_deref());
    match generate_and_materialize(pool, source, user, &goal, &request).await {
        Ok(tasks) => Ok(GoalCreation {
            goal,
            tasks_created: tasks.len(),
            tasks,
            task_error: None,
        }),
        Err(e) => {
            warn!(goal_id = %goal.id, error = %e, "goal stored without tasks");
            Ok(GoalCreation {
                goal,
                tasks_created: 0,
                tasks: Vec::new(),
                task_error: Some(e),
            })
        }
    }
}

/// Generate and materialize tasks for an existing goal that has none.
pub async fn regenerate_tasks(
    pool: &PgPool,
    sources: &PlanSources,
    user: UserId,
    goal_id: Uuid,
    use_ai: bool,
    custom_prompt: Option<&str>,
) -> Result<Vec<Task>, GoalError> {
    let goal = goal_queries::get_goal_for_user(pool, goal_id, user.as_uuid())
        .await?
        .ok_or(GoalError::NotFound(goal_id))?;

    let count = task_queries::count_tasks_for_goal(pool, goal_id).await?;
    if count > 0 {
        return Err(GoalError::TasksExist { goal_id, count });
    }

    let source = sources.select(use_ai)?;
    let request = plan_request(&goal, use_ai, custom_prompt);
    let descriptors = source.generate(&request).await?;
    let tasks = materialize(pool, user, goal_id, &descriptors).await?;

    if goal.ai_generated != use_ai {
        goal_queries::set_ai_generated(pool, goal_id, use_ai).await?;
    }

    info!(goal_id = %goal_id, tasks = tasks.len(), source = source.name(), "tasks regenerated");
    Ok(tasks)
}

/// Fetch a goal owned by `user` with its tasks in schedule order.
pub async fn get_goal_with_tasks(
    pool: &PgPool,
    user: UserId,
    goal_id: Uuid,
) -> Result<(Goal, Vec<Task>), GoalError> {
    let goal = goal_queries::get_goal_for_user(pool, goal_id, user.as_uuid())
        .await?
        .ok_or(GoalError::NotFound(goal_id))?;

    let tasks = task_queries::list_tasks_for_goal(pool, goal_id).await?;

    Ok((goal, tasks))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input() -> GoalInput {
        GoalInput {
            title: "Run 5k".to_string(),
            description: String::new(),
            goal_type: GoalType::Fitness,
            verification_mode: VerificationMode::Normal,
            start_date: date(2024, 3, 1),
            end_date: Some(date(2024, 3, 8)),
            duration_days: None,
            intensity: 3,
            use_ai: false,
            custom_prompt: None,
        }
    }

    fn validation_message(input: &GoalInput) -> String {
        match validate(input) {
            Err(GoalError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn end_date_gives_duration() {
        let valid = validate(&input()).unwrap();
        assert_eq!(valid.duration_days, 7);
        assert_eq!(valid.end_date, date(2024, 3, 8));
        assert_eq!(valid.title, "Run 5k");
    }

    #[test]
    fn duration_gives_end_date() {
        let mut i = input();
        i.end_date = None;
        i.duration_days = Some(30);
        let valid = validate(&i).unwrap();
        assert_eq!(valid.end_date, date(2024, 3, 31));
    }

    #[test]
    fn same_day_end_is_rejected() {
        let mut i = input();
        i.end_date = Some(i.start_date);
        assert!(validation_message(&i).contains("after start"));
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut i = input();
        i.title = "   ".to_string();
        assert_eq!(validation_message(&i), "Goal title is required");
    }

    #[test]
    fn intensity_out_of_range_is_rejected() {
        for bad in [0, 6] {
            let mut i = input();
            i.intensity = bad;
            assert!(validation_message(&i).contains("intensity"));
        }
    }

    #[test]
    fn mismatched_duration_is_rejected() {
        let mut i = input();
        i.duration_days = Some(10);
        assert!(validation_message(&i).contains("does not match"));
    }

    #[test]
    fn duration_bounds() {
        let mut i = input();
        i.end_date = None;
        i.duration_days = Some(0);
        assert!(validation_message(&i).contains("between 1 and 365"));

        i.duration_days = Some(366);
        assert!(validation_message(&i).contains("between 1 and 365"));

        i.duration_days = Some(365);
        assert!(validate(&i).is_ok());
    }

    #[test]
    fn missing_end_and_duration_is_rejected() {
        let mut i = input();
        i.end_date = None;
        assert!(validation_message(&i).contains("required"));
    }

    fn stored_goal() -> Goal {
        Goal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Learn Spanish".to_string(),
            description: "Conversational level".to_string(),
            goal_type: GoalType::Learning,
            verification_mode: VerificationMode::Normal,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 1, 31),
            duration_days: 30,
            intensity_level: 2,
            status: goalpost_db::models::GoalStatus::Active,
            ai_generated: true,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn ai_request_defaults_to_goal_prompt() {
        let req = plan_request(&stored_goal(), true, None);
        assert_eq!(
            req.custom_prompt.as_deref(),
            Some("Generate a 30-day plan for: Learn Spanish. Conversational level")
        );
        assert_eq!(req.duration_days, 30);
        assert_eq!(req.intensity, 2);
    }

    #[test]
    fn deterministic_request_has_no_prompt() {
        assert!(plan_request(&stored_goal(), false, None).custom_prompt.is_none());
    }

    #[test]
    fn explicit_prompt_is_kept() {
        let req = plan_request(&stored_goal(), true, Some("Focus on verbs"));
        assert_eq!(req.custom_prompt.as_deref(), Some("Focus on verbs"));
    }
}
