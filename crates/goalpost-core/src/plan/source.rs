//! The `PlanSource` trait: anything that can turn goal parameters into a
//! list of task descriptors.

use std::sync::Arc;

use async_trait::async_trait;

use goalpost_db::models::GoalType;

use super::deterministic::DeterministicPlanSource;
use super::descriptor::{DescriptorError, TaskDescriptor};

/// Parameters for generating a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub goal_type: GoalType,
    pub title: String,
    pub description: String,
    pub duration_days: u32,
    /// 1..=5
    pub intensity: u8,
    /// Replaces the default user prompt when non-empty.
    pub custom_prompt: Option<String>,
}

/// Failures from a plan source. Each upstream condition is its own variant
/// so callers can report them distinctly.
#[derive(Debug, thiserror::Error)]
pub enum PlanSourceError {
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("AI credits exhausted. Please add credits to continue.")]
    CreditsExhausted,

    #[error("AI service unavailable (status {status})")]
    Unavailable { status: u16 },

    #[error("AI service timed out")]
    Timeout,

    #[error("AI service unreachable: {0}")]
    Transport(String),

    #[error("AI returned an invalid plan: {0}")]
    InvalidPlanFormat(#[from] DescriptorError),

    #[error("AI planning is not configured")]
    NotConfigured,
}

/// Produces a day-indexed list of task descriptors for a goal.
///
/// Object safe; held as `Arc<dyn PlanSource>` in [`PlanSources`].
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Short name used in logs ("deterministic", "ai").
    fn name(&self) -> &str;

    async fn generate(&self, request: &PlanRequest) -> Result<Vec<TaskDescriptor>, PlanSourceError>;
}

// Compile-time assertion: PlanSource must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanSource) {}
};

/// The set of plan sources available to the orchestrator.
#[derive(Clone)]
pub struct PlanSources {
    deterministic: Arc<dyn PlanSource>,
    ai: Option<Arc<dyn PlanSource>>,
}

impl PlanSources {
    /// Deterministic source plus an optional AI source.
    pub fn new(ai: Option<Arc<dyn PlanSource>>) -> Self {
        Self {
            deterministic: Arc::new(DeterministicPlanSource),
            ai,
        }
    }

    /// Pick the AI source when `use_ai`, else the deterministic one.
    pub fn select(&self, use_ai: bool) -> Result<&dyn PlanSource, PlanSourceError> {
        if use_ai {
            self.ai.as_deref().ok_or(PlanSourceError::NotConfigured)
        } else {
            Ok(self.deterministic.as_ref())
        }
    }

    pub fn ai_configured(&self) -> bool {
        self.ai.is_some()
    }
}

impl std::fmt::Debug for PlanSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanSources")
            .field("deterministic", &self.deterministic.name())
            .field("ai", &self.ai.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}
