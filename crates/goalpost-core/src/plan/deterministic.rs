//! One task per day, no external calls.

use async_trait::async_trait;

use super::descriptor::TaskDescriptor;
use super::source::{PlanRequest, PlanSource, PlanSourceError};

/// Emits `duration_days` descriptors titled "Day N: <goal title>" with day
/// offsets 0..duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicPlanSource;

impl DeterministicPlanSource {
    pub fn plan(request: &PlanRequest) -> Vec<TaskDescriptor> {
        (0..request.duration_days)
            .map(|offset| TaskDescriptor {
                day: Some(offset),
                title: format!("Day {}: {}", offset + 1, request.title),
                description: request.description.clone(),
                metadata: None,
            })
            .collect()
    }
}

#[async_trait]
impl PlanSource for DeterministicPlanSource {
    fn name(&self) -> &str {
        "deterministic"
    }

    async fn generate(&self, request: &PlanRequest) -> Result<Vec<TaskDescriptor>, PlanSourceError> {
        Ok(Self::plan(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalpost_db::models::GoalType;

    fn request(duration_days: u32) -> PlanRequest {
        PlanRequest {
            goal_type: GoalType::Fitness,
            title: "Run 5k".to_string(),
            description: "Build up slowly".to_string(),
            duration_days,
            intensity: 3,
            custom_prompt: None,
        }
    }

    #[test]
    fn thirty_days_gives_thirty_descriptors() {
        let plan = DeterministicPlanSource::plan(&request(30));
        assert_eq!(plan.len(), 30);
        assert_eq!(plan[0].day, Some(0));
        assert_eq!(plan[0].title, "Day 1: Run 5k");
        assert_eq!(plan[29].day, Some(29));
        assert_eq!(plan[29].title, "Day 30: Run 5k");
        assert!(plan.iter().all(|t| t.description == "Build up slowly"));
    }

    #[test]
    fn zero_days_gives_nothing() {
        assert!(DeterministicPlanSource::plan(&request(0)).is_empty());
    }
}
