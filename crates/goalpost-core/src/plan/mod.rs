//! Plans: descriptor parsing, plan sources, and materialization into tasks.

pub mod ai;
pub mod descriptor;
pub mod deterministic;
pub mod materialize;
pub mod source;

pub use ai::{AiConfig, AiPlanSource};
pub use descriptor::{
    DescriptorError, TaskDescriptor, descriptors_from_value, parse_plan_reply, strip_code_fences,
};
pub use deterministic::DeterministicPlanSource;
pub use materialize::{MaterializeError, ScheduledTask, materialize, schedule};
pub use source::{PlanRequest, PlanSource, PlanSourceError, PlanSources};
