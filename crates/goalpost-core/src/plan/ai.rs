//! AI-delegated plan source backed by an OpenAI-compatible chat-completions
//! endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, info};

use goalpost_db::models::GoalType;

use super::descriptor::{DescriptorError, TaskDescriptor, parse_plan_reply};
use super::source::{PlanRequest, PlanSource, PlanSourceError};

pub const DEFAULT_ENDPOINT: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Full URL of the chat-completions endpoint.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Upper bound on the whole request, including reading the body.
    pub timeout: Duration,
}

impl AiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// System prompt for a goal category.
pub fn system_prompt(goal_type: GoalType, duration_days: u32, intensity: u8) -> String {
    match goal_type {
        GoalType::Fitness => format!(
            "You are an expert fitness coach. Create a realistic, progressive {duration_days}-day \
             fitness plan with {intensity}/5 intensity. Include exercises, sets, reps, and rest \
             days. Format each day as a JSON object with: day, title, description, exercises array."
        ),
        GoalType::Learning => format!(
            "You are an expert educator. Create a structured {duration_days}-day learning plan \
             with {intensity}/5 intensity. Break down topics logically with daily milestones. \
             Format each day as a JSON object with: day, title, description, topics array."
        ),
        GoalType::Exam => format!(
            "You are an expert exam preparation coach. Create a comprehensive {duration_days}-day \
             study plan with {intensity}/5 intensity. Include topics, practice sessions, and \
             revision days. Format each day as a JSON object with: day, title, description, \
             topics array."
        ),
        GoalType::Seasonal => format!(
            "You are a goal achievement expert. Create an achievable {duration_days}-day seasonal \
             goal plan with {intensity}/5 intensity. Format each day as a JSON object with: day, \
             title, description, activities array."
        ),
    }
}

/// User prompt: the custom prompt when given, else a generic request.
pub fn user_prompt(request: &PlanRequest) -> String {
    match request.custom_prompt.as_deref().map(str::trim) {
        Some(custom) if !custom.is_empty() => custom.to_string(),
        _ => format!(
            "Generate a {}-day {} plan with {}/5 intensity level. Return ONLY a JSON array of \
             tasks, no markdown formatting.",
            request.duration_days, request.goal_type, request.intensity
        ),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Plan source that asks a chat model for the plan.
pub struct AiPlanSource {
    client: reqwest::Client,
    config: AiConfig,
}

impl AiPlanSource {
    pub fn new(config: AiConfig) -> Result<Self, PlanSourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlanSourceError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn map_send_error(e: reqwest::Error) -> PlanSourceError {
        if e.is_timeout() {
            PlanSourceError::Timeout
        } else {
            PlanSourceError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl PlanSource for AiPlanSource {
    fn name(&self) -> &str {
        "ai"
    }

    async fn generate(&self, request: &PlanRequest) -> Result<Vec<TaskDescriptor>, PlanSourceError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": system_prompt(request.goal_type, request.duration_days, request.intensity),
                },
                { "role": "user", "content": user_prompt(request) },
            ],
        });

        debug!(endpoint = %self.config.endpoint, goal_type = %request.goal_type, "requesting AI plan");

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            error!(status = status.as_u16(), body = %text, "AI gateway error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => PlanSourceError::RateLimited,
                StatusCode::PAYMENT_REQUIRED => PlanSourceError::CreditsExhausted,
                other => PlanSourceError::Unavailable {
                    status: other.as_u16(),
                },
            });
        }

        let text = response.text().await.map_err(Self::map_send_error)?;
        let completion: ChatCompletion = serde_json::from_str(&text)
            .map_err(|e| DescriptorError::NotJson(format!("completion envelope: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(DescriptorError::MissingContent)?;

        let tasks = parse_plan_reply(&content).inspect_err(|e| {
            error!(error = %e, "AI reply did not match the plan schema");
        })?;

        info!(tasks = tasks.len(), model = %self.config.model, "AI plan generated");
        Ok(tasks)
    }
}
