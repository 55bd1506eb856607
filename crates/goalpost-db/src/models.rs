use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Error returned when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Human-readable name of the enum ("goal type", "task status", ...).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Category of a goal. Selects the AI planning template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Fitness,
    Learning,
    Exam,
    Seasonal,
}

impl GoalType {
    pub const ALL: [GoalType; 4] = [Self::Fitness, Self::Learning, Self::Exam, Self::Seasonal];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fitness => "fitness",
            Self::Learning => "learning",
            Self::Exam => "exam",
            Self::Seasonal => "seasonal",
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fitness" => Ok(Self::Fitness),
            "learning" => Ok(Self::Learning),
            "exam" => Ok(Self::Exam),
            "seasonal" => Ok(Self::Seasonal),
            other => Err(ParseEnumError {
                kind: "goal type",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------

/// How task completion for a goal must be proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    /// Self-reported.
    Normal,
    /// Camera capture required.
    Strict,
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Strict => "strict",
        })
    }
}

impl FromStr for VerificationMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "strict" => Ok(Self::Strict),
            other => Err(ParseEnumError {
                kind: "verification mode",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------

/// Lifecycle status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Paused,
    Abandoned,
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Abandoned => "abandoned",
        })
    }
}

impl FromStr for GoalStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(ParseEnumError {
                kind: "goal status",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------

/// Status of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        })
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            other => Err(ParseEnumError {
                kind: "task status",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------

/// Subscription tier recorded on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Free => "free",
            Self::Premium => "premium",
        })
    }
}

impl FromStr for SubscriptionTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(ParseEnumError {
                kind: "subscription tier",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A user profile. Holds the inputs for entitlement evaluation and the XP
/// totals the leaderboard ranks on.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub total_xp: i32,
    pub current_streak: i32,
    pub created_at: DateTime<Utc>,
}

/// A purchased (or operator-granted) subscription period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub amount: Option<i32>,
    pub currency: Option<String>,
    pub payment_provider: Option<String>,
    pub payment_id: Option<String>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
}

/// A user's goal. Owns the tasks materialized from its plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub goal_type: GoalType,
    pub verification_mode: VerificationMode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i32,
    pub intensity_level: i32,
    pub status: GoalStatus,
    pub ai_generated: bool,
    pub created_at: DateTime<Utc>,
}

/// A concrete, dated unit of work within a goal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub description: String,
    pub scheduled_date: NaiveDate,
    pub status: TaskStatus,
    pub verified: bool,
    pub xp_earned: i32,
    pub verification_data: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of one verification event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgressEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub task_id: Option<Uuid>,
    pub verified: bool,
    pub xp_gained: i32,
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
