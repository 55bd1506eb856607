//! Verification recorder: awards XP for a completed task and appends a
//! progress entry.

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use goalpost_db::models::{ProgressEntry, TaskStatus, VerificationMode};
use goalpost_db::queries::{
    goals as goal_queries, profiles, progress_entries, tasks as task_queries,
};

use crate::UserId;

/// XP for a self-reported verification.
pub const NORMAL_XP: i32 = 50;
/// XP for a camera verification.
pub const CAMERA_XP: i32 = 100;

const CAMERA_NOTES: &str = "Camera verified";

/// How the user proved the task was done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMethod {
    Normal,
    /// A client-side photo capture taken at `captured_at`.
    Camera { captured_at: DateTime<Utc> },
}

impl VerificationMethod {
    pub fn xp(self) -> i32 {
        match self {
            Self::Normal => NORMAL_XP,
            Self::Camera { .. } => CAMERA_XP,
        }
    }

    fn verification_data(self) -> Option<serde_json::Value> {
        match self {
            Self::Normal => None,
            Self::Camera { captured_at } => Some(json!({
                "method": "camera",
                "timestamp": captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            })),
        }
    }

    fn notes(self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::Camera { .. } => Some(CAMERA_NOTES),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("task must be completed before it can be verified")]
    NotCompleted,

    #[error("task is already verified")]
    AlreadyVerified,

    #[error("this goal requires camera verification")]
    CameraRequired,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Verify a completed task owned by `user`.
///
/// Marks the task verified with the method's XP, appends one progress
/// entry and adds the XP to the user's profile, all in one transaction.
pub async fn verify(
    pool: &PgPool,
    user: UserId,
    task_id: Uuid,
    method: VerificationMethod,
) -> Result<ProgressEntry, VerifyError> {
    let task = task_queries::get_task_for_user(pool, task_id, user.as_uuid())
        .await?
        .ok_or(VerifyError::TaskNotFound(task_id))?;

    if task.verified {
        return Err(VerifyError::AlreadyVerified);
    }
    if task.status != TaskStatus::Completed {
        return Err(VerifyError::NotCompleted);
    }

    let goal = goal_queries::get_goal(pool, task.goal_id)
        .await?
        .ok_or(VerifyError::TaskNotFound(task_id))?;
    if goal.verification_mode == VerificationMode::Strict
        && !matches!(method, VerificationMethod::Camera { .. })
    {
        return Err(VerifyError::CameraRequired);
    }

    let xp = method.xp();
    let data = method.verification_data();

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    // The guard in the UPDATE loses to a concurrent verification or
    // un-completion; the transaction rolls back on drop.
    let Some(verified) =
        task_queries::mark_task_verified(&mut *tx, task.id, xp, data.as_ref()).await?
    else {
        return Err(VerifyError::AlreadyVerified);
    };

    let entry = progress_entries::insert_progress_entry(
        &mut *tx,
        &progress_entries::NewProgressEntry {
            user_id: user.as_uuid(),
            goal_id: verified.goal_id,
            task_id: verified.id,
            verified: true,
            xp_gained: xp,
            notes: method.notes(),
            date: Utc::now().date_naive(),
        },
    )
    .await?;

    profiles::add_xp(&mut *tx, user.as_uuid(), xp).await?;

    tx.commit().await.context("failed to commit transaction")?;

    info!(task_id = %task.id, user_id = %user, xp, "task verified");
    Ok(entry)
}
