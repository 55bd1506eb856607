//! XP leaderboard, available to premium and trial users.

use chrono::Utc;
use sqlx::PgPool;

use goalpost_db::queries::profiles::{self, LeaderboardEntry};

use crate::UserId;
use crate::entitlement;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("the leaderboard requires a premium subscription")]
    PremiumRequired,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Top profiles by XP. `limit` defaults to [`DEFAULT_LIMIT`] and is clamped
/// to `1..=MAX_LIMIT`.
pub async fn leaderboard(
    pool: &PgPool,
    user: UserId,
    limit: Option<i64>,
) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
    let state = entitlement::evaluate(pool, Some(user), Utc::now()).await;
    if !state.has_premium_access() {
        return Err(LeaderboardError::PremiumRequired);
    }

    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(profiles::leaderboard(pool, limit).await?)
}
