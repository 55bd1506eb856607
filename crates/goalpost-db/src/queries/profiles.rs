//! Database query functions for the `profiles` table and the leaderboard
//! ranking derived from it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Profile, SubscriptionTier};

/// Insert a new profile. `trial_ends_at` is stored as given; callers decide
/// the trial length.
pub async fn insert_profile(
    pool: &PgPool,
    display_name: Option<&str>,
    trial_ends_at: Option<DateTime<Utc>>,
) -> Result<Profile> {
    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (display_name, trial_ends_at) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(display_name)
    .bind(trial_ends_at)
    .fetch_one(pool)
    .await
    .context("failed to insert profile")?;

    Ok(profile)
}

/// Fetch a profile by user ID.
pub async fn get_profile(pool: &PgPool, id: Uuid) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch profile")?;

    Ok(profile)
}

/// Set the subscription tier and expiry on a profile. Usable inside a
/// transaction.
pub async fn set_subscription<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    tier: SubscriptionTier,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE profiles SET subscription_tier = $1, subscription_expires_at = $2 WHERE id = $3",
    )
    .bind(tier)
    .bind(expires_at)
    .bind(id)
    .execute(executor)
    .await
    .context("failed to update profile subscription")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("profile {id} not found");
    }

    Ok(())
}

/// Add `xp` to a profile's running total. Usable inside a transaction.
pub async fn add_xp<'e>(executor: impl PgExecutor<'e>, id: Uuid, xp: i32) -> Result<()> {
    let result = sqlx::query("UPDATE profiles SET total_xp = total_xp + $1 WHERE id = $2")
        .bind(xp)
        .bind(id)
        .execute(executor)
        .await
        .context("failed to add xp to profile")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("profile {id} not found");
    }

    Ok(())
}

/// One ranked row of the leaderboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub total_xp: i32,
    pub current_streak: i32,
    pub rank: i64,
}

/// Rank all profiles by total XP (descending), returning the top `limit`.
///
/// Ties share a rank; ordering within a tie falls back to streak then id.
pub async fn leaderboard(pool: &PgPool, limit: i64) -> Result<Vec<LeaderboardEntry>> {
    let rows = sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT id, display_name, avatar_url, total_xp, current_streak, \
                RANK() OVER (ORDER BY total_xp DESC) AS rank \
         FROM profiles \
         ORDER BY rank ASC, current_streak DESC, id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to query leaderboard")?;

    Ok(rows)
}
