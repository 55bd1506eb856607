//! Database query functions for the `subscriptions` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Subscription, SubscriptionTier};

/// Parameters for inserting a subscription row.
#[derive(Debug, Clone)]
pub struct NewSubscription<'a> {
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub amount: Option<i32>,
    pub currency: Option<&'a str>,
    pub payment_provider: Option<&'a str>,
    pub payment_id: Option<&'a str>,
}

/// Insert a subscription row. Usable inside a transaction.
pub async fn insert_subscription<'e>(
    executor: impl PgExecutor<'e>,
    sub: &NewSubscription<'_>,
) -> Result<Subscription> {
    let row = sqlx::query_as::<_, Subscription>(
        "INSERT INTO subscriptions \
            (user_id, tier, starts_at, expires_at, amount, currency, payment_provider, payment_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(sub.user_id)
    .bind(sub.tier)
    .bind(sub.starts_at)
    .bind(sub.expires_at)
    .bind(sub.amount)
    .bind(sub.currency)
    .bind(sub.payment_provider)
    .bind(sub.payment_id)
    .fetch_one(executor)
    .await
    .context("failed to insert subscription")?;

    Ok(row)
}

/// Most recently created subscription of `tier` for a user, if any.
pub async fn latest_subscription(
    pool: &PgPool,
    user_id: Uuid,
    tier: SubscriptionTier,
) -> Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions \
         WHERE user_id = $1 AND tier = $2 \
         ORDER BY created_at DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .bind(tier)
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest subscription")?;

    Ok(row)
}
