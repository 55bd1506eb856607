//! Premium entitlement evaluation.
//!
//! [`EntitlementState::from_profile`] is the pure computation; [`evaluate`]
//! wraps it with a profile lookup and fails closed to the free default when
//! anything goes wrong.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use goalpost_db::models::{Profile, Subscription, SubscriptionTier};
use goalpost_db::queries::subscriptions::NewSubscription;
use goalpost_db::queries::{profiles, subscriptions};

use crate::UserId;

/// Length of the free trial given to new profiles.
pub const TRIAL_DAYS: i64 = 30;

/// Computed subscription and trial status for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementState {
    pub is_premium: bool,
    pub in_free_trial: bool,
    pub days_left_in_trial: i64,
    pub tier: SubscriptionTier,
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntitlementState {
    /// The state for anonymous users and failed lookups.
    pub fn free() -> Self {
        Self {
            is_premium: false,
            in_free_trial: false,
            days_left_in_trial: 0,
            tier: SubscriptionTier::Free,
            expires_at: None,
        }
    }

    /// Compute entitlement from a profile at `now`.
    ///
    /// Premium requires the premium tier and an expiry strictly in the
    /// future; a premium row without an expiry is not premium. Trial days
    /// are rounded up.
    pub fn from_profile(profile: &Profile, now: DateTime<Utc>) -> Self {
        let is_premium = profile.subscription_tier == SubscriptionTier::Premium
            && profile.subscription_expires_at.is_some_and(|exp| exp > now);

        let (in_free_trial, days_left_in_trial) = match profile.trial_ends_at {
            Some(trial_end) if trial_end > now => {
                let remaining = trial_end - now;
                let whole = remaining.num_days();
                let partial = remaining > Duration::days(whole);
                (true, whole + i64::from(partial))
            }
            _ => (false, 0),
        };

        Self {
            is_premium,
            in_free_trial,
            days_left_in_trial,
            tier: profile.subscription_tier,
            expires_at: profile.subscription_expires_at,
        }
    }

    /// Whether gated features (the leaderboard) are available.
    pub fn has_premium_access(&self) -> bool {
        self.is_premium || self.in_free_trial
    }
}

/// Evaluate entitlement for an optional user. Never fails: an anonymous
/// caller, a missing profile or a store error all yield
/// [`EntitlementState::free`].
pub async fn evaluate(pool: &PgPool, user: Option<UserId>, now: DateTime<Utc>) -> EntitlementState {
    let Some(user) = user else {
        return EntitlementState::free();
    };

    match profiles::get_profile(pool, user.as_uuid()).await {
        Ok(Some(profile)) => EntitlementState::from_profile(&profile, now),
        Ok(None) => {
            warn!(user_id = %user, "no profile for user, treating as free");
            EntitlementState::free()
        }
        Err(e) => {
            warn!(user_id = %user, error = %e, "entitlement lookup failed, treating as free");
            EntitlementState::free()
        }
    }
}

/// Entitlement plus the latest premium subscription record, as reported by
/// the premium-status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumStatus {
    #[serde(flatten)]
    pub state: EntitlementState,
    pub subscription: Option<Subscription>,
}

/// Evaluate entitlement and, for premium users, attach the most recent
/// premium subscription. Fails closed like [`evaluate`].
pub async fn premium_status(
    pool: &PgPool,
    user: Option<UserId>,
    now: DateTime<Utc>,
) -> PremiumStatus {
    let state = evaluate(pool, user, now).await;

    let subscription = match user {
        Some(user) if state.is_premium => {
            match subscriptions::latest_subscription(pool, user.as_uuid(), SubscriptionTier::Premium)
                .await
            {
                Ok(sub) => sub,
                Err(e) => {
                    warn!(user_id = %user, error = %e, "subscription lookup failed");
                    None
                }
            }
        }
        _ => None,
    };

    PremiumStatus { state, subscription }
}

/// Create a profile, starting a [`TRIAL_DAYS`] free trial when `with_trial`.
pub async fn create_profile(
    pool: &PgPool,
    display_name: Option<&str>,
    with_trial: bool,
    now: DateTime<Utc>,
) -> Result<Profile> {
    let trial_ends_at = with_trial.then(|| now + Duration::days(TRIAL_DAYS));
    profiles::insert_profile(pool, display_name, trial_ends_at).await
}

/// Payment details recorded alongside a premium grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Payment<'a> {
    pub amount: Option<i32>,
    pub currency: Option<&'a str>,
    pub provider: Option<&'a str>,
    pub payment_id: Option<&'a str>,
}

/// Make `user` premium for `days` from `now` and record the subscription.
pub async fn grant_premium(
    pool: &PgPool,
    user: UserId,
    days: i64,
    payment: Payment<'_>,
    now: DateTime<Utc>,
) -> Result<Subscription> {
    if days <= 0 {
        anyhow::bail!("subscription length must be positive, got {days} days");
    }
    let expires_at = now + Duration::days(days);

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    profiles::set_subscription(
        &mut *tx,
        user.as_uuid(),
        SubscriptionTier::Premium,
        Some(expires_at),
    )
    .await?;
    let sub = subscriptions::insert_subscription(
        &mut *tx,
        &NewSubscription {
            user_id: user.as_uuid(),
            tier: SubscriptionTier::Premium,
            starts_at: now,
            expires_at,
            amount: payment.amount,
            currency: payment.currency,
            payment_provider: payment.provider,
            payment_id: payment.payment_id,
        },
    )
    .await?;
    tx.commit().await.context("failed to commit transaction")?;

    info!(user_id = %user, %expires_at, "premium granted");
    Ok(sub)
}
