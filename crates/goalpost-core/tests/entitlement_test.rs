//! Integration tests for entitlement lookup and the premium-gated
//! leaderboard.

use chrono::{Duration, SubsecRound, Utc};
use uuid::Uuid;

use goalpost_core::UserId;
use goalpost_core::entitlement::{self, EntitlementState, Payment, TRIAL_DAYS};
use goalpost_core::leaderboard::{self, LeaderboardError};
use goalpost_db::models::SubscriptionTier;
use goalpost_db::queries::profiles;
use goalpost_db::queries::subscriptions::{self, NewSubscription};
use goalpost_test_utils::{create_free_profile, create_premium_profile, create_test_db, drop_test_db};

#[tokio::test]
async fn premium_user_with_future_expiry() {
    let (pool, db_name) = create_test_db().await;
    let now = Utc::now();
    let profile = create_premium_profile(&pool, "pro", now + Duration::days(1)).await;

    let state = entitlement::evaluate(&pool, Some(UserId(profile.id)), now).await;
    assert!(state.is_premium);
    assert_eq!(state.tier, SubscriptionTier::Premium);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn premium_user_with_past_expiry() {
    let (pool, db_name) = create_test_db().await;
    let now = Utc::now();
    let profile = create_premium_profile(&pool, "lapsed", now - Duration::days(1)).await;

    let state = entitlement::evaluate(&pool, Some(UserId(profile.id)), now).await;
    assert!(!state.is_premium);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn anonymous_and_unknown_users_get_free_default() {
    let (pool, db_name) = create_test_db().await;

    let anon = entitlement::evaluate(&pool, None, Utc::now()).await;
    assert_eq!(anon, EntitlementState::free());

    let unknown = entitlement::evaluate(&pool, Some(UserId(Uuid::new_v4())), Utc::now()).await;
    assert_eq!(unknown, EntitlementState::free());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn store_failure_fails_closed() {
    let (pool, db_name) = create_test_db().await;
    let now = Utc::now();
    let profile = create_premium_profile(&pool, "pro", now + Duration::days(30)).await;

    // A closed pool makes every query fail.
    pool.close().await;
    let state = entitlement::evaluate(&pool, Some(UserId(profile.id)), now).await;
    assert_eq!(state, EntitlementState::free());

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn trial_user_reports_days_left() {
    let (pool, db_name) = create_test_db().await;
    let now = Utc::now();
    let profile = profiles::insert_profile(&pool, Some("trial"), Some(now + Duration::days(30)))
        .await
        .expect("insert should succeed");

    let state = entitlement::evaluate(&pool, Some(UserId(profile.id)), now).await;
    assert!(!state.is_premium);
    assert!(state.in_free_trial);
    assert_eq!(state.days_left_in_trial, 30);
    assert!(state.has_premium_access());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn premium_status_includes_latest_subscription() {
    let (pool, db_name) = create_test_db().await;
    let now = Utc::now();
    let expires = now + Duration::days(30);
    let profile = create_premium_profile(&pool, "pro", expires).await;
    subscriptions::insert_subscription(
        &pool,
        &NewSubscription {
            user_id: profile.id,
            tier: SubscriptionTier::Premium,
            starts_at: now,
            expires_at: expires,
            amount: None,
            currency: None,
            payment_provider: Some("manual"),
            payment_id: None,
        },
    )
    .await
    .expect("insert should succeed");

    let status = entitlement::premium_status(&pool, Some(UserId(profile.id)), now).await;
    assert!(status.state.is_premium);
    let sub = status.subscription.expect("subscription attached");
    assert_eq!(sub.payment_provider.as_deref(), Some("manual"));

    let free = create_free_profile(&pool, "free").await;
    let status = entitlement::premium_status(&pool, Some(UserId(free.id)), now).await;
    assert!(status.subscription.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn leaderboard_is_gated_for_free_users() {
    let (pool, db_name) = create_test_db().await;
    let free = create_free_profile(&pool, "free").await;

    let err = leaderboard::leaderboard(&pool, UserId(free.id), None)
        .await
        .expect_err("free user should be refused");
    assert!(matches!(err, LeaderboardError::PremiumRequired));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn leaderboard_ranks_for_premium_users() {
    let (pool, db_name) = create_test_db().await;
    let pro = create_premium_profile(&pool, "pro", Utc::now() + Duration::days(30)).await;
    let other = create_free_profile(&pool, "other").await;
    profiles::add_xp(&pool, other.id, 150)
        .await
        .expect("add_xp should succeed");
    profiles::add_xp(&pool, pro.id, 50)
        .await
        .expect("add_xp should succeed");

    let board = leaderboard::leaderboard(&pool, UserId(pro.id), None)
        .await
        .expect("premium user can view");
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].id, other.id);
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[1].rank, 2);

    let top = leaderboard::leaderboard(&pool, UserId(pro.id), Some(1))
        .await
        .expect("premium user can view");
    assert_eq!(top.len(), 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn new_profile_starts_trial() {
    let (pool, db_name) = create_test_db().await;
    // Postgres keeps microseconds.
    let now = Utc::now().trunc_subsecs(6);

    let trial = entitlement::create_profile(&pool, Some("new"), true, now)
        .await
        .expect("create should succeed");
    assert_eq!(trial.trial_ends_at, Some(now + Duration::days(TRIAL_DAYS)));
    assert_eq!(trial.subscription_tier, SubscriptionTier::Free);
    assert_eq!(trial.total_xp, 0);

    let state = entitlement::evaluate(&pool, Some(UserId(trial.id)), now).await;
    assert!(state.in_free_trial);
    assert_eq!(state.days_left_in_trial, TRIAL_DAYS);

    let plain = entitlement::create_profile(&pool, None, false, now)
        .await
        .expect("create should succeed");
    assert!(plain.trial_ends_at.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn grant_premium_updates_profile_and_records_subscription() {
    let (pool, db_name) = create_test_db().await;
    let now = Utc::now().trunc_subsecs(6);
    let user = UserId(create_free_profile(&pool, "buyer").await.id);

    let sub = entitlement::grant_premium(
        &pool,
        user,
        30,
        Payment {
            amount: Some(499),
            currency: Some("EUR"),
            provider: Some("manual"),
            payment_id: None,
        },
        now,
    )
    .await
    .expect("grant should succeed");
    assert_eq!(sub.expires_at, now + Duration::days(30));
    assert_eq!(sub.amount, Some(499));

    let status = entitlement::premium_status(&pool, Some(user), now).await;
    assert!(status.state.is_premium);
    assert_eq!(status.state.expires_at, Some(sub.expires_at));
    assert_eq!(status.subscription.map(|s| s.id), Some(sub.id));

    let err = entitlement::grant_premium(&pool, UserId(Uuid::new_v4()), 30, Payment::default(), now)
        .await
        .expect_err("unknown profile should fail");
    assert!(err.to_string().contains("not found"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn failed_grant_leaves_profile_unchanged() {
    let (pool, db_name) = create_test_db().await;
    let now = Utc::now();
    let user = UserId(create_free_profile(&pool, "buyer").await.id);
    sqlx::query(
        "ALTER TABLE subscriptions \
         ADD CONSTRAINT refuse_blocked CHECK (payment_provider <> 'blocked')",
    )
    .execute(&pool)
    .await
    .expect("alter should succeed");

    let payment = Payment {
        provider: Some("blocked"),
        ..Payment::default()
    };
    entitlement::grant_premium(&pool, user, 30, payment, now)
        .await
        .expect_err("subscription insert should fail");

    let profile = profiles::get_profile(&pool, user.as_uuid())
        .await
        .expect("get should succeed")
        .expect("profile exists");
    assert_eq!(profile.subscription_tier, SubscriptionTier::Free);
    assert_eq!(profile.subscription_expires_at, None);
    assert!(!entitlement::evaluate(&pool, Some(user), now).await.is_premium);

    pool.close().await;
    drop_test_db(&db_name).await;
}
