//! CLI handlers for `goalpost profile` subcommands.
//!
//! Implements:
//! - `goalpost profile create`              -- create a profile (30-day trial by default)
//! - `goalpost profile grant-premium <id>`  -- set premium and record a subscription
//! - `goalpost profile token <id>`          -- issue a session token

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;

use goalpost_core::entitlement::{self, Payment};
use goalpost_core::token::{TokenConfig, generate_session_token};
use goalpost_db::queries::profiles;

use crate::{ProfileCommands, parse_user_id};

/// Dispatch a `ProfileCommands` variant to the appropriate handler.
pub async fn run_profile_command(
    command: ProfileCommands,
    pool: &PgPool,
    token_config: &TokenConfig,
) -> Result<()> {
    match command {
        ProfileCommands::Create { name, no_trial } => {
            cmd_create(pool, token_config, name.as_deref(), !no_trial).await
        }
        ProfileCommands::GrantPremium {
            user_id,
            days,
            amount,
            currency,
        } => {
            let payment = Payment {
                amount,
                currency: currency.as_deref(),
                provider: Some("manual"),
                payment_id: None,
            };
            cmd_grant_premium(pool, &user_id, days, payment).await
        }
        ProfileCommands::Token { user_id } => cmd_token(pool, token_config, &user_id).await,
    }
}

async fn cmd_create(
    pool: &PgPool,
    token_config: &TokenConfig,
    name: Option<&str>,
    with_trial: bool,
) -> Result<()> {
    let profile = entitlement::create_profile(pool, name, with_trial, Utc::now()).await?;
    let token = generate_session_token(token_config, profile.id.into());

    println!("Profile created.");
    println!();
    println!("  User ID:     {}", profile.id);
    if let Some(name) = &profile.display_name {
        println!("  Name:        {name}");
    }
    match profile.trial_ends_at {
        Some(end) => println!("  Trial ends:  {}", end.format("%Y-%m-%d %H:%M UTC")),
        None => println!("  Trial:       none"),
    }
    println!("  Token:       {token}");
    Ok(())
}

async fn cmd_grant_premium(
    pool: &PgPool,
    user_id: &str,
    days: i64,
    payment: Payment<'_>,
) -> Result<()> {
    let user = parse_user_id(user_id)?;
    let sub = entitlement::grant_premium(pool, user, days, payment, Utc::now()).await?;
    println!(
        "Premium granted to {user} until {}.",
        sub.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

/// Print a fresh session token. The profile must exist.
async fn cmd_token(pool: &PgPool, token_config: &TokenConfig, user_id: &str) -> Result<()> {
    let user = parse_user_id(user_id)?;
    if profiles::get_profile(pool, user.as_uuid()).await?.is_none() {
        anyhow::bail!("profile {user} not found");
    }
    println!("{}", generate_session_token(token_config, user));
    Ok(())
}
