mod config;
mod goal_cmds;
mod profile_cmds;
mod serve_cmd;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use goalpost_core::UserId;
use goalpost_core::entitlement;
use goalpost_db::config::DbConfig;
use goalpost_db::pool::{self, PoolRole};

use config::GoalpostConfig;

#[derive(Parser)]
#[command(
    name = "goalpost",
    about = "Goal tracking backend: AI task plans, verification XP, premium entitlements"
)]
struct Cli {
    /// Database URL (overrides GOALPOST_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a goalpost config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// API key for the AI planning gateway (AI planning stays off without one)
        #[arg(long)]
        ai_api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the goalpost database (requires config file or env vars)
    DbInit,
    /// Serve the HTTP API
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Profile management
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Goal management
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Show a user's premium entitlement
    Entitlement {
        /// User ID (omit for the anonymous default)
        user_id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Create a profile with a free trial
    Create {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Skip the free trial
        #[arg(long)]
        no_trial: bool,
    },
    /// Grant a premium subscription and record it
    GrantPremium {
        /// User ID
        user_id: String,
        /// Length of the subscription in days
        #[arg(long, default_value_t = 30)]
        days: i64,
        /// Amount paid, in minor currency units
        #[arg(long)]
        amount: Option<i32>,
        /// ISO currency code
        #[arg(long)]
        currency: Option<String>,
    },
    /// Issue a session token for a user
    Token {
        /// User ID
        user_id: String,
    },
}

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a goal and schedule its tasks
    Create {
        /// Owning user ID
        #[arg(long)]
        user: String,
        /// Goal title
        title: String,
        /// Goal description
        #[arg(long, default_value = "")]
        description: String,
        /// Goal type: fitness, learning, exam or seasonal
        #[arg(long = "type", default_value = "fitness")]
        goal_type: String,
        /// Verification mode: normal or strict
        #[arg(long, default_value = "normal")]
        verification: String,
        /// Start date, YYYY-MM-DD (default: today)
        #[arg(long)]
        start: Option<String>,
        /// End date, YYYY-MM-DD (exclusive)
        #[arg(long)]
        end: Option<String>,
        /// Duration in days, when no end date is given
        #[arg(long)]
        days: Option<i32>,
        /// Intensity, 1-5
        #[arg(long, default_value_t = 3)]
        intensity: i32,
        /// Ask the AI planner instead of the built-in template
        #[arg(long)]
        ai: bool,
        /// Custom prompt for the AI planner
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Show a goal and its tasks
    Show {
        /// Goal ID
        goal_id: String,
        /// Owning user ID
        #[arg(long)]
        user: String,
    },
    /// Recreate the tasks of a goal that has none
    Regenerate {
        /// Goal ID
        goal_id: String,
        /// Owning user ID
        #[arg(long)]
        user: String,
        /// Ask the AI planner instead of the built-in template
        #[arg(long)]
        ai: bool,
        /// Custom prompt for the AI planner
        #[arg(long)]
        prompt: Option<String>,
    },
}

/// Parse a user ID argument.
pub(crate) fn parse_user_id(raw: &str) -> anyhow::Result<UserId> {
    let id = uuid::Uuid::parse_str(raw).with_context(|| format!("invalid user ID: {raw}"))?;
    Ok(UserId(id))
}

/// Execute the `goalpost init` command: write config file.
fn cmd_init(db_url: &str, ai_api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let token_secret = config::generate_token_secret();
    let ai_enabled = ai_api_key.is_some();

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        auth: config::AuthSection {
            token_secret: token_secret.clone(),
        },
        ai: config::AiSection {
            api_key: ai_api_key,
            ..Default::default()
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  auth.token_secret = {}...{}", &token_secret[..8], &token_secret[56..]);
    if ai_enabled {
        println!("  ai.api_key = (set)");
    } else {
        println!("  ai planning disabled (no api key)");
    }
    println!();
    println!("Next: run `goalpost db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `goalpost db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = GoalpostConfig::resolve(cli_db_url)?;

    println!("Initializing goalpost database...");

    if pool::create_database_if_missing(&resolved.db_config).await? {
        println!("Created database.");
    }
    let db_pool = pool::create_pool(&resolved.db_config, PoolRole::Command).await?;
    pool::run_migrations(&db_pool).await?;

    let report = pool::schema_report(&db_pool).await?;
    println!(
        "Migrations applied: {} ({} pending)",
        report.applied.len(),
        report.pending
    );
    for table in &report.tables {
        match table.rows {
            Some(n) => println!("  {}: {n} rows", table.name),
            None => println!("  {}: MISSING", table.name),
        }
    }
    if !report.is_ready() {
        db_pool.close().await;
        anyhow::bail!("database schema is incomplete after migrating");
    }

    db_pool.close().await;

    println!("goalpost db-init complete.");
    Ok(())
}

/// Execute the `goalpost entitlement` command.
async fn cmd_entitlement(
    pool: &sqlx::PgPool,
    user_id: Option<&str>,
) -> anyhow::Result<()> {
    let user = user_id.map(parse_user_id).transpose()?;
    let status = entitlement::premium_status(pool, user, Utc::now()).await;
    let json = serde_json::to_string_pretty(&status).context("failed to serialize status")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            ai_api_key,
            force,
        } => {
            cmd_init(&db_url, ai_api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = GoalpostConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config, PoolRole::Server).await?;
            let state = serve_cmd::AppState::new(
                db_pool.clone(),
                resolved.token_config.clone(),
                resolved.plan_sources()?,
            );
            let result = serve_cmd::run_serve(state, &bind, port).await;
            db_pool.close().await;
            result?;
        }
        Commands::Profile { command } => {
            let resolved = GoalpostConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config, PoolRole::Command).await?;
            let result =
                profile_cmds::run_profile_command(command, &db_pool, &resolved.token_config).await;
            db_pool.close().await;
            result?;
        }
        Commands::Goal { command } => {
            let resolved = GoalpostConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config, PoolRole::Command).await?;
            let sources = resolved.plan_sources()?;
            let result = goal_cmds::run_goal_command(command, &db_pool, &sources).await;
            db_pool.close().await;
            result?;
        }
        Commands::Entitlement { user_id } => {
            let resolved = GoalpostConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config, PoolRole::Command).await?;
            let result = cmd_entitlement(&db_pool, user_id.as_deref()).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
