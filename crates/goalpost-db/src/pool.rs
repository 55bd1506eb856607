//! Connection pools, embedded migrations, and the schema report printed by
//! `goalpost db-init`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::{info, warn};

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/goalpost-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by goalpost, parents before children.
pub const TABLES: [&str; 5] = [
    "profiles",
    "subscriptions",
    "goals",
    "tasks",
    "progress_entries",
];

/// What a pool is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolRole {
    /// A single CLI command: sequential queries, then exit.
    Command,
    /// `goalpost serve`: concurrent requests, some holding a transaction.
    Server,
}

impl PoolRole {
    pub fn max_connections(self) -> u32 {
        match self {
            Self::Command => 2,
            Self::Server => 16,
        }
    }

    /// Requests should fail fast when the pool is saturated; commands can wait.
    pub fn acquire_timeout(self) -> Duration {
        match self {
            Self::Command => Duration::from_secs(10),
            Self::Server => Duration::from_secs(3),
        }
    }
}

/// Open a pool against `config.database_url`, sized for `role`.
pub async fn create_pool(config: &DbConfig, role: PoolRole) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(role.max_connections())
        .acquire_timeout(role.acquire_timeout())
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

/// Apply every embedded migration not yet recorded in `_sqlx_migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    info!(embedded = MIGRATOR.iter().count(), "migrations up to date");
    Ok(())
}

/// The database name from `config`, restricted to characters that are safe
/// to splice into `CREATE DATABASE` (which takes no bind parameters).
fn creatable_database_name(config: &DbConfig) -> Result<&str> {
    let Some(name) = config.database_name() else {
        bail!("no database name in URL {}", config.database_url);
    };
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        bail!("database name {name:?} must be lowercase letters, digits and underscores");
    }
    Ok(name)
}

/// Create the configured database through the `postgres` maintenance
/// database unless it already exists. Returns `true` when it was created.
pub async fn create_database_if_missing(config: &DbConfig) -> Result<bool> {
    let name = creatable_database_name(config)?;
    let maintenance_url = config.maintenance_url();

    let admin = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(PoolRole::Command.acquire_timeout())
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to {maintenance_url}"))?;

    let present: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&admin)
            .await
            .context("failed to look up database")?;

    let created = if present {
        false
    } else {
        admin
            .execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .with_context(|| format!("failed to create database {name}"))?;
        info!(db = name, "database created");
        true
    };

    admin.close().await;
    Ok(created)
}

/// Row count for one of [`TABLES`]; `rows` is `None` if the table is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub name: &'static str,
    pub rows: Option<i64>,
}

/// Migration and table state of a goalpost database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReport {
    /// Versions recorded as successfully applied, ascending.
    pub applied: Vec<i64>,
    /// Embedded migrations not yet applied.
    pub pending: usize,
    pub tables: Vec<TableStatus>,
}

impl SchemaReport {
    pub fn is_ready(&self) -> bool {
        self.pending == 0 && self.tables.iter().all(|t| t.rows.is_some())
    }
}

/// Inspect the database behind `pool`. Works before migrations have run.
pub async fn schema_report(pool: &PgPool) -> Result<SchemaReport> {
    let has_ledger: bool = sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
        .fetch_one(pool)
        .await
        .context("failed to check for migration ledger")?;

    let applied: Vec<i64> = if has_ledger {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
            .fetch_all(pool)
            .await
            .context("failed to read applied migrations")?
    } else {
        Vec::new()
    };
    let pending = MIGRATOR
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count();

    let mut tables = Vec::with_capacity(TABLES.len());
    for name in TABLES {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(name)
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to check table {name}"))?;
        let rows = if exists {
            let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {name}"))
                .fetch_one(pool)
                .await
                .with_context(|| format!("failed to count rows in {name}"))?;
            Some(n)
        } else {
            warn!(table = name, "table missing");
            None
        };
        tables.push(TableStatus { name, rows });
    }

    Ok(SchemaReport {
        applied,
        pending,
        tables,
    })
}
