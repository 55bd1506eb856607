//! Configuration file management for goalpost.
//!
//! Provides a TOML-based config file at `~/.config/goalpost/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use goalpost_core::plan::{AiConfig, AiPlanSource, PlanSource, PlanSources};
use goalpost_core::token::{TOKEN_SECRET_ENV, TokenConfig};
use goalpost_db::config::DbConfig;

pub const AI_API_KEY_ENV: &str = "GOALPOST_AI_API_KEY";
pub const AI_ENDPOINT_ENV: &str = "GOALPOST_AI_ENDPOINT";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default, skip_serializing_if = "AiSection::is_empty")]
    pub ai: AiSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// Hex-encoded token secret (64 hex chars = 32 bytes).
    pub token_secret: String,
}

/// Chat-completions gateway settings. Planning with AI is disabled when no
/// API key is configured anywhere.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AiSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl AiSection {
    fn is_empty(&self) -> bool {
        self.endpoint.is_none()
            && self.api_key.is_none()
            && self.model.is_none()
            && self.timeout_secs.is_none()
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the goalpost config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/goalpost` or `~/.config/goalpost`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("goalpost");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("goalpost")
}

/// Return the path to the goalpost config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Generate a random token secret: 32 random bytes, hex-encoded (64 chars).
pub fn generate_token_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct GoalpostConfig {
    pub db_config: DbConfig,
    pub token_config: TokenConfig,
    /// `None` when no AI API key is configured.
    pub ai_config: Option<AiConfig>,
}

impl GoalpostConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `GOALPOST_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Token secret: `GOALPOST_TOKEN_SECRET` > `auth.token_secret` > error
    /// - AI key: `GOALPOST_AI_API_KEY` > `ai.api_key` > disabled
    /// - AI endpoint: `GOALPOST_AI_ENDPOINT` > `ai.endpoint` > built-in default
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        let token_config = if let Ok(secret_hex) = std::env::var(TOKEN_SECRET_ENV) {
            TokenConfig::from_hex(&secret_hex)
                .with_context(|| format!("{TOKEN_SECRET_ENV} env var is not a valid secret"))?
        } else if let Some(ref cfg) = file_config {
            TokenConfig::from_hex(&cfg.auth.token_secret)
                .context("invalid token_secret in config file")?
        } else {
            bail!(
                "token secret not found; set {TOKEN_SECRET_ENV} or run `goalpost init` to create a config file"
            );
        };

        let ai_section = file_config.as_ref().map(|cfg| &cfg.ai);
        let ai_config = resolve_ai(ai_section);

        Ok(Self {
            db_config,
            token_config,
            ai_config,
        })
    }

    /// Build the plan sources: always deterministic, plus AI when configured.
    pub fn plan_sources(&self) -> Result<PlanSources> {
        let ai = match &self.ai_config {
            Some(config) => {
                let source = AiPlanSource::new(config.clone())
                    .context("failed to build AI plan client")?;
                Some(Arc::new(source) as Arc<dyn PlanSource>)
            }
            None => None,
        };
        Ok(PlanSources::new(ai))
    }
}

fn resolve_ai(section: Option<&AiSection>) -> Option<AiConfig> {
    let api_key = std::env::var(AI_API_KEY_ENV)
        .ok()
        .or_else(|| section.and_then(|s| s.api_key.clone()))
        .filter(|key| !key.trim().is_empty())?;

    let mut config = AiConfig::new(api_key);
    if let Some(endpoint) = std::env::var(AI_ENDPOINT_ENV)
        .ok()
        .or_else(|| section.and_then(|s| s.endpoint.clone()))
    {
        config.endpoint = endpoint;
    }
    if let Some(model) = section.and_then(|s| s.model.clone()) {
        config.model = model;
    }
    if let Some(secs) = section.and_then(|s| s.timeout_secs) {
        config.timeout = Duration::from_secs(secs);
    }
    Some(config)
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
