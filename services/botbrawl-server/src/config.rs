//! Server configuration
//!
//! Layered, later sources win:
//! 1. Built-in defaults
//! 2. `config/default.{toml,json,yaml}`
//! 3. `config/local.{toml,json,yaml}`
//! 4. The file passed with `--config`
//! 5. `BOTBRAWL__*` environment variables (`.env` is read first)
//! 6. Command line flags

use std::time::Duration;

use anyhow::Context;
use botbrawl_api::ApiConfig;
use botbrawl_llm::OpenAiCompatConfig;
use botbrawl_orchestrator::RateLimitConfig;
use botbrawl_types::{BrawlConfig, OwnerId};
use serde::{Deserialize, Serialize};

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub api: ApiConfig,

    /// Engine tunables (rating, betting, battle timing, scheduler)
    #[serde(default)]
    pub brawl: BrawlConfig,

    /// Accounts created at startup; the in-memory stores start empty
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period for in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Which completion backend generates responses, verdicts and recaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Canned replies, no network
    #[default]
    Scripted,
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Reply used by the scripted provider
    #[serde(default = "default_scripted_reply")]
    pub scripted_reply: String,

    #[serde(default)]
    pub openai_compat: OpenAiCompatConfig,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            scripted_reply: default_scripted_reply(),
            openai_compat: OpenAiCompatConfig::default(),
        }
    }
}

/// A bearer token, its owner, and the agents registered to it at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSeed {
    pub token: String,

    /// Generated when absent
    #[serde(default)]
    pub owner_id: Option<OwnerId>,

    #[serde(default)]
    pub admin: bool,

    /// Credited through the faucet on startup
    #[serde(default)]
    pub starting_balance: u64,

    /// Display names of agents to register for this owner
    #[serde(default)]
    pub agents: Vec<String>,
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_scripted_reply() -> String {
    "Bring it on.".to_string()
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    /// Load configuration from files and environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("BOTBRAWL")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            anyhow::bail!("unknown log format {:?}, expected json or pretty", self.logging.format);
        }
        if self.brawl.scheduler.tick_interval_secs == 0 || self.brawl.scheduler.worker_interval_secs == 0 {
            anyhow::bail!("scheduler intervals must be at least one second");
        }
        let mut tokens: Vec<&str> = self.accounts.iter().map(|a| a.token.as_str()).collect();
        if tokens.iter().any(|t| t.trim().is_empty()) {
            anyhow::bail!("account tokens must not be empty");
        }
        tokens.sort_unstable();
        let before = tokens.len();
        tokens.dedup();
        if tokens.len() != before {
            anyhow::bail!("account tokens must be unique");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> ServerConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.llm.provider, ProviderKind::Scripted);
        assert_eq!(config.brawl.rating.default_rating, 1200);
        assert!(config.accounts.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = from_toml(
            r#"
            [server]
            port = 8080

            [llm]
            provider = "openai_compat"

            [llm.openai_compat]
            model = "brawler-7b"

            [brawl.battle]
            vote_quorum = 3

            [[accounts]]
            token = "admin-token"
            admin = true
            starting_balance = 1000
            agents = ["Razor", "Quill"]
            "#,
        );

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.provider, ProviderKind::OpenaiCompat);
        assert_eq!(config.llm.openai_compat.model, "brawler-7b");
        assert_eq!(config.brawl.battle.vote_quorum, Some(3));
        assert_eq!(config.brawl.rating.k_factor, 32.0);
        assert_eq!(config.accounts.len(), 1);
        assert!(config.accounts[0].admin);
        assert!(config.accounts[0].owner_id.is_none());
        assert_eq!(config.accounts[0].agents, vec!["Razor", "Quill"]);
    }

    #[test]
    fn test_validate_rejects_duplicate_tokens() {
        let mut config = ServerConfig::default();
        for _ in 0..2 {
            config.accounts.push(AccountSeed {
                token: "same".to_string(),
                owner_id: None,
                admin: false,
                starting_balance: 0,
                agents: Vec::new(),
            });
        }
        assert!(config.validate().is_err());

        config.accounts.pop();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
