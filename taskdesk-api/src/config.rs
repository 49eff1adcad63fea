//! Configuration management for the API server
//!
//! Settings are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. `taskdesk.toml` in the working directory, or the file named by
//!    `TASKDESK_CONFIG` (optional)
//! 3. Environment variables prefixed with `TASKDESK__`, sections separated by
//!    `__` (e.g. `TASKDESK__DATABASE__URL`, `TASKDESK__SERVER__PORT`)
//!
//! `DATABASE_URL` and `REDIS_URL` are honoured as fallbacks when neither the
//! file nor a `TASKDESK__` variable sets the URL.
//!
//! # Example
//!
//! ```no_run
//! use taskdesk_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use taskdesk_shared::cache::{redis::RedisConfig, CacheTtls};
use taskdesk_shared::db::pool::DatabaseConfig;

const DEFAULT_CONFIG_FILE: &str = "taskdesk.toml";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub cache: CacheTtls,
    pub log: LogConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Log output configuration
///
/// Verbosity is controlled by `RUST_LOG`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Loads configuration from defaults, the optional config file and the
    /// environment
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed, a value has the wrong
    /// type, or no database URL is configured anywhere.
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let path = env::var("TASKDESK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = config::Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("TASKDESK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            );

        if let Ok(url) = env::var("DATABASE_URL") {
            builder = builder.set_default("database.url", url)?;
        }
        if let Ok(url) = env::var("REDIS_URL") {
            builder = builder.set_default("redis.url", url)?;
        }

        Self::from_builder(builder)
    }

    /// Builds and validates a configuration from an assembled source stack
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let config: Config = builder.build()?.try_deserialize()?;

        if config.database.url.is_empty() {
            anyhow::bail!(
                "Database URL is required (set TASKDESK__DATABASE__URL or DATABASE_URL)"
            );
        }

        Ok(config)
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
