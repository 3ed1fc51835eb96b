//! # Application Configuration
//!
//! Centralized configuration management using environment variables.
//!
//! ## How It Works
//!
//! Configuration is loaded from multiple sources in order of precedence:
//!
//! 1. **Default values** - Sensible defaults for local development
//! 2. **`.env` file** - Local overrides (git-ignored)
//! 3. **Environment variables** - container/orchestrator configuration
//!
//! ## Environment Variable Format
//!
//! Variables use the `APP_` prefix with `__` as nested separator:
//!
//! ```bash
//! APP_SERVER__HOST=0.0.0.0
//! APP_SERVER__PORT=9229
//!
//! # Plain overrides an operator actually needs day to day:
//! BIND_ADDR=0.0.0.0:9229
//! DATA_DIR=./data
//! TRIGGERS_FILE=./triggers.json
//! ISSUER_BASE_URL=http://localhost:9229
//! ```
//!
//! ## Configuration Sections
//!
//! | Section | Purpose |
//! |---------|---------|
//! | `server` | HTTP listener settings |
//! | `persistence` | On-disk pool/user store location |
//! | `triggers` | Lambda-trigger invocable registry file |
//! | `issuer_base_url` | Base URL embedded in JWT `iss` and JWKS/OIDC docs |
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use shared::config::AppConfig;
//!
//! let config = AppConfig::from_env()?;
//!
//! if config.is_production() {
//!     // enable stricter defaults
//! }
//! ```

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Main application configuration.
///
/// This struct is the root of all configuration. It's designed to be
/// immutable after creation - load once at startup and share via `Arc`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings (host, port, workers).
    pub server: ServerConfig,

    /// On-disk location of the per-pool JSON documents.
    pub persistence: PersistenceConfig,

    /// Lifecycle-trigger invocable registry.
    pub triggers: TriggerConfig,

    /// Base URL embedded in issued tokens' `iss` claim and served at
    /// `/.well-known/*` discovery endpoints.
    #[serde(default = "default_issuer_base_url")]
    pub issuer_base_url: String,

    /// Service name for tracing and logging.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Runtime environment (development/staging/production).
    #[serde(default)]
    pub environment: AppEnvironment,
}

/// HTTP server configuration.
///
/// These settings control how Actix-web binds and scales.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind to.
    /// Default: `0.0.0.0`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port number to listen on.
    /// Default: `9229`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads.
    /// Default: `0` (auto-detect based on CPU cores).
    #[serde(default)]
    pub workers: usize,
}

impl ServerConfig {
    /// `host:port` string ready for `HttpServer::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// On-disk persistence configuration.
///
/// Each pool is stored as its own JSON document under this directory,
/// rewritten in full and fsynced after every mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding one `<pool-id>.json` file per user pool.
    /// Default: `./data`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

/// Lifecycle-trigger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    /// Path to the JSON file mapping pool id + trigger name to an
    /// invocable (script or HTTP endpoint). Absent file means no
    /// triggers are bound.
    #[serde(default = "default_triggers_file")]
    pub triggers_file: String,
}

/// Application runtime environment.
///
/// Affects logging format and default verbosity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    /// Local development - verbose logging, pretty-printed.
    Development,
    /// Pre-production testing.
    Staging,
    /// Production - JSON logging.
    Production,
}

impl Default for AppEnvironment {
    fn default() -> Self {
        Self::Development
    }
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Process
    ///
    /// 1. Loads `.env` file if present (silently ignores if missing)
    /// 2. Applies default values
    /// 3. Overrides with `APP_*` environment variables
    /// 4. Applies the plain, unprefixed overrides an operator reaches for
    ///    day to day (`BIND_ADDR`, `DATA_DIR`, `TRIGGERS_FILE`,
    ///    `ISSUER_BASE_URL`, `SERVICE_NAME`)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed to their expected types.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.workers", 0)?
            .set_default("persistence.data_dir", default_data_dir())?
            .set_default("triggers.triggers_file", default_triggers_file())?
            .set_default("issuer_base_url", default_issuer_base_url())?
            .set_default("service_name", default_service_name())?
            .set_default("environment", "development")?
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(bind_addr) = std::env::var("BIND_ADDR") {
            if let Some((host, port)) = bind_addr.rsplit_once(':') {
                builder = builder
                    .set_override("server.host", host)?
                    .set_override("server.port", port.parse::<i64>().unwrap_or(default_port() as i64))?;
            }
        }
        builder = builder
            .set_override_option("persistence.data_dir", std::env::var("DATA_DIR").ok())?
            .set_override_option("triggers.triggers_file", std::env::var("TRIGGERS_FILE").ok())?
            .set_override_option("issuer_base_url", std::env::var("ISSUER_BASE_URL").ok())?
            .set_override_option("service_name", std::env::var("SERVICE_NAME").ok())?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Returns `true` if running in development mode.
    #[inline]
    pub fn is_development(&self) -> bool {
        self.environment == AppEnvironment::Development
    }

    /// Returns `true` if running in production mode.
    ///
    /// Controls JSON vs. pretty-printed log output.
    #[inline]
    pub fn is_production(&self) -> bool {
        self.environment == AppEnvironment::Production
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9229
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_triggers_file() -> String {
    "./triggers.json".to_string()
}

fn default_issuer_base_url() -> String {
    "http://localhost:9229".to_string()
}

fn default_service_name() -> String {
    "cognito-local".to_string()
}

// =============================================================================
// Tests
// =============================================================================
