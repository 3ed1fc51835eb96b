//! # cognito-local-rs - Shared Library
//!
//! Core utilities shared between the `cognito-local` binary and any future
//! auxiliary tooling in this workspace.
//!
//! ## Modules
//!
//! | Module | Purpose | Key Types |
//! |--------|---------|-----------|
//! | [`config`] | Environment-based configuration | [`AppConfig`] |
//! | [`errors`] | Wire-compatible error handling | [`ApiError`], [`ApiResult`] |
//! | [`tracing_config`] | Structured logging setup | [`init_tracing`](tracing_config::init_tracing) |
//! | [`validation`] | Request validation helpers | Custom validators |
//!
//! ## Design Decisions
//!
//! 1. **Single source of truth**: configuration and error shapes live here
//!    so the binary crate and its tests agree on one definition.
//! 2. **Observable by default**: structured logging is built in, not bolted
//!    on later.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::{AppConfig, ApiError, ApiResult};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     shared::tracing_config::init_tracing(&config.service_name, config.is_production());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod tracing_config;
pub mod validation;

// Re-exports for convenience - import commonly used types directly from `shared`
pub use config::AppConfig;
pub use errors::{ApiError, ApiResult};
