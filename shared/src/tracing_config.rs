//! # Logging setup
//!
//! Initializes `tracing` once at startup. Every binary in the workspace
//! (the emulator itself, and any standalone tooling built on `shared`)
//! calls [`init_tracing`] before doing anything else so that early
//! startup failures still get a structured log line.
//!
//! ## Output
//!
//! | Environment | Format |
//! |-------------|--------|
//! | Development | Pretty, colorized, multi-line |
//! | Production  | JSON, one line per event |
//!
//! ## Filter
//!
//! Controlled by `RUST_LOG`. Without it, the default pulls this
//! service's own spans down to `debug` while keeping the noisiest
//! dependencies quiet:
//!
//! - `actix_server`/`actix_web`: one line per accepted connection at
//!   `info`, which drowns out request-level logging under load.
//! - `reqwest`/`hyper`: every outbound call made by the HTTP Lambda
//!   trigger invoker (`crate::triggers::HttpHandler`) logs connection
//!   pool churn at `debug`.
//!
//! ```bash
//! RUST_LOG=debug,cognito_local=trace
//! RUST_LOG=info,actix_server=warn
//! ```

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initializes the global tracing subscriber. Call once, before any
/// other startup code that might log.
///
/// Script-invoked Lambda triggers (`crate::triggers::ScriptHandler`)
/// launch child processes via `tokio::process`; their stdout/stderr are
/// captured and logged by the trigger runtime itself rather than
/// inherited, so there is no corresponding noisy target to silence here.
pub fn init_tracing(service_name: &str, is_production: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("debug,actix_server=info,actix_web=info,reqwest=info,hyper=info")
        }
    });

    if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_file(true)
                    .with_line_number(true)
                    .with_thread_ids(true)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    }

    tracing::info!(service = service_name, production = is_production, "tracing initialized");
}

/// Span covering one wire-protocol request, keyed by `X-Amz-Target`
/// rather than a path since every operation shares `POST /`.
#[macro_export]
macro_rules! request_span {
    ($request_id:expr, $target:expr) => {
        tracing::info_span!("request", request_id = %$request_id, target = %$target)
    };
}

/// Logs an unexpected internal failure with its context, for the call
/// sites that need to log and still return `ApiError::InternalError`
/// rather than propagate via `#[error]`.
pub fn log_error<E: std::fmt::Display>(error: &E, context: &str) {
    tracing::error!(error = %error, context = context, "internal error");
}
