//! # cognito-local
//!
//! A local, self-hosted emulator of AWS Cognito User Pools: the same
//! JSON-over-HTTP wire protocol, backed by on-disk JSON documents instead
//! of a managed service, for integration tests and offline development.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP Layer (api/)                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐ │
//! │  │   routes    │  │  handlers   │  │    DTOs (Request/Res)   │ │
//! │  └──────┬──────┘  └──────┬──────┘  └────────────┬────────────┘ │
//! └─────────┼────────────────┼─────────────────────┼───────────────┘
//!           │                │                      │
//!           ▼                ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │           Auth state machine (auth/) + administration (admin)   │
//! │  InitiateAuth/RespondToAuthChallenge, SignUp/ForgotPassword/…,  │
//! │  group and admin-user management                                │
//! └─────────────────────────┬───────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            Facade (facade.rs) + per-pool stores (pool_store/)   │
//! │  One mutex-guarded JSON document per user pool                  │
//! └─────────────────────────┬───────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   tokens/ (RS256 signing + JWKS)   triggers/ (lifecycle hooks)  │
//! │   messages.rs (delivery)           otp.rs (codes)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Protocol
//!
//! A single `POST /` endpoint dispatches by the `X-Amz-Target` header;
//! see [`api::routes`] for the full operation table. JWKS and OIDC
//! discovery are served as plain `GET` under `/{UserPoolId}/.well-known/`.
//!
//! ## Configuration
//!
//! Environment variables are loaded via [`shared::config::AppConfig`].
//! Key settings for this service:
//!
//! - `SERVICE_NAME=cognito-local`
//! - `BIND_ADDR`, `DATA_DIR`, `TRIGGERS_FILE`, `ISSUER_BASE_URL`
//! - `REGION` — region prefix minted into generated pool ids (default `us-east-1`)
//! - `BOOTSTRAP_POOL_NAME` / `BOOTSTRAP_CLIENT_NAME` — optional pre-created
//!   pool and client, per the CLI surface

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shared::{config::AppConfig, tracing_config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

mod admin;
mod api;
mod auth;
mod bootstrap;
mod clock;
mod domain;
mod facade;
mod messages;
mod otp;
mod pool_store;
mod tokens;
mod triggers;

use api::routes;
use clock::{Clock, IdSource, RandomIdSource, SystemClock};
use facade::CognitoFacade;
use messages::MessagesService;
use otp::{OtpService, RandomOtpService};
use tokens::keystore::KeyStore;

/// Shared application state injected into all request handlers.
pub struct AppState {
    pub facade: CognitoFacade,
    pub keystore: KeyStore,
    pub issuer_base_url: String,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdSource>,
    pub otp: Arc<dyn OtpService>,
    pub messages: MessagesService,
    pub challenges: auth::ChallengeStore,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // ─────────────────────────────────────────────────────────────────────
    // Step 1: Load configuration from environment
    // ─────────────────────────────────────────────────────────────────────
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // ─────────────────────────────────────────────────────────────────────
    // Step 2: Initialize structured logging
    // ─────────────────────────────────────────────────────────────────────
    tracing_config::init_tracing(&config.service_name, config.is_production());

    info!(
        service = %config.service_name,
        host = %config.server.host,
        port = %config.server.port,
        "Starting cognito-local"
    );

    // ─────────────────────────────────────────────────────────────────────
    // Step 3: Load or create the signing key and persisted pool state
    // ─────────────────────────────────────────────────────────────────────
    let data_dir = PathBuf::from(&config.persistence.data_dir);
    let keystore = KeyStore::load_or_generate(&data_dir.join("signing-key.pem"))
        .expect("Failed to load or generate signing key");

    let region = std::env::var("REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let facade = CognitoFacade::load(data_dir.clone(), region)
        .await
        .expect("Failed to load persisted user pools");

    // ─────────────────────────────────────────────────────────────────────
    // Step 4: Apply trigger configuration and create the optional
    // pre-provisioned pool/client named in the CLI surface
    // ─────────────────────────────────────────────────────────────────────
    let trigger_config = bootstrap::load_trigger_config(&config.triggers.triggers_file);
    bootstrap::create_bootstrap_pool(&facade, &trigger_config)
        .await
        .expect("Failed to create bootstrap pool");

    // ─────────────────────────────────────────────────────────────────────
    // Step 5: Instantiate services with dependencies
    // ─────────────────────────────────────────────────────────────────────
    let messages = MessagesService::new(data_dir.join("delivery-log.jsonl"));
    let app_state = web::Data::new(AppState {
        facade,
        keystore,
        issuer_base_url: config.issuer_base_url.clone(),
        clock: Arc::new(SystemClock),
        ids: Arc::new(RandomIdSource),
        otp: Arc::new(RandomOtpService),
        messages,
        challenges: auth::ChallengeStore::new(),
    });

    // ─────────────────────────────────────────────────────────────────────
    // Step 6: Configure and start HTTP server
    // ─────────────────────────────────────────────────────────────────────
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    info!("Server listening on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind((server_host, server_port))?
    .run()
    .await
}
