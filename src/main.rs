//! inboxd - conversation ownership & CRM synchronization engine
//!
//! A Rust backend that routes support conversations between an automated
//! responder and human agents while keeping one CRM contact per external
//! party.

mod api;
mod config;
mod db;
mod provisioning;
mod responder;
mod runtime;
mod state_machine;
mod team;
mod visibility;

use api::{create_router, AppState};
use config::Config;
use db::Database;
use responder::{HttpResponder, ResponderGateway, UnconfiguredResponder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use team::TeamRegistry;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inboxd=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    // Load the roster and pin down the routing targets before accepting
    // any traffic: an assigned owner must always be a known team member
    let team = Arc::new(TeamRegistry::from_file(&config.team_file)?);
    team.validate(&config.escalation_agent)
        .map_err(|e| format!("INBOXD_ESCALATION_AGENT must name a roster member: {e}"))?;
    team.validate(&config.default_owner)
        .map_err(|e| format!("INBOXD_DEFAULT_OWNER must name a roster member: {e}"))?;

    // Repair any contact gaps left by a previous shutdown
    let created = provisioning::reconcile(&db, &config, chrono::Utc::now())?;
    if created > 0 {
        tracing::info!(created, "Startup reconciliation provisioned contacts");
    }

    // Responder gateway
    let gateway: Arc<dyn ResponderGateway> = match &config.responder.url {
        Some(url) => {
            tracing::info!(url = %url, "Responder gateway configured");
            Arc::new(HttpResponder::new(
                url.clone(),
                config.responder.api_key.clone(),
                config.responder.timeout,
            ))
        }
        None => {
            tracing::warn!(
                "No responder endpoint configured. Set INBOXD_RESPONDER_URL; \
                 automated conversations will log recoverable failures until then."
            );
            Arc::new(UnconfiguredResponder)
        }
    };

    // Create application state
    let port = config.port;
    let state = AppState::new(db, gateway, team, config);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state).layer(cors).layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("inboxd listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
