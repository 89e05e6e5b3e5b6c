// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trendboard API Server
//!
//! Serves fashion trend analytics, gated by subscription status, and the
//! admin endpoints used to curate trends.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trendboard::{
    config::Config,
    db::SqliteDb,
    services::{
        GoogleOAuthClient, GoogleOidcVerifier, ObjectStore, S3Store, SheetsClient,
        UnconfiguredStore,
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Trendboard API");

    // Open the database and apply migrations
    let db = SqliteDb::connect(&config.database_url).await?;

    let storage: Arc<dyn ObjectStore> = match &config.storage {
        Some(storage_config) => Arc::new(S3Store::new(storage_config)),
        None => {
            tracing::warn!("S3_BUCKET not set, image uploads are disabled");
            Arc::new(UnconfiguredStore)
        }
    };

    if config.sheets_api_key.is_none() {
        tracing::warn!("SHEETS_API_KEY not set, spreadsheet import is disabled");
    }

    let oidc_verifier = Arc::new(GoogleOidcVerifier::new(&config)?);
    let google_oauth = GoogleOAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );
    let sheets = SheetsClient::new(config.sheets_api_key.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        oidc_verifier,
        google_oauth,
        sheets,
        storage,
    });

    // Build router
    let app = trendboard::routes::create_router(state.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trendboard=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
