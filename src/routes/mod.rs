// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod admin;
pub mod api;
pub mod auth;
pub mod trends;

use crate::middleware::auth::{require_admin, require_auth};
use crate::AppState;
use axum::http::{header, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use url::Url;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Whether `origin` is the configured frontend or a local dev server.
///
/// Used both for CORS and for the post-login redirect target, so `origin`
/// may carry a path. Scheme, host and port must match exactly.
pub(crate) fn is_allowed_origin(origin: &str, frontend_url: &str) -> bool {
    let Ok(candidate) = Url::parse(origin) else {
        return false;
    };

    // Userinfo only makes the real host harder to spot.
    if !candidate.username().is_empty() || candidate.password().is_some() {
        return false;
    }

    if Url::parse(frontend_url).is_ok_and(|frontend| frontend.origin() == candidate.origin()) {
        return true;
    }

    candidate.scheme() == "http" && matches!(candidate.host_str(), Some("localhost" | "127.0.0.1"))
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from frontend URL and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                is_allowed_origin(origin.to_str().unwrap_or(""), &frontend_url)
            },
        ))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Public routes (no auth required; trend reads look at the session if present)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes())
        .merge(trends::routes());

    // Protected routes (auth required)
    let protected_routes =
        api::routes().route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Admin routes (auth + admin role). The last layer added runs first.
    let admin_routes = admin::routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins() {
        let frontend = "https://trends.example.com/";
        assert!(is_allowed_origin("https://trends.example.com", frontend));
        assert!(is_allowed_origin("http://localhost:5173", frontend));
        assert!(is_allowed_origin("http://127.0.0.1:3000", frontend));
        assert!(!is_allowed_origin("https://evil.example.com", frontend));
        assert!(!is_allowed_origin("https://trends.example.com.evil.io", frontend));
        assert!(!is_allowed_origin("http://trends.example.com", frontend));
        assert!(!is_allowed_origin("https://trends.example.com:8443", frontend));
    }

    #[test]
    fn test_lookalike_local_hosts_rejected() {
        let frontend = "https://trends.example.com";
        assert!(!is_allowed_origin("http://localhost.evil.com", frontend));
        assert!(!is_allowed_origin("http://localhost.evil.com/phish", frontend));
        assert!(!is_allowed_origin("http://localhost@evil.com", frontend));
        assert!(!is_allowed_origin("http://127.0.0.1.nip.io", frontend));
        assert!(!is_allowed_origin("http://user@localhost:5173", frontend));
        assert!(!is_allowed_origin("https://trends.example.com@evil.com", frontend));
        assert!(!is_allowed_origin("localhost:5173", frontend));
        assert!(!is_allowed_origin("", frontend));
    }

    #[test]
    fn test_redirect_paths_on_allowed_origins() {
        let frontend = "https://trends.example.com";
        assert!(is_allowed_origin("https://trends.example.com/dashboard", frontend));
        assert!(is_allowed_origin("http://localhost:5173/admin", frontend));
    }
}
