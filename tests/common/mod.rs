// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use trendboard::config::Config;
use trendboard::db::SqliteDb;
use trendboard::middleware::auth::create_jwt;
use trendboard::models::{GoogleProfile, NewTrend, TrendAnalytics, TrendKind, User};
use trendboard::routes::create_router;
use trendboard::services::{GoogleOAuthClient, GoogleOidcVerifier, MemoryStore, SheetsClient};
use trendboard::AppState;

/// Test app with handles to the pieces tests poke at directly.
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

/// Create a test app over a fresh in-memory database.
pub async fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default()).await
}

pub async fn create_test_app_with_config(config: Config) -> TestApp {
    let db = SqliteDb::new_in_memory()
        .await
        .expect("Failed to open in-memory database");

    let public_base_url = config
        .storage
        .as_ref()
        .map(|s| s.public_base_url.clone())
        .unwrap_or_default();
    let store = Arc::new(MemoryStore::new(&public_base_url));

    let oidc_verifier =
        Arc::new(GoogleOidcVerifier::new(&config).expect("Failed to build OIDC verifier"));
    let google_oauth = GoogleOAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );
    let sheets = SheetsClient::new(config.sheets_api_key.clone());

    let state = Arc::new(AppState {
        config,
        db,
        oidc_verifier,
        google_oauth,
        sheets,
        storage: store.clone(),
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

/// Insert a user the way OAuth sign-in would.
pub async fn create_user(state: &AppState, email: &str, admin: bool) -> User {
    let profile = GoogleProfile {
        subject: format!("sub-{}", email),
        email: email.to_string(),
        name: Some("Test User".to_string()),
        picture: None,
    };
    state
        .db
        .upsert_google_user(&profile, admin)
        .await
        .expect("Failed to create user")
}

/// Insert a user with the given subscription expiry.
pub async fn create_subscriber(
    state: &AppState,
    email: &str,
    expires_at: Option<DateTime<Utc>>,
) -> User {
    let user = create_user(state, email, false).await;
    state
        .db
        .set_subscription_expiry(user.id, expires_at)
        .await
        .expect("Failed to set subscription")
        .expect("User vanished")
}

/// Session token for a user.
pub fn token_for(state: &AppState, user: &User) -> String {
    create_jwt(user.id, &state.config.jwt_signing_key).expect("Failed to create JWT")
}

pub fn new_trend(title: &str) -> NewTrend {
    NewTrend {
        title: title.to_string(),
        description: format!("{} description", title),
        trend_type: "silhouette".to_string(),
        images: vec![format!(
            "https://test-bucket.s3.us-east-1.amazonaws.com/trends/{}.jpg",
            title.to_lowercase().replace(' ', "-")
        )],
        main_image_index: 0,
        category_id: None,
    }
}

/// Insert a trend with analytics.
pub async fn seed_trend(
    state: &AppState,
    kind: TrendKind,
    title: &str,
    analytics: Option<TrendAnalytics>,
) -> uuid::Uuid {
    let trend = state
        .db
        .create_trend(kind, &new_trend(title))
        .await
        .expect("Failed to create trend");
    if let Some(analytics) = analytics {
        state
            .db
            .set_analytics(kind, trend.id, &analytics)
            .await
            .expect("Failed to set analytics");
    }
    trend.id
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
