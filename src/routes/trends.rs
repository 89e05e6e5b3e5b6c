// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public trend reads, redacted per viewer.

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::SqliteDb;
use crate::error::{AppError, Result};
use crate::middleware::auth::MaybeAuthUser;
use crate::models::{Category, Trend, TrendKind};
use crate::services::access::{redact, redact_all, viewer_is_subscribed};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(kind_routes("/trends", TrendKind::Style))
        .merge(kind_routes("/trends/colors", TrendKind::Color))
        .route("/categories", get(list_categories))
}

fn kind_routes(base: &str, kind: TrendKind) -> Router<Arc<AppState>> {
    Router::new()
        .route(base, get(list_trends))
        .route(&format!("{}/{{id}}", base), get(get_trend))
        .layer(Extension(kind))
}

/// Subscription status of the caller, read fresh from the database.
///
/// A token for a user that no longer exists counts as anonymous.
async fn viewer_subscribed(db: &SqliteDb, viewer: &MaybeAuthUser) -> Result<bool> {
    let user = match &viewer.0 {
        Some(auth) => db.get_user(auth.user_id).await?,
        None => None,
    };
    Ok(viewer_is_subscribed(user.as_ref()))
}

/// List trends of one kind, newest first.
async fn list_trends(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<TrendKind>,
    viewer: MaybeAuthUser,
) -> Result<Json<Vec<Trend>>> {
    let active = viewer_subscribed(&state.db, &viewer).await?;
    let trends = state.db.list_trends(kind).await?;

    tracing::debug!(
        kind = kind.label(),
        count = trends.len(),
        subscribed = active,
        "Serving trend list"
    );

    Ok(Json(redact_all(trends, active)))
}

async fn get_trend(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<TrendKind>,
    Path(id): Path<Uuid>,
    viewer: MaybeAuthUser,
) -> Result<Json<Trend>> {
    let active = viewer_subscribed(&state.db, &viewer).await?;
    let trend = state
        .db
        .get_trend(kind, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", kind.label(), id)))?;

    Ok(Json(redact(trend, active)))
}

async fn list_categories(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.db.list_categories().await?))
}
