// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: trend curation, categories, subscriptions and images.
//!
//! Auth and the admin role check are applied in routes/mod.rs.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use crate::db::SqliteDb;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    Category, CategoryInput, NewTrend, Role, Trend, TrendAnalytics, TrendKind, TrendUpdate, User,
};
use crate::services::images::{self, ImageRepairReport};
use crate::services::sheets::{self, ImportReport};
use crate::time_utils::parse_utc_timestamp;
use crate::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(kind_routes("/admin/trends", TrendKind::Style))
        .merge(kind_routes("/admin/colors", TrendKind::Color))
        .route(
            "/admin/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/admin/categories/{id}",
            put(rename_category).delete(delete_category),
        )
        .route("/admin/users", get(find_user))
        .route("/admin/users/{id}/subscription", put(set_subscription))
        .route("/admin/users/{id}/role", put(set_role))
        .route("/admin/import/sheet", post(import_sheet))
        .route(
            "/admin/images",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/admin/images/repair-permissions", post(repair_permissions))
}

fn kind_routes(base: &str, kind: TrendKind) -> Router<Arc<AppState>> {
    Router::new()
        .route(base, get(list_trends).post(create_trend))
        .route(
            &format!("{}/{{id}}", base),
            get(get_trend).put(update_trend).delete(delete_trend),
        )
        .route(&format!("{}/{{id}}/analytics", base), put(set_analytics))
        .layer(Extension(kind))
}

// ─── Trends ──────────────────────────────────────────────────

/// A category reference must point at an existing category.
async fn ensure_category(db: &SqliteDb, category_id: Option<Uuid>) -> Result<()> {
    if let Some(id) = category_id {
        if db.get_category(id).await?.is_none() {
            return Err(AppError::BadRequest(format!("Category {} does not exist", id)));
        }
    }
    Ok(())
}

fn not_found(kind: TrendKind, id: Uuid) -> AppError {
    AppError::NotFound(format!("{} {}", kind.label(), id))
}

/// All trends of a kind, unredacted.
async fn list_trends(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<TrendKind>,
) -> Result<Json<Vec<Trend>>> {
    Ok(Json(state.db.list_trends(kind).await?))
}

async fn create_trend(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<TrendKind>,
    Json(body): Json<NewTrend>,
) -> Result<(StatusCode, Json<Trend>)> {
    body.validate()?;
    if body.title.trim().is_empty() {
        return Err(AppError::BadRequest("title must not be blank".to_string()));
    }
    body.check_main_image().map_err(AppError::BadRequest)?;
    ensure_category(&state.db, body.category_id).await?;

    let trend = state.db.create_trend(kind, &body).await?;
    tracing::info!(kind = kind.label(), trend_id = %trend.id, "Trend created");

    Ok((StatusCode::CREATED, Json(trend)))
}

async fn get_trend(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<TrendKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trend>> {
    let trend = state
        .db
        .get_trend(kind, id)
        .await?
        .ok_or_else(|| not_found(kind, id))?;
    Ok(Json(trend))
}

/// Partial update of a trend's editable fields.
async fn update_trend(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<TrendKind>,
    Path(id): Path<Uuid>,
    Json(body): Json<TrendUpdate>,
) -> Result<Json<Trend>> {
    body.validate()?;
    if body.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::BadRequest("title must not be blank".to_string()));
    }
    if let Some(category_id) = body.category_id {
        ensure_category(&state.db, category_id).await?;
    }

    let mut trend = state
        .db
        .get_trend(kind, id)
        .await?
        .ok_or_else(|| not_found(kind, id))?;

    body.apply(&mut trend).map_err(AppError::BadRequest)?;
    trend.title = trend.title.trim().to_string();

    // Deleted between the read and the write
    if !state.db.save_trend(kind, &mut trend).await? {
        return Err(not_found(kind, id));
    }

    Ok(Json(trend))
}

async fn delete_trend(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<TrendKind>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if !state.db.delete_trend(kind, id).await? {
        return Err(not_found(kind, id));
    }
    tracing::info!(kind = kind.label(), trend_id = %id, "Trend deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replace a trend's analytics record.
async fn set_analytics(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<TrendKind>,
    Path(id): Path<Uuid>,
    Json(body): Json<TrendAnalytics>,
) -> Result<Json<Trend>> {
    body.check_aligned().map_err(AppError::BadRequest)?;

    if state.db.get_trend(kind, id).await?.is_none() {
        return Err(not_found(kind, id));
    }
    state.db.set_analytics(kind, id, &body).await?;

    let trend = state
        .db
        .get_trend(kind, id)
        .await?
        .ok_or_else(|| not_found(kind, id))?;
    Ok(Json(trend))
}

// ─── Categories ──────────────────────────────────────────────

fn category_name(input: &CategoryInput) -> Result<String> {
    input.validate()?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be blank".to_string()));
    }
    Ok(name.to_string())
}

async fn list_categories(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.db.list_categories().await?))
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let name = category_name(&body)?;
    let category = state.db.create_category(&name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn rename_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CategoryInput>,
) -> Result<Json<Category>> {
    let name = category_name(&body)?;
    let category = state
        .db
        .rename_category(id, &name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category {}", id)))?;
    Ok(Json(category))
}

/// Delete a category. Trends that used it keep existing without one.
async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if !state.db.delete_category(id).await? {
        return Err(AppError::NotFound(format!("Category {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ─── Users ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct FindUserParams {
    email: String,
}

async fn find_user(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FindUserParams>,
) -> Result<Json<User>> {
    let user = state
        .db
        .get_user_by_email(&params.email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", params.email)))?;
    Ok(Json(user))
}

/// New subscription expiry. `null` cancels the subscription.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    expires_at: Option<String>,
}

async fn set_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<SubscriptionUpdate>,
) -> Result<Json<User>> {
    let expires_at = match body.expires_at.as_deref() {
        Some(raw) => Some(parse_utc_timestamp(raw).ok_or_else(|| {
            AppError::BadRequest(format!("expiresAt is not a date or timestamp: '{}'", raw))
        })?),
        None => None,
    };

    let user = state
        .db
        .set_subscription_expiry(id, expires_at)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

    tracing::info!(
        user_id = %user.id,
        expires_at = ?user.subscription_expires_at,
        "Subscription updated"
    );
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct RoleUpdate {
    role: Role,
}

async fn set_role(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleUpdate>,
) -> Result<Json<User>> {
    if id == admin.user_id && body.role != Role::Admin {
        return Err(AppError::BadRequest(
            "Admins cannot remove their own admin role".to_string(),
        ));
    }

    let user = state
        .db
        .set_role(id, body.role)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

    tracing::info!(user_id = %user.id, role = ?user.role, "Role updated");
    Ok(Json(user))
}

// ─── Import ──────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportSheetRequest {
    #[validate(length(min = 1, max = 200))]
    spreadsheet_id: String,
    #[validate(length(min = 1, max = 200))]
    range: String,
    kind: TrendKind,
}

/// Replace analytics from a Google Sheet.
async fn import_sheet(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ImportSheetRequest>,
) -> Result<Json<ImportReport>> {
    body.validate()?;

    let rows = state
        .sheets
        .fetch_values(&body.spreadsheet_id, &body.range)
        .await?;
    let parsed = sheets::parse_analytics_sheet(&rows)?;
    let report = sheets::apply_sheet(&state.db, body.kind, parsed).await?;

    Ok(Json(report))
}

// ─── Images ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
}

/// Upload one image from the multipart field `file`.
async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .filter(|ct| ct.starts_with("image/"))
            .ok_or_else(|| AppError::BadRequest("Only image uploads are accepted".to_string()))?;
        let file_name = field.file_name().map(str::to_string);
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        if body.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }

        let key = images::upload_key(file_name.as_deref(), &content_type);
        let url = state
            .storage
            .put_public(&key, &content_type, body.to_vec())
            .await?;

        tracing::info!(key = %key, bytes = body.len(), "Image uploaded");
        return Ok((StatusCode::CREATED, Json(UploadResponse { url, key })));
    }

    Err(AppError::BadRequest("Missing multipart field 'file'".to_string()))
}

/// Re-apply public-read permissions to every trend image.
async fn repair_permissions(State(state): State<Arc<AppState>>) -> Result<Json<ImageRepairReport>> {
    let report = images::repair_image_permissions(&state.db, state.storage.as_ref()).await?;
    Ok(Json(report))
}
