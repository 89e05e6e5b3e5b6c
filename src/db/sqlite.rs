// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles, roles, subscription expiry)
//! - Categories
//! - Trends and color trends (shared shape, separate tables)
//! - Analytics series (one row per trend)

use crate::db::tables;
use crate::error::AppError;
use crate::models::{
    Category, GoogleProfile, NewTrend, Role, Trend, TrendAnalytics, TrendKind, User,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const MAX_CONNECTIONS: u32 = 8;

/// SQLite database client.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

/// Flat row of a trend joined with its optional analytics.
#[derive(sqlx::FromRow)]
struct TrendRow {
    id: Uuid,
    title: String,
    description: String,
    trend_type: String,
    images: Json<Vec<String>>,
    main_image_index: i64,
    category_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    analytics_dates: Option<Json<Vec<NaiveDate>>>,
    analytics_values: Option<Json<Vec<f64>>>,
    analytics_age_segments: Option<Json<serde_json::Value>>,
}

impl From<TrendRow> for Trend {
    fn from(row: TrendRow) -> Self {
        let analytics = match (row.analytics_dates, row.analytics_values) {
            (Some(dates), Some(values)) => Some(TrendAnalytics {
                dates: dates.0,
                values: values.0,
                age_segments: row.analytics_age_segments.map(|s| s.0),
            }),
            _ => None,
        };

        Trend {
            id: row.id,
            title: row.title,
            description: row.description,
            trend_type: row.trend_type,
            images: row.images.0,
            main_image_index: u32::try_from(row.main_image_index).unwrap_or_default(),
            category_id: row.category_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            analytics,
            is_restricted: false,
        }
    }
}

fn trend_select(kind: TrendKind) -> String {
    format!(
        "SELECT t.id, t.title, t.description, t.trend_type, t.images, t.main_image_index, \
                t.category_id, t.created_at, t.updated_at, \
                a.dates AS analytics_dates, a.vals AS analytics_values, \
                a.age_segments AS analytics_age_segments \
         FROM {} t LEFT JOIN {} a ON a.trend_id = t.id",
        kind.table(),
        kind.analytics_table()
    )
}

/// Map constraint violations to client errors; everything else is a database error.
fn constraint_error(err: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::BadRequest(format!("{} already exists", what));
        }
        if db_err.is_foreign_key_violation() {
            return AppError::BadRequest(format!("{} references a missing record", what));
        }
    }
    AppError::from(err)
}

impl SqliteDb {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        tracing::info!(url = url, "Connected to SQLite");

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database for tests and local experiments.
    ///
    /// Every pooled connection to `sqlite::memory:` is a separate database, so
    /// the pool is pinned to one connection that never expires.
    pub async fn new_in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Close the pool. Later queries fail with a database error.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }

    async fn migrate(&self) -> Result<(), AppError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;
        tracing::debug!("Database migrations applied");
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", tables::USERS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT * FROM {} WHERE email = $1", tables::USERS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Create or refresh a user after OAuth sign-in.
    ///
    /// Keyed by email. An existing admin is never demoted here; `promote`
    /// upgrades the user to admin.
    pub async fn upsert_google_user(
        &self,
        profile: &GoogleProfile,
        promote: bool,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let role = if promote { Role::Admin } else { Role::User };
        let sql = format!(
            "INSERT INTO {table} (id, email, name, image, google_sub, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT(email) DO UPDATE SET \
                name = excluded.name, \
                image = excluded.image, \
                google_sub = excluded.google_sub, \
                role = CASE WHEN excluded.role = 'admin' THEN 'admin' ELSE {table}.role END, \
                updated_at = excluded.updated_at \
             RETURNING *",
            table = tables::USERS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(profile.email.to_lowercase())
            .bind(&profile.name)
            .bind(&profile.picture)
            .bind(&profile.subject)
            .bind(role)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "User"))
    }

    /// Set or clear a user's subscription expiry.
    pub async fn set_subscription_expiry(
        &self,
        user_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE {} SET subscription_expires_at = $2, updated_at = $3 WHERE id = $1 RETURNING *",
            tables::USERS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(expires_at)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Change a user's role.
    pub async fn set_role(&self, user_id: Uuid, role: Role) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE {} SET role = $2, updated_at = $3 WHERE id = $1 RETURNING *",
            tables::USERS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(role)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?)
    }

    // ─── Category Operations ─────────────────────────────────────

    /// All categories, sorted by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let sql = format!("SELECT * FROM {} ORDER BY name ASC", tables::CATEGORIES);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>, AppError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", tables::CATEGORIES);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, AppError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO {} (id, name, created_at, updated_at) VALUES ($1, $2, $3, $3) RETURNING *",
            tables::CATEGORIES
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(Uuid::new_v4())
            .bind(name.trim())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "Category"))
    }

    pub async fn rename_category(
        &self,
        category_id: Uuid,
        name: &str,
    ) -> Result<Option<Category>, AppError> {
        let sql = format!(
            "UPDATE {} SET name = $2, updated_at = $3 WHERE id = $1 RETURNING *",
            tables::CATEGORIES
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(category_id)
            .bind(name.trim())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "Category"))
    }

    /// Delete a category. Trends referencing it are detached.
    ///
    /// Returns `false` if no such category existed.
    pub async fn delete_category(&self, category_id: Uuid) -> Result<bool, AppError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", tables::CATEGORIES);
        let result = sqlx::query(&sql)
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Trend Operations ────────────────────────────────────────

    /// All trends of a kind, newest first, with analytics attached.
    pub async fn list_trends(&self, kind: TrendKind) -> Result<Vec<Trend>, AppError> {
        let sql = format!(
            "{} ORDER BY t.created_at DESC, t.rowid DESC",
            trend_select(kind)
        );
        let rows = sqlx::query_as::<_, TrendRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Trend::from).collect())
    }

    pub async fn get_trend(&self, kind: TrendKind, trend_id: Uuid) -> Result<Option<Trend>, AppError> {
        let sql = format!("{} WHERE t.id = $1", trend_select(kind));
        let row = sqlx::query_as::<_, TrendRow>(&sql)
            .bind(trend_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Trend::from))
    }

    /// Insert a new trend without analytics.
    pub async fn create_trend(&self, kind: TrendKind, new: &NewTrend) -> Result<Trend, AppError> {
        let now = Utc::now();
        let trend = Trend {
            id: Uuid::new_v4(),
            title: new.title.trim().to_string(),
            description: new.description.clone(),
            trend_type: new.trend_type.clone(),
            images: new.images.clone(),
            main_image_index: new.main_image_index,
            category_id: new.category_id,
            created_at: now,
            updated_at: now,
            analytics: None,
            is_restricted: false,
        };

        let sql = format!(
            "INSERT INTO {} (id, title, description, trend_type, images, main_image_index, \
                             category_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            kind.table()
        );
        sqlx::query(&sql)
            .bind(trend.id)
            .bind(&trend.title)
            .bind(&trend.description)
            .bind(&trend.trend_type)
            .bind(Json(&trend.images))
            .bind(i64::from(trend.main_image_index))
            .bind(trend.category_id)
            .bind(trend.created_at)
            .bind(trend.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, kind.label()))?;

        Ok(trend)
    }

    /// Persist the editable fields of an existing trend and bump `updated_at`.
    ///
    /// Returns `false` if the trend no longer exists.
    pub async fn save_trend(&self, kind: TrendKind, trend: &mut Trend) -> Result<bool, AppError> {
        trend.updated_at = Utc::now();
        let sql = format!(
            "UPDATE {} SET title = $2, description = $3, trend_type = $4, images = $5, \
                           main_image_index = $6, category_id = $7, updated_at = $8 \
             WHERE id = $1",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(trend.id)
            .bind(&trend.title)
            .bind(&trend.description)
            .bind(&trend.trend_type)
            .bind(Json(&trend.images))
            .bind(i64::from(trend.main_image_index))
            .bind(trend.category_id)
            .bind(trend.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, kind.label()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a trend and its analytics.
    pub async fn delete_trend(&self, kind: TrendKind, trend_id: Uuid) -> Result<bool, AppError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let result = sqlx::query(&sql)
            .bind(trend_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the analytics record of a trend.
    pub async fn set_analytics(
        &self,
        kind: TrendKind,
        trend_id: Uuid,
        analytics: &TrendAnalytics,
    ) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO {} (trend_id, dates, vals, age_segments) VALUES ($1, $2, $3, $4) \
             ON CONFLICT(trend_id) DO UPDATE SET \
                dates = excluded.dates, vals = excluded.vals, age_segments = excluded.age_segments",
            kind.analytics_table()
        );
        sqlx::query(&sql)
            .bind(trend_id)
            .bind(Json(&analytics.dates))
            .bind(Json(&analytics.values))
            .bind(analytics.age_segments.as_ref().map(Json))
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "Analytics"))?;

        self.touch_trend(kind, trend_id).await
    }

    async fn touch_trend(&self, kind: TrendKind, trend_id: Uuid) -> Result<(), AppError> {
        let sql = format!("UPDATE {} SET updated_at = $2 WHERE id = $1", kind.table());
        sqlx::query(&sql)
            .bind(trend_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Map of lowercased title to trend, for matching imported rows.
    ///
    /// When titles collide the newest trend wins.
    pub async fn trends_by_title(&self, kind: TrendKind) -> Result<HashMap<String, Trend>, AppError> {
        let trends = self.list_trends(kind).await?;
        let mut by_title = HashMap::with_capacity(trends.len());
        // Oldest first so newer entries overwrite.
        for trend in trends.into_iter().rev() {
            by_title.insert(trend.title.trim().to_lowercase(), trend);
        }
        Ok(by_title)
    }

    /// Image URLs of every trend of a kind.
    pub async fn list_trend_images(
        &self,
        kind: TrendKind,
    ) -> Result<Vec<(Uuid, Vec<String>)>, AppError> {
        let sql = format!("SELECT id, images FROM {} ORDER BY created_at DESC", kind.table());
        let rows: Vec<(Uuid, Json<Vec<String>>)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, images)| (id, images.0)).collect())
    }
}
