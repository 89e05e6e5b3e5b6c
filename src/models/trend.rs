// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Trend and color-trend records with their analytics series.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

/// Which family of trend a record belongs to.
///
/// Style trends and color trends share one shape but live in separate
/// tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendKind {
    Style,
    Color,
}

impl TrendKind {
    pub fn table(self) -> &'static str {
        match self {
            TrendKind::Style => "trends",
            TrendKind::Color => "color_trends",
        }
    }

    pub fn analytics_table(self) -> &'static str {
        match self {
            TrendKind::Style => "trend_analytics",
            TrendKind::Color => "color_trend_analytics",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendKind::Style => "Trend",
            TrendKind::Color => "Color trend",
        }
    }
}

/// Time series attached to a trend.
///
/// `values[i]` is the reading for `dates[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalytics {
    #[cfg_attr(feature = "binding-generation", ts(type = "string[]"))]
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    /// Demographic breakdown, opaque to the backend
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub age_segments: Option<serde_json::Value>,
}

impl TrendAnalytics {
    /// Dates and values must pair up one-to-one.
    pub fn check_aligned(&self) -> Result<(), String> {
        if self.dates.len() != self.values.len() {
            return Err(format!(
                "analytics has {} dates but {} values",
                self.dates.len(),
                self.values.len()
            ));
        }
        Ok(())
    }
}

/// A tracked fashion trend (style or color).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub trend_type: String,
    pub images: Vec<String>,
    pub main_image_index: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub category_id: Option<Uuid>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: DateTime<Utc>,
    pub analytics: Option<TrendAnalytics>,
    /// Set per response from the viewer's subscription; never stored.
    #[serde(default)]
    pub is_restricted: bool,
}

/// Request body for creating a trend.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewTrend {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[serde(rename = "type", default)]
    #[validate(length(max = 100))]
    pub trend_type: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub images: Vec<String>,
    #[serde(default)]
    pub main_image_index: u32,
    pub category_id: Option<Uuid>,
}

impl NewTrend {
    pub fn check_main_image(&self) -> Result<(), String> {
        check_main_image(&self.images, self.main_image_index)
    }
}

/// Partial update for a trend. Absent fields keep their stored value.
///
/// `categoryId: null` detaches the category; omitting it leaves it alone.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrendUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[validate(length(max = 100))]
    pub trend_type: Option<String>,
    #[validate(length(max = 50))]
    pub images: Option<Vec<String>>,
    pub main_image_index: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub category_id: Option<Option<Uuid>>,
}

impl TrendUpdate {
    /// Apply this update on top of an existing record.
    pub fn apply(self, trend: &mut Trend) -> Result<(), String> {
        if let Some(title) = self.title {
            trend.title = title;
        }
        if let Some(description) = self.description {
            trend.description = description;
        }
        if let Some(trend_type) = self.trend_type {
            trend.trend_type = trend_type;
        }
        if let Some(images) = self.images {
            trend.images = images;
            // A replaced image list resets the main image unless one is given.
            if self.main_image_index.is_none() {
                trend.main_image_index = 0;
            }
        }
        if let Some(index) = self.main_image_index {
            trend.main_image_index = index;
        }
        if let Some(category_id) = self.category_id {
            trend.category_id = category_id;
        }
        check_main_image(&trend.images, trend.main_image_index)
    }
}

fn check_main_image(images: &[String], index: u32) -> Result<(), String> {
    if images.is_empty() {
        if index != 0 {
            return Err("mainImageIndex must be 0 when there are no images".to_string());
        }
        return Ok(());
    }
    if index as usize >= images.len() {
        return Err(format!(
            "mainImageIndex {} out of range for {} images",
            index,
            images.len()
        ));
    }
    Ok(())
}

/// Distinguish an explicit `null` from an absent field.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
