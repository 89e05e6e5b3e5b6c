// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trend image uploads and the public-read permission repair batch.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::TrendKind;
use crate::services::storage::ObjectStore;
use futures_util::{stream, StreamExt};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

const MAX_CONCURRENT_STORAGE_OPS: usize = 16;
const UPLOAD_PREFIX: &str = "trends";

/// Outcome of repairing one image.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ImageRepairResult {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub trend_id: Uuid,
    #[cfg_attr(feature = "binding-generation", ts(type = "\"style\" | \"color\""))]
    pub kind: TrendKind,
    pub url: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Summary of a repair run.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ImageRepairReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ImageRepairResult>,
}

/// Make every image of every trend publicly readable again.
///
/// Each image is attempted once; a failure is recorded on its own entry and
/// never stops the rest of the batch. Results come back in completion order.
pub async fn repair_image_permissions(
    db: &SqliteDb,
    store: &dyn ObjectStore,
) -> Result<ImageRepairReport, AppError> {
    let mut work: Vec<(TrendKind, Uuid, String)> = Vec::new();
    for kind in [TrendKind::Style, TrendKind::Color] {
        for (trend_id, images) in db.list_trend_images(kind).await? {
            work.extend(images.into_iter().map(|url| (kind, trend_id, url)));
        }
    }

    tracing::info!(images = work.len(), "Starting image permission repair");

    let results: Vec<ImageRepairResult> = stream::iter(work)
        .map(|(kind, trend_id, url)| async move {
            let outcome = match store.key_for_url(&url) {
                Some(key) => store.make_public(&key).await.map_err(|e| e.to_string()),
                None => Err("URL does not point into the image bucket".to_string()),
            };

            if let Err(error) = &outcome {
                tracing::warn!(
                    trend_id = %trend_id,
                    url = %url,
                    error = %error,
                    "Failed to repair image permissions"
                );
            }

            ImageRepairResult {
                trend_id,
                kind,
                url,
                success: outcome.is_ok(),
                error: outcome.err(),
            }
        })
        .buffer_unordered(MAX_CONCURRENT_STORAGE_OPS)
        .collect()
        .await;

    let succeeded = results.iter().filter(|r| r.success).count();
    let report = ImageRepairReport {
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        results,
    };

    tracing::info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        "Image permission repair finished"
    );

    Ok(report)
}

/// Object key for a newly uploaded image.
pub fn upload_key(file_name: Option<&str>, content_type: &str) -> String {
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .or_else(|| extension_for(content_type).map(String::from));

    match extension {
        Some(ext) => format!("{}/{}.{}", UPLOAD_PREFIX, Uuid::new_v4(), ext),
        None => format!("{}/{}", UPLOAD_PREFIX, Uuid::new_v4()),
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}
