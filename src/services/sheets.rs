// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Sheets import of trend analytics.
//!
//! Expected layout of the imported range:
//!
//! ```text
//! | Trend        | 2025-01-01 | 2025-02-01 | ... |
//! | Barrel jeans | 12         | 18.5       | ... |
//! | Ballet flats | 40         |            | ... |
//! ```
//!
//! The first row holds the dates; every following row is one trend's series.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{TrendAnalytics, TrendKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Google Sheets values API client.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsClient {
    pub fn new(api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: SHEETS_BASE_URL.to_string(),
            api_key,
        }
    }

    /// Fetch a range as rows of cell strings.
    pub async fn fetch_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::BadRequest("Spreadsheet import is not configured".to_string())
        })?;

        let url = format!(
            "{}/{}/values/{}",
            self.base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        );

        let response = self
            .http
            .get(&url)
            .query(&[("key", api_key), ("majorDimension", "ROWS")])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Sheets request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Sheets API returned HTTP {}: {}",
                status, body
            )));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid Sheets response: {}", e)))?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

fn cell_to_string(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One trend's series from the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSeries {
    pub title: String,
    pub values: Vec<f64>,
}

/// A data row that could not be imported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    /// 1-based row number in the imported range
    pub row: usize,
    pub reason: String,
}

/// Parsed contents of an analytics sheet.
#[derive(Debug, Clone, Default)]
pub struct ParsedSheet {
    pub dates: Vec<NaiveDate>,
    pub series: Vec<SheetSeries>,
    pub skipped: Vec<SkippedRow>,
}

/// Parse raw sheet rows into a date axis and per-trend series.
///
/// A bad header rejects the whole sheet. Bad data rows are skipped and
/// reported individually.
pub fn parse_analytics_sheet(rows: &[Vec<String>]) -> Result<ParsedSheet, AppError> {
    let header = rows
        .first()
        .ok_or_else(|| AppError::BadRequest("Sheet is empty".to_string()))?;

    let date_cells: Vec<&str> = header
        .iter()
        .skip(1)
        .map(|c| c.trim())
        .collect::<Vec<_>>();
    // Sheets drops trailing empty cells, but a blank in the middle of the header is an error.
    let date_cells = trim_trailing_blank(&date_cells);

    if date_cells.is_empty() {
        return Err(AppError::BadRequest(
            "Header row must contain at least one date".to_string(),
        ));
    }

    let dates = date_cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            parse_sheet_date(cell).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Header column {} is not a date: '{}'",
                    i + 2,
                    cell
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut parsed = ParsedSheet {
        dates,
        ..Default::default()
    };

    for (index, row) in rows.iter().enumerate().skip(1) {
        let row_number = index + 1;
        let title = row.first().map(|c| c.trim()).unwrap_or_default();

        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        if title.is_empty() {
            parsed.skipped.push(SkippedRow {
                row: row_number,
                reason: "missing trend title".to_string(),
            });
            continue;
        }

        match parse_row_values(&row[1..], parsed.dates.len()) {
            Ok(values) => parsed.series.push(SheetSeries {
                title: title.to_string(),
                values,
            }),
            Err(reason) => parsed.skipped.push(SkippedRow {
                row: row_number,
                reason,
            }),
        }
    }

    Ok(parsed)
}

/// Outcome of applying a sheet to stored trends.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Titles of trends whose analytics were replaced
    pub updated: Vec<String>,
    /// Sheet titles with no matching trend
    pub unmatched: Vec<String>,
    pub skipped: Vec<SkippedRow>,
}

/// Replace the analytics of every trend named in the sheet.
///
/// Titles match case-insensitively. Dates and values are replaced; the
/// stored age breakdown is kept since sheets do not carry one.
pub async fn apply_sheet(
    db: &SqliteDb,
    kind: TrendKind,
    parsed: ParsedSheet,
) -> Result<ImportReport, AppError> {
    let by_title = db.trends_by_title(kind).await?;
    let mut report = ImportReport {
        skipped: parsed.skipped,
        ..Default::default()
    };

    for series in parsed.series {
        let Some(trend) = by_title.get(&series.title.to_lowercase()) else {
            report.unmatched.push(series.title);
            continue;
        };

        let analytics = TrendAnalytics {
            dates: parsed.dates.clone(),
            values: series.values,
            age_segments: trend
                .analytics
                .as_ref()
                .and_then(|a| a.age_segments.clone()),
        };
        db.set_analytics(kind, trend.id, &analytics).await?;
        report.updated.push(trend.title.clone());
    }

    tracing::info!(
        kind = kind.label(),
        updated = report.updated.len(),
        unmatched = report.unmatched.len(),
        skipped = report.skipped.len(),
        "Sheet import applied"
    );

    Ok(report)
}

fn trim_trailing_blank<'a>(cells: &[&'a str]) -> Vec<&'a str> {
    let end = cells
        .iter()
        .rposition(|c| !c.is_empty())
        .map_or(0, |i| i + 1);
    cells[..end].to_vec()
}

/// Values for one row, padded with zeros to `width`.
fn parse_row_values(cells: &[String], width: usize) -> Result<Vec<f64>, String> {
    if cells.len() > width && cells[width..].iter().any(|c| !c.trim().is_empty()) {
        return Err(format!("row has more than {} values", width));
    }

    (0..width)
        .map(|i| {
            let raw = cells.get(i).map(|c| c.trim()).unwrap_or_default();
            parse_sheet_number(raw).ok_or_else(|| format!("'{}' is not a number", raw))
        })
        .collect()
}

/// Parse a numeric cell. Blank cells are zero.
fn parse_sheet_number(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return Some(0.0);
    }
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a header date in one of the formats Sheets commonly renders.
pub fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}
