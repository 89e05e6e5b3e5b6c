// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Trendboard: fashion trend analytics behind a subscription paywall
//!
//! This crate provides the backend API that serves style and color trends,
//! redacting their analytics for viewers without an active subscription,
//! plus the admin surface used to curate them.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::SqliteDb;
use services::{GoogleOAuthClient, GoogleOidcVerifier, ObjectStore, SheetsClient};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SqliteDb,
    pub oidc_verifier: Arc<GoogleOidcVerifier>,
    pub google_oauth: GoogleOAuthClient,
    pub sheets: SheetsClient,
    pub storage: Arc<dyn ObjectStore>,
}
