// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and held in memory. A `.env` file in the
//! working directory is honored for local development.

use std::env;

/// S3-compatible object storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket holding trend images
    pub bucket: String,
    /// Region name (e.g. "us-east-1")
    pub region: String,
    /// Custom endpoint for S3-compatible providers
    pub endpoint: Option<String>,
    /// Base URL under which objects are publicly served
    pub public_base_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// SQLite connection URL
    pub database_url: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Public URL of this API (used for the OAuth callback)
    pub api_url: String,
    /// Server port
    pub port: u16,
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Emails promoted to admin on sign-in
    pub admin_emails: Vec<String>,
    /// Object storage, disabled when unset
    pub storage: Option<StorageConfig>,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// API key for the Google Sheets values API
    pub sheets_api_key: Option<String>,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            port: 8080,
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            admin_emails: vec!["admin@example.com".to_string()],
            storage: Some(StorageConfig {
                bucket: "test-bucket".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                public_base_url: "https://test-bucket.s3.us-east-1.amazonaws.com".to_string(),
                access_key_id: "test-access-key".to_string(),
                secret_access_key: "test-secret-key".to_string(),
            }),
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!!".to_vec(),
            sheets_api_key: Some("test-sheets-key".to_string()),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://trendboard.db".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            admin_emails: env::var("ADMIN_EMAILS")
                .map(|v| parse_email_list(&v))
                .unwrap_or_default(),
            storage: storage_from_env()?,

            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            sheets_api_key: env::var("SHEETS_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    /// Whether the given email is on the admin bootstrap list.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

/// Storage is enabled only when `S3_BUCKET` is set.
fn storage_from_env() -> Result<Option<StorageConfig>, ConfigError> {
    let Ok(bucket) = env::var("S3_BUCKET") else {
        return Ok(None);
    };

    let region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let endpoint = env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty());
    let public_base_url = env::var("S3_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| format!("https://{}.s3.{}.amazonaws.com", bucket, region));

    Ok(Some(StorageConfig {
        bucket,
        region,
        endpoint,
        public_base_url: public_base_url.trim_end_matches('/').to_string(),
        access_key_id: env::var("S3_ACCESS_KEY_ID")
            .map_err(|_| ConfigError::Missing("S3_ACCESS_KEY_ID"))?,
        secret_access_key: env::var("S3_SECRET_ACCESS_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("S3_SECRET_ACCESS_KEY"))?,
    }))
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
