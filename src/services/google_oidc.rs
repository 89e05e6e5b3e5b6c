// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google ID token verification for OAuth sign-in.
//!
//! Signing keys come from Google's published JWKS and are kept for as long
//! as the response's `Cache-Control: max-age` allows.

use crate::config::Config;
use crate::models::GoogleProfile;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_KEY_TTL: Duration = Duration::from_secs(300);
const LEEWAY_SECS: u64 = 60;

/// OIDC verification error categories.
#[derive(Debug, Clone)]
pub enum OidcError {
    /// The token is malformed, badly signed, or its claims are unacceptable.
    Forbidden(String),
    /// Google's key endpoint could not be reached or returned garbage.
    Transient(String),
}

/// Keys valid until `fresh_until`.
struct KeySet {
    keys: HashMap<String, Arc<DecodingKey>>,
    fresh_until: Instant,
}

impl KeySet {
    fn get(&self, kid: &str, now: Instant) -> Option<Arc<DecodingKey>> {
        if self.fresh_until <= now {
            return None;
        }
        self.keys.get(kid).cloned()
    }
}

enum KeySource {
    Google {
        http: reqwest::Client,
        cache: RwLock<Option<KeySet>>,
        refresh: Mutex<()>,
    },
    Fixed {
        kid: String,
        key: Arc<DecodingKey>,
    },
}

/// Verifier for Google-issued ID tokens.
pub struct GoogleOidcVerifier {
    audience: String,
    keys: KeySource,
}

impl GoogleOidcVerifier {
    /// Verifier that fetches Google's signing keys on demand.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        let audience = config.google_client_id.trim().to_string();
        tracing::info!(audience = %audience, "Initialized Google ID token verifier");

        Ok(Self {
            audience,
            keys: KeySource::Google {
                http,
                cache: RwLock::new(None),
                refresh: Mutex::new(()),
            },
        })
    }

    /// Verifier that trusts exactly one key. For tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static OIDC kid must not be empty");
        }

        Ok(Self {
            audience: config.google_client_id.trim().to_string(),
            keys: KeySource::Fixed {
                kid,
                key: Arc::new(decoding_key),
            },
        })
    }

    /// Verify an ID token from Google's token endpoint and return the
    /// signed-in profile.
    pub async fn verify_id_token(&self, token: &str) -> Result<GoogleProfile, OidcError> {
        if token.is_empty() {
            return Err(OidcError::Forbidden("ID token is empty".to_string()));
        }

        let header = decode_header(token)
            .map_err(|e| OidcError::Forbidden(format!("invalid JWT header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Forbidden(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Forbidden("missing JWT kid".to_string()))?;

        let key = self.key_for(&kid).await?;
        let claims = decode::<IdTokenClaims>(token, &key, &self.validation())
            .map_err(|e| OidcError::Forbidden(format!("JWT validation failed: {e}")))?
            .claims;

        validate_iat(claims.iat, now_unix_secs())?;
        claims.into_profile()
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.audience.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = LEEWAY_SECS;
        validation
    }

    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        let (http, cache, refresh) = match &self.keys {
            KeySource::Fixed { kid: fixed, key } if fixed == kid => return Ok(key.clone()),
            KeySource::Fixed { .. } => {
                return Err(OidcError::Forbidden(format!("unknown JWT kid: {kid}")));
            }
            KeySource::Google {
                http,
                cache,
                refresh,
            } => (http, cache, refresh),
        };

        if let Some(key) = cached_key(cache, kid).await {
            return Ok(key);
        }

        // Single flight: whoever waited on the lock may find fresh keys.
        let _guard = refresh.lock().await;
        if let Some(key) = cached_key(cache, kid).await {
            return Ok(key);
        }

        // A miss on a fresh set means Google rotated keys, so refetch anyway.
        let keys = fetch_google_keys(http).await?;
        let key = keys.keys.get(kid).cloned();
        *cache.write().await = Some(keys);

        key.ok_or_else(|| OidcError::Forbidden(format!("JWT kid not in Google JWKS: {kid}")))
    }
}

async fn cached_key(cache: &RwLock<Option<KeySet>>, kid: &str) -> Option<Arc<DecodingKey>> {
    cache
        .read()
        .await
        .as_ref()
        .and_then(|keys| keys.get(kid, Instant::now()))
}

async fn fetch_google_keys(http: &reqwest::Client) -> Result<KeySet, OidcError> {
    let response = http
        .get(GOOGLE_JWKS_URL)
        .send()
        .await
        .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(OidcError::Transient(format!(
            "JWKS request returned status {}",
            response.status()
        )));
    }

    let ttl = max_age(response.headers())
        .map(Duration::from_secs)
        .unwrap_or(FALLBACK_KEY_TTL);

    let jwks: Jwks = response
        .json()
        .await
        .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

    let keys: HashMap<_, _> = jwks.keys.into_iter().filter_map(signing_key).collect();
    if keys.is_empty() {
        return Err(OidcError::Transient(
            "JWKS has no usable RS256 signing keys".to_string(),
        ));
    }

    tracing::debug!(keys = keys.len(), ttl_secs = ttl.as_secs(), "Fetched Google JWKS");

    Ok(KeySet {
        keys,
        fresh_until: Instant::now() + ttl,
    })
}

#[derive(Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

/// RS256 signature key from a JWK, or `None` for anything else.
fn signing_key(jwk: Jwk) -> Option<(String, Arc<DecodingKey>)> {
    let usable = jwk.kty == "RSA"
        && !jwk.kid.trim().is_empty()
        && matches!(jwk.alg.as_deref(), None | Some("RS256"))
        && matches!(jwk.use_.as_deref(), None | Some("sig"));
    if !usable {
        return None;
    }

    match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
        Ok(key) => Some((jwk.kid, Arc::new(key))),
        Err(e) => {
            tracing::warn!(error = %e, kid = %jwk.kid, "Skipping malformed JWKS key");
            None
        }
    }
}

/// The ID token claims we read. `iss`, `aud` and `exp` are checked by
/// [`Validation`] and not needed afterwards.
#[derive(Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

impl IdTokenClaims {
    fn into_profile(self) -> Result<GoogleProfile, OidcError> {
        if self.email_verified != Some(true) {
            return Err(OidcError::Forbidden(
                "email address is not verified".to_string(),
            ));
        }

        let email = self
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| OidcError::Forbidden("missing email claim".to_string()))?;

        Ok(GoogleProfile {
            subject: self.sub,
            email: email.to_lowercase(),
            name: self.name,
            picture: self.picture,
        })
    }
}

fn validate_iat(iat: Option<u64>, now: u64) -> Result<(), OidcError> {
    match iat {
        None => Err(OidcError::Forbidden("missing iat claim".to_string())),
        Some(iat) if iat > now + LEEWAY_SECS => Err(OidcError::Forbidden(
            "iat claim is in the future".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

/// `max-age` from a `Cache-Control` header, in seconds.
fn max_age(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CACHE_CONTROL)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|directive| {
            directive
                .trim()
                .strip_prefix("max-age=")?
                .trim_matches('"')
                .parse()
                .ok()
        })
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
