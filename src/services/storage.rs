// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Object storage for trend images.

use crate::config::StorageConfig;
use crate::error::AppError;
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Minimal object store interface used by the image routes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object as publicly readable and return its public URL.
    async fn put_public(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, AppError>;

    /// Make an existing object publicly readable.
    async fn make_public(&self, key: &str) -> Result<(), AppError>;

    /// Map a public URL back to its object key, if it belongs to this store.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

/// Object key for a public URL under `base_url`.
///
/// Falls back to the URL path when the URL is on another host, which covers
/// buckets served through both virtual-host and CDN URLs.
pub fn key_from_public_url(base_url: &str, raw_url: &str) -> Option<String> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = raw_url
        .strip_prefix(base)
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    {
        let key = rest.trim_start_matches('/');
        let key = key.split(['?', '#']).next().unwrap_or_default();
        if key.is_empty() {
            return None;
        }
        return urlencoding::decode(key).map(|k| k.into_owned()).ok();
    }

    let parsed = url::Url::parse(raw_url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let key = parsed.path().trim_start_matches('/');
    if key.is_empty() {
        return None;
    }
    urlencoding::decode(key).map(|k| k.into_owned()).ok()
}

/// S3 (or S3-compatible) object store.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "trendboard-config",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Object storage initialized"
        );

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_public(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("PutObject {} failed: {}", key, e)))?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn make_public(&self, key: &str) -> Result<(), AppError> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("PutObjectAcl {} failed: {}", key, e)))?;
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        key_from_public_url(&self.public_base_url, url)
    }
}

/// Store used when no bucket is configured. Every operation fails.
pub struct UnconfiguredStore;

#[async_trait]
impl ObjectStore for UnconfiguredStore {
    async fn put_public(&self, _: &str, _: &str, _: Vec<u8>) -> Result<String, AppError> {
        Err(AppError::Storage("Object storage is not configured".to_string()))
    }

    async fn make_public(&self, _: &str) -> Result<(), AppError> {
        Err(AppError::Storage("Object storage is not configured".to_string()))
    }

    fn key_for_url(&self, _: &str) -> Option<String> {
        None
    }
}

/// In-process store for tests and offline development.
///
/// Keys added with [`MemoryStore::fail_on`] make `make_public` fail.
pub struct MemoryStore {
    public_base_url: String,
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    public_keys: Mutex<HashSet<String>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            public_keys: Mutex::new(HashSet::new()),
            failing_keys: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_on(&self, key: &str) {
        lock(&self.failing_keys).insert(key.to_string());
    }

    pub fn is_public(&self, key: &str) -> bool {
        lock(&self.public_keys).contains(key)
    }

    /// Content type and bytes of a stored object.
    pub fn object(&self, key: &str) -> Option<(String, Vec<u8>)> {
        lock(&self.objects).get(key).cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_public(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, AppError> {
        lock(&self.objects).insert(key.to_string(), (content_type.to_string(), body));
        lock(&self.public_keys).insert(key.to_string());
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn make_public(&self, key: &str) -> Result<(), AppError> {
        if lock(&self.failing_keys).contains(key) {
            return Err(AppError::Storage(format!("access denied for {}", key)));
        }
        lock(&self.public_keys).insert(key.to_string());
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        key_from_public_url(&self.public_base_url, url)
    }
}
