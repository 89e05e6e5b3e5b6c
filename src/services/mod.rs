// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod access;
pub mod google_oauth;
pub mod google_oidc;
pub mod images;
pub mod sheets;
pub mod storage;

pub use google_oauth::GoogleOAuthClient;
pub use google_oidc::{GoogleOidcVerifier, OidcError};
pub use sheets::SheetsClient;
pub use storage::{MemoryStore, ObjectStore, S3Store, UnconfiguredStore};
