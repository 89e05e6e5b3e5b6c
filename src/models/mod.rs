// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod category;
pub mod trend;
pub mod user;

pub use category::{Category, CategoryInput};
pub use trend::{NewTrend, Trend, TrendAnalytics, TrendKind, TrendUpdate};
pub use user::{GoogleProfile, Role, User};
