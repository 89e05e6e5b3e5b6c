// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription gating for trend analytics.
//!
//! Subscribers see full analytics. Everyone else gets the same record shape
//! with every value zeroed and the age breakdown dropped, so charts keep
//! their date axis but show no data.

use crate::models::{Trend, User};
use chrono::{DateTime, Utc};

/// Whether a subscription with this expiry is active right now.
pub fn is_subscription_active(expires_at: Option<DateTime<Utc>>) -> bool {
    is_active_at(expires_at, Utc::now())
}

/// Whether a subscription with this expiry is active at `now`.
///
/// A missing expiry means the user never subscribed. Expiry is exclusive.
pub fn is_active_at(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expiry) => expiry > now,
        None => false,
    }
}

/// Subscription status of an optional viewer. Anonymous viewers are not subscribed.
pub fn viewer_is_subscribed(viewer: Option<&User>) -> bool {
    viewer.is_some_and(|user| is_subscription_active(user.subscription_expires_at))
}

/// Project a trend for a viewer with the given subscription status.
pub fn redact(mut trend: Trend, active: bool) -> Trend {
    trend.is_restricted = !active;
    if active {
        return trend;
    }

    if let Some(analytics) = trend.analytics.as_mut() {
        analytics.values.iter_mut().for_each(|v| *v = 0.0);
        analytics.age_segments = None;
    }
    trend
}

/// Redact every trend in a list, keeping its order.
pub fn redact_all(trends: Vec<Trend>, active: bool) -> Vec<Trend> {
    trends.into_iter().map(|t| redact(t, active)).collect()
}
