//! Rate limiting for the back-office login using governor and `tower_governor`.
//!
//! The admin server is usually reached directly or through a single proxy,
//! so the key is the smart client IP: proxy headers when present, the peer
//! address otherwise. The router must be served with connect info.

use std::sync::Arc;

use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<SmartIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Rate limiter for `/api/admin/auth/*`: 1 request every 10 seconds, burst of 5.
///
/// # Panics
///
/// Never panics: the builder only rejects zero periods or bursts.
#[must_use]
pub fn login_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(10)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(10) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}
