//! Google Merchant Center feed.

use askama::Template;
use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, instrument};

use desguace_core::models::catalog::PLACEHOLDER_IMAGE;

use crate::db::{CatalogRepository, FeedStats};
use crate::error::{AppError, Result};
use crate::services::merchant_feed::{FEED_LIMIT, GoogleMerchantFeed};
use crate::state::AppState;

const FEED_CACHE_KEY: &str = "google_merchant";

async fn render_feed(state: &AppState) -> Result<String> {
    let parts = CatalogRepository::new(state.pool())
        .feed_parts(FEED_LIMIT)
        .await?;
    let feed = GoogleMerchantFeed::build(&parts, &state.config().merchant_feed_base_url);
    info!(
        candidates = parts.len(),
        items = feed.items.len(),
        "Merchant feed built"
    );
    feed.render()
        .map_err(|e| AppError::Internal(format!("feed template: {e}")))
}

/// RSS 2.0 feed, rebuilt at most once an hour.
#[instrument(skip(state))]
pub async fn google_merchant(State(state): State<AppState>) -> Result<Response> {
    let xml = if let Some(cached) = state.feed_cache().get(FEED_CACHE_KEY).await {
        debug!("Merchant feed served from cache");
        cached
    } else {
        let xml = render_feed(&state).await?;
        state
            .feed_cache()
            .insert(FEED_CACHE_KEY, xml.clone())
            .await;
        xml
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        xml,
    )
        .into_response())
}

/// How many parts qualify for the feed.
pub async fn stats(State(state): State<AppState>) -> Result<Json<FeedStats>> {
    Ok(Json(
        CatalogRepository::new(state.pool())
            .feed_stats(PLACEHOLDER_IMAGE)
            .await?,
    ))
}
