use thiserror::Error;

use crate::scrapers::traits::BrowserError;

/// Failure modes of a scrape run.
///
/// `InvalidPageCount` is the only client error; outer layers map it to a
/// 400-class response and everything else to a 500-class response.
/// Per-listing detail failures are contained inside the enricher and never
/// surface here.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("pages must be between 1 and 10 (got {0})")]
    InvalidPageCount(u32),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("search page {page} returned an unexpected payload: {source}")]
    SearchPayload {
        page: u32,
        source: serde_json::Error,
    },
}
