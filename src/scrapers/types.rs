use std::time::Duration;

/// Tunables for one scrape run.
///
/// The settle wait approximates "page finished client-side rendering" on the
/// detail pages; the site offers no event to await, so it is a single policy
/// value here rather than constants scattered through the enricher.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Hard limit on waiting for the intercepted search-API response.
    pub search_response_timeout: Duration,
    /// Per-step limit for detail-page navigation.
    pub detail_nav_timeout: Duration,
    /// Per-step limit for locating the detail content container.
    pub detail_selector_timeout: Duration,
    /// Fixed delay used around the lazy-load scroll sequence.
    pub settle_wait: Duration,
    /// Maximum detail-page fetches in flight at once.
    pub detail_concurrency: usize,
    /// Character cap applied to each extracted content block.
    pub block_char_cap: usize,
    /// Column width for the description fallback wrap.
    pub description_wrap_width: usize,
    /// Line cap for the description fallback wrap.
    pub description_max_lines: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_response_timeout: Duration::from_secs(60),
            detail_nav_timeout: Duration::from_secs(5),
            detail_selector_timeout: Duration::from_secs(5),
            settle_wait: Duration::from_millis(1200),
            detail_concurrency: 5,
            block_char_cap: 800,
            description_wrap_width: 120,
            description_max_lines: 30,
        }
    }
}
