//! Two-phase Trade Me scraper for Waitakere City residential listings.
//!
//! Phase one harvests listing stubs page by page, intercepting the backend
//! search-API response the results page triggers while rendering. Phase two
//! visits every listing's detail page under a concurrency cap and extracts
//! the detail fields from the rendered content blocks.

use std::ops::RangeInclusive;

use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::models::{DetailFields, EnrichedListing, ListingStub};
use crate::scrapers::browser::ChromiumRuntime;
use crate::scrapers::extract::{first_number, line_containing, money, parse_wire_date, wrap_lines};
use crate::scrapers::traits::{BrowserError, BrowserPage, BrowserRuntime};
use crate::scrapers::types::ScrapeConfig;

/// Search results page for Waitakere City residential sales.
const SEARCH_PAGE: &str =
    "https://www.trademe.co.nz/a/property/residential/sale/auckland/waitakere-city";

/// Backend search API the results page calls as a side effect of rendering.
const SEARCH_API: &str = "https://api.trademe.co.nz/v1/search/property/residential.json";

/// Content container on a detail page whose immediate children are the
/// summary, valuation-insights, capital-value and description blocks.
const LISTING_BODY_SEL: &str = "body > tm-root > div:nth-child(1) > main > div > \
     tm-property-listing > div > div:nth-child(4) > tg-row:nth-child(1) > \
     tg-col > tm-property-listing-body";

const FEATURE_BADGES_SEL: &str = "ul.tm-property-details-summary-attribute-icons__features \
     span.tm-property-details-summary-attribute-icons__metric-value";

const DESCRIPTION_SEL: &str = "tm-property-listing-description tm-markdown";

const PAGE_RANGE: RangeInclusive<u32> = 1..=10;

fn ensure_page_range(pages: u32) -> Result<(), ScrapeError> {
    if PAGE_RANGE.contains(&pages) {
        Ok(())
    } else {
        Err(ScrapeError::InvalidPageCount(pages))
    }
}

/// Script reading the listing body's immediate children as capped text blocks.
fn child_blocks_js(char_cap: usize) -> String {
    let quoted = serde_json::Value::String(LISTING_BODY_SEL.to_string()).to_string();
    format!(
        "(() => {{ const b = document.querySelector({quoted}); \
         return b ? Array.from(b.children).map(e => (e.innerText || '').trim().slice(0, {char_cap})) : []; }})()"
    )
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(rename = "List", default)]
    list: Vec<ListingStub>,
}

/// Scrape `pages` result pages and enrich every listing found.
///
/// This is the single entry point outer layers call. Invalid page counts fail
/// before any browser activity; a search-phase failure aborts the whole run.
/// Detail-page failures never do, they degrade the affected listing's fields
/// to empty strings.
pub async fn run_scrape(pages: u32) -> Result<Vec<EnrichedListing>, ScrapeError> {
    ensure_page_range(pages)?;

    let scraper = TradeMeScraper::launch().await?;
    let result = scraper.run_scrape(pages).await;
    scraper.into_runtime().shutdown().await;
    result
}

/// Trade Me scraper over any [`BrowserRuntime`] implementation.
pub struct TradeMeScraper<R: BrowserRuntime> {
    runtime: R,
    config: ScrapeConfig,
}

impl TradeMeScraper<ChromiumRuntime> {
    /// Launch headless Chrome with the default configuration.
    pub async fn launch() -> Result<Self, ScrapeError> {
        let runtime = ChromiumRuntime::launch().await?;
        Ok(Self::with_runtime(runtime, ScrapeConfig::default()))
    }
}

impl<R: BrowserRuntime> TradeMeScraper<R> {
    pub fn with_runtime(runtime: R, config: ScrapeConfig) -> Self {
        Self { runtime, config }
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    /// Run both phases: sequential search harvest, then capped-concurrency
    /// detail enrichment, then finalization into output records.
    pub async fn run_scrape(&self, pages: u32) -> Result<Vec<EnrichedListing>, ScrapeError> {
        ensure_page_range(pages)?;

        let mut stubs = Vec::new();
        for page_num in 1..=pages {
            let mut batch = self.harvest_page(page_num).await?;
            info!("search page {page_num}: {} listings", batch.len());
            stubs.append(&mut batch);
        }

        info!(
            "enriching {} listings ({} detail pages in flight at most)",
            stubs.len(),
            self.config.detail_concurrency
        );
        let gate = Semaphore::new(self.config.detail_concurrency);
        let workers = stubs.iter().map(|stub| self.enrich_worker(&gate, stub));
        let details = join_all(workers).await;

        Ok(stubs
            .into_iter()
            .zip(details)
            .map(|(stub, fields)| EnrichedListing::new(stub, fields))
            .collect())
    }

    /// Harvest one 1-based search page: intercept the search-API response the
    /// page triggers and return its stubs, newest first.
    async fn harvest_page(&self, page_num: u32) -> Result<Vec<ListingStub>, ScrapeError> {
        let page = self.runtime.open_page().await?;
        let url = format!("{SEARCH_PAGE}?page={page_num}");
        debug!("harvesting {url}");

        let captured = page
            .navigate_and_capture(&url, SEARCH_API, self.config.search_response_timeout)
            .await;
        if let Err(e) = page.close().await {
            debug!("search page close error (ignored): {e}");
        }

        let payload: SearchPayload = serde_json::from_value(captured?)
            .map_err(|source| ScrapeError::SearchPayload {
                page: page_num,
                source,
            })?;

        let mut stubs = payload.list;
        // Newest first within the page; unparsable dates carry the sentinel
        // minimum and therefore sort last.
        stubs.sort_by_key(|stub| std::cmp::Reverse(parse_wire_date(stub.start_date.as_deref())));
        Ok(stubs)
    }

    /// One enrichment unit: take a permit, open a page, extract, close.
    async fn enrich_worker(&self, gate: &Semaphore, stub: &ListingStub) -> DetailFields {
        let _permit = match gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => return DetailFields::default(), // gate closed, run torn down
        };

        let page = match self.runtime.open_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %stub.detail_url(), error = %e, "could not open detail page");
                return DetailFields::default();
            }
        };
        let fields = self.enrich(&page, stub).await;
        if let Err(e) = page.close().await {
            debug!("detail page close error (ignored): {e}");
        }
        fields
    }

    /// Extract all detail fields for one listing. Never fails: whatever was
    /// produced before an error stays, the rest remain empty strings.
    async fn enrich(&self, page: &R::Page, stub: &ListingStub) -> DetailFields {
        let url = stub.detail_url();
        let mut fields = DetailFields::default();
        if let Err(e) = self.try_enrich(page, &url, &mut fields).await {
            warn!(url = %url, error = %e, "detail enrichment degraded");
        }
        fields
    }

    async fn try_enrich(
        &self,
        page: &R::Page,
        url: &str,
        fields: &mut DetailFields,
    ) -> Result<(), BrowserError> {
        page.navigate(url, self.config.detail_nav_timeout).await?;
        page.wait_for_selector(LISTING_BODY_SEL, self.config.detail_selector_timeout)
            .await?;

        // The page renders client-side and lazily on scroll; there is no
        // render-complete event to await, so settle waits bracket one full
        // scroll pass.
        sleep(self.config.settle_wait).await;
        page.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        sleep(self.config.settle_wait).await;
        page.evaluate("window.scrollTo(0, 0)").await?;

        let blocks: Vec<String> = serde_json::from_value(
            page.evaluate(&child_blocks_js(self.config.block_char_cap))
                .await?,
        )
        .unwrap_or_default();

        // Block 0: summary. First line is the address; the price is the first
        // line carrying a dollar sign, else any money match in the block.
        let summary = blocks.first().map(String::as_str).unwrap_or_default();
        let summary_lines: Vec<&str> = summary.lines().collect();
        fields.address = summary_lines
            .first()
            .map(|line| line.to_string())
            .unwrap_or_default();
        let dollar_line = line_containing(&summary_lines, "$");
        fields.price_line = if dollar_line.is_empty() {
            money(summary)
        } else {
            dollar_line
        };

        // Feature badges, positional schema: index 0 beds, 1 baths, 2 parks.
        let badges = page.element_texts(FEATURE_BADGES_SEL).await?;
        if badges.len() != 3 {
            warn!(
                url = %url,
                count = badges.len(),
                "expected exactly bed/bath/park badges; padding missing values"
            );
        }
        let mut numbers = badges.iter().map(|badge| first_number(badge));
        fields.beds = numbers.next().unwrap_or_default();
        fields.baths = numbers.next().unwrap_or_default();
        fields.parks = numbers.next().unwrap_or_default();

        // Block 1: valuation insights, absent on many listings.
        if let Some(insights) = blocks.get(1) {
            let est_lines: Vec<&str> = insights.lines().collect();
            fields.homes_estimate = est_lines
                .first()
                .map(|first| {
                    let parts: Vec<String> = first.split('–').map(money).collect();
                    if parts.iter().all(String::is_empty) {
                        String::new()
                    } else {
                        parts.join(" – ")
                    }
                })
                .unwrap_or_default();
            fields.homes_updated = line_containing(&est_lines, "Updated");
            fields.rent_estimate = line_containing(&est_lines, "/ week");
            fields.rent_updated = line_containing(&est_lines, "Updated");
            fields.rent_yield = line_containing(&est_lines, "%");
        }

        // Block 2: council capital value.
        if let Some(block) = blocks.get(2) {
            if block.contains("Capital Value") {
                let tail = block.lines().skip(1).collect::<Vec<_>>().join(" ");
                fields.capital_value = money(&tail);
            }
        }

        // Description: the rich-text element when the page has one, else a
        // wrapped fallback from the remaining blocks.
        fields.description = match page.element_texts(DESCRIPTION_SEL).await?.into_iter().next() {
            Some(text) => text.trim().to_string(),
            None => {
                let fallback = if blocks.len() > 3 {
                    blocks[3].clone()
                } else {
                    blocks.join("\n")
                };
                wrap_lines(
                    &fallback,
                    self.config.description_wrap_width,
                    self.config.description_max_lines,
                )
            }
        };

        Ok(())
    }
}
