//! Two-phase scraper for Trade Me residential listings in Waitakere City.
//!
//! Phase one intercepts the backend search-API response per results page and
//! collects listing stubs; phase two enriches each stub from its detail page
//! under a concurrency cap. [`run_scrape`] is the single entry point.

pub mod error;
pub mod models;
pub mod scrapers;

pub use error::ScrapeError;
pub use models::{DetailFields, EnrichedListing, ListingStub};
pub use scrapers::{run_scrape, ScrapeConfig, TradeMeScraper};
