pub mod browser;
pub mod extract;
pub mod trademe;
pub mod traits;
pub mod types;

pub use browser::ChromiumRuntime;
pub use trademe::{run_scrape, TradeMeScraper};
pub use traits::{BrowserError, BrowserPage, BrowserRuntime};
pub use types::ScrapeConfig;
