use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from the browser capability layer.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(anyhow::Error),
    #[error("navigation to {url} failed: {reason}")]
    Navigate { url: String, reason: anyhow::Error },
    #[error("timed out after {after:?} waiting for {operation}")]
    Timeout { operation: String, after: Duration },
    #[error("in-page evaluation failed: {0}")]
    Evaluate(anyhow::Error),
    #[error("browser protocol error: {0}")]
    Protocol(anyhow::Error),
}

/// Minimal browser capability the scrape pipeline needs.
///
/// Production code drives Chrome over the DevTools protocol; tests substitute
/// a scripted fake so harvester and enricher logic run without a browser.
#[async_trait]
pub trait BrowserRuntime: Send + Sync {
    type Page: BrowserPage + Send;

    /// Open a fresh, isolated page context.
    async fn open_page(&self) -> Result<Self::Page, BrowserError>;
}

/// One isolated page context, opened and closed around a single unit of work.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and return once the document has started rendering.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Navigate to `nav_url` and resolve with the decoded JSON body of the
    /// first GET response whose URL starts with `api_prefix`. The listener is
    /// armed before navigation begins; later matching responses are ignored.
    async fn navigate_and_capture(
        &self,
        nav_url: &str,
        api_prefix: &str,
        timeout: Duration,
    ) -> Result<Value, BrowserError>;

    /// Block until an element matching `selector` exists.
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Evaluate a script in the page, returning its JSON value (`null` when
    /// the script produces none).
    async fn evaluate(&self, js: &str) -> Result<Value, BrowserError>;

    /// Inner text of every element matching a CSS selector, in DOM order.
    async fn element_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError>;

    /// Release the page context.
    async fn close(self) -> Result<(), BrowserError>;
}
