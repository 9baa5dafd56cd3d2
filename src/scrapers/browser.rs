use std::collections::HashSet;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventRequestWillBeSent, GetResponseBodyParams, RequestId,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::scrapers::traits::{BrowserError, BrowserPage, BrowserRuntime};

/// Chrome-over-CDP implementation of the browser capability.
pub struct ChromiumRuntime {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl ChromiumRuntime {
    /// Launch a headless Chrome instance and start draining its CDP events.
    pub async fn launch() -> Result<Self, BrowserError> {
        let config = BrowserConfig::builder()
            .args(["--no-sandbox", "--disable-dev-shm-usage"])
            .build()
            .map_err(|e| BrowserError::Launch(anyhow!(e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.into()))?;

        // The handler stream must be drained for the lifetime of the
        // connection or every CDP call stalls.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("cdp handler event error (continuing): {e}");
                }
            }
            debug!("cdp handler stream ended");
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Close the browser and stop the event task. Errors are logged rather
    /// than surfaced; shutdown runs on success and failure paths alike.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("browser close error (ignored): {e}");
        }
        self.handler_task.abort();
    }
}

#[async_trait]
impl BrowserRuntime for ChromiumRuntime {
    type Page = ChromiumPage;

    async fn open_page(&self) -> Result<ChromiumPage, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Protocol(e.into()))?;
        Ok(ChromiumPage { page })
    }
}

/// One Chrome tab, closed explicitly after its unit of work.
pub struct ChromiumPage {
    page: Page,
}

/// Tracks the first GET request matching a URL prefix across the two network
/// event streams. `RequestWillBeSent` and `LoadingFinished` arrive on
/// independent channels, so the finish can be observed before the request is;
/// finished ids are remembered until the matching request is identified.
struct ResponseMatcher {
    api_prefix: String,
    pending: Option<RequestId>,
    finished: HashSet<RequestId>,
}

impl ResponseMatcher {
    fn new(api_prefix: &str) -> Self {
        Self {
            api_prefix: api_prefix.to_string(),
            pending: None,
            finished: HashSet::new(),
        }
    }

    /// Record a request; returns the id to fetch when its response already
    /// finished loading. First matching GET request wins, later matches are
    /// ignored.
    fn on_request(&mut self, id: &RequestId, method: &str, url: &str) -> Option<RequestId> {
        if self.pending.is_none()
            && method.eq_ignore_ascii_case("GET")
            && url.starts_with(&self.api_prefix)
        {
            self.pending = Some(id.clone());
            if self.finished.contains(id) {
                return Some(id.clone());
            }
        }
        None
    }

    /// Record a finished load; returns the id to fetch when it belongs to
    /// the matched request.
    fn on_finished(&mut self, id: &RequestId) -> Option<RequestId> {
        if self.pending.as_ref() == Some(id) {
            return Some(id.clone());
        }
        self.finished.insert(id.clone());
        None
    }
}

impl ChromiumPage {
    async fn response_body(&self, request_id: RequestId) -> Result<Value, BrowserError> {
        let resp = self
            .page
            .execute(GetResponseBodyParams::new(request_id))
            .await
            .map_err(|e| BrowserError::Protocol(e.into()))?;
        let raw = if resp.base64_encoded {
            base64::engine::general_purpose::STANDARD
                .decode(resp.body.as_bytes())
                .map_err(|e| BrowserError::Protocol(e.into()))?
        } else {
            resp.body.clone().into_bytes()
        };
        serde_json::from_slice(&raw).map_err(|e| BrowserError::Protocol(e.into()))
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigate {
                url: url.to_string(),
                reason: e.into(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                operation: format!("navigation to {url}"),
                after: timeout,
            }),
        }
    }

    async fn navigate_and_capture(
        &self,
        nav_url: &str,
        api_prefix: &str,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(|e| BrowserError::Protocol(e.into()))?;

        let mut requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| BrowserError::Protocol(e.into()))?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| BrowserError::Protocol(e.into()))?;

        // Drive navigation in the background; the page keeps loading while
        // the capture below watches the network stream.
        let nav_page = self.page.clone();
        let nav_target = nav_url.to_string();
        let nav_task = tokio::spawn(async move {
            if let Err(e) = nav_page.goto(nav_target.as_str()).await {
                debug!("navigation to {nav_target} ended with error: {e}");
            }
        });

        let capture = async {
            let mut matcher = ResponseMatcher::new(api_prefix);
            loop {
                tokio::select! {
                    Some(req) = requests.next() => {
                        if let Some(id) =
                            matcher.on_request(&req.request_id, &req.request.method, &req.request.url)
                        {
                            return self.response_body(id).await;
                        }
                    }
                    Some(done) = finished.next() => {
                        if let Some(id) = matcher.on_finished(&done.request_id) {
                            return self.response_body(id).await;
                        }
                    }
                    else => {
                        return Err(BrowserError::Protocol(anyhow!(
                            "network event stream closed before a matching response"
                        )));
                    }
                }
            }
        };

        let result = match tokio::time::timeout(timeout, capture).await {
            Ok(body) => body,
            Err(_) => Err(BrowserError::Timeout {
                operation: format!("response matching {api_prefix}"),
                after: timeout,
            }),
        };
        nav_task.abort();
        result
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    operation: format!("selector {selector}"),
                    after: timeout,
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn evaluate(&self, js: &str) -> Result<Value, BrowserError> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| BrowserError::Evaluate(e.into()))?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn element_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let quoted = Value::String(selector.to_string()).to_string();
        let js = format!(
            "Array.from(document.querySelectorAll({quoted})).map(e => (e.innerText || '').trim())"
        );
        let value = self.evaluate(&js).await?;
        serde_json::from_value(value).map_err(|e| BrowserError::Evaluate(e.into()))
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.page
            .close()
            .await
            .map_err(|e| BrowserError::Protocol(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "https://api.trademe.co.nz/v1/search/property/residential.json";

    fn id(s: &str) -> RequestId {
        RequestId::new(s)
    }

    #[test]
    fn request_then_finished_resolves() {
        let mut matcher = ResponseMatcher::new(PREFIX);
        assert_eq!(
            matcher.on_request(&id("r1"), "GET", &format!("{PREFIX}?page=1")),
            None
        );
        assert_eq!(matcher.on_finished(&id("r1")), Some(id("r1")));
    }

    #[test]
    fn finished_before_request_still_resolves() {
        // Both events can sit queued before the capture loop wakes, in which
        // case the finish is consumed first; it must not be lost.
        let mut matcher = ResponseMatcher::new(PREFIX);
        assert_eq!(matcher.on_finished(&id("r1")), None);
        assert_eq!(
            matcher.on_request(&id("r1"), "GET", &format!("{PREFIX}?page=1")),
            Some(id("r1"))
        );
    }

    #[test]
    fn only_matching_get_requests_are_tracked() {
        let mut matcher = ResponseMatcher::new(PREFIX);
        assert_eq!(
            matcher.on_request(&id("r1"), "POST", &format!("{PREFIX}?page=1")),
            None
        );
        assert_eq!(
            matcher.on_request(&id("r2"), "GET", "https://www.trademe.co.nz/assets/app.js"),
            None
        );
        // Neither request was matched, so their finishes resolve nothing.
        assert_eq!(matcher.on_finished(&id("r1")), None);
        assert_eq!(matcher.on_finished(&id("r2")), None);
    }

    #[test]
    fn first_matching_request_wins() {
        let mut matcher = ResponseMatcher::new(PREFIX);
        assert_eq!(
            matcher.on_request(&id("r1"), "GET", &format!("{PREFIX}?page=1")),
            None
        );
        assert_eq!(
            matcher.on_request(&id("r2"), "GET", &format!("{PREFIX}?page=1")),
            None
        );
        assert_eq!(matcher.on_finished(&id("r2")), None);
        assert_eq!(matcher.on_finished(&id("r1")), Some(id("r1")));
    }
}
