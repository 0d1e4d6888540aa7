//! CDP implementation of the automation contract over chromiumoxide.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{DriverError, Result};
use crate::{DomNode, PageDriver, WaitOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A headless Chromium session driving a single page.
pub struct CdpDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl CdpDriver {
    /// Launch Chromium and open a blank page with the given user agent.
    pub async fn launch(headless: bool, user_agent: &str) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        // The event handler must be polled for the whole browser lifetime.
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(map_cdp_err)?;
        page.set_user_agent(user_agent).await.map_err(map_cdp_err)?;

        debug!(headless, "Launched Chromium session");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Shut the browser down. Errors closing an already-dead browser are
    /// logged, not returned.
    pub async fn close(mut self) {
        if let Err(e) = self.page.close().await {
            warn!(error = %e, "Page close failed");
        }
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                let mapped = map_cdp_err(e);
                if mapped.is_fatal() {
                    Err(mapped)
                } else {
                    Err(DriverError::Navigation {
                        url: url.to_string(),
                        message: mapped.to_string(),
                    })
                }
            }
            Err(_) => Err(DriverError::Navigation {
                url: url.to_string(),
                message: format!("timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> WaitOutcome {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return WaitOutcome::Found;
            }
            if tokio::time::Instant::now() >= deadline {
                return WaitOutcome::TimedOut;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_count(
        &self,
        selector: &str,
        more_than: usize,
        timeout: Duration,
    ) -> WaitOutcome {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(elements) = self.page.find_elements(selector).await {
                if elements.len() > more_than {
                    return WaitOutcome::Found;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return WaitOutcome::TimedOut;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn DomNode>>> {
        match self.page.find_element(selector).await {
            Ok(element) => Ok(Some(Box::new(CdpNode { inner: element }))),
            Err(e) => none_unless_fatal(e),
        }
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn DomNode>>> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements
                .into_iter()
                .map(|inner| Box::new(CdpNode { inner }) as Box<dyn DomNode>)
                .collect()),
            Err(e) => {
                let mapped = map_cdp_err(e);
                if mapped.is_fatal() {
                    Err(mapped)
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.map_err(map_cdp_err)
    }

    async fn evaluate(&self, js: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(js).await.map_err(map_cdp_err)?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(map_cdp_err)?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|e| DriverError::Screenshot(e.to_string()))?;
        Ok(())
    }
}

struct CdpNode {
    inner: Element,
}

#[async_trait]
impl DomNode for CdpNode {
    async fn query(&self, selector: &str) -> Result<Option<Box<dyn DomNode>>> {
        match self.inner.find_element(selector).await {
            Ok(element) => Ok(Some(Box::new(CdpNode { inner: element }))),
            Err(e) => none_unless_fatal(e),
        }
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn DomNode>>> {
        match self.inner.find_elements(selector).await {
            Ok(elements) => Ok(elements
                .into_iter()
                .map(|inner| Box::new(CdpNode { inner }) as Box<dyn DomNode>)
                .collect()),
            Err(e) => {
                let mapped = map_cdp_err(e);
                if mapped.is_fatal() {
                    Err(mapped)
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.inner.attribute(name).await.map_err(map_cdp_err)
    }

    async fn inner_text(&self) -> Result<String> {
        Ok(self
            .inner
            .inner_text()
            .await
            .map_err(map_cdp_err)?
            .unwrap_or_default())
    }

    async fn call_js(&self, function: &str) -> Result<serde_json::Value> {
        let returns = self
            .inner
            .call_js_fn(function, false)
            .await
            .map_err(map_cdp_err)?;
        Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
    }

    async fn click(&self) -> Result<()> {
        self.inner.click().await.map_err(map_cdp_err)?;
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<()> {
        self.inner.scroll_into_view().await.map_err(map_cdp_err)?;
        Ok(())
    }
}

/// "Not found" style failures become `Ok(None)`; transport failures bubble.
fn none_unless_fatal(e: chromiumoxide::error::CdpError) -> Result<Option<Box<dyn DomNode>>> {
    let mapped = map_cdp_err(e);
    if mapped.is_fatal() {
        Err(mapped)
    } else {
        Ok(None)
    }
}

fn map_cdp_err(e: chromiumoxide::error::CdpError) -> DriverError {
    let message = e.to_string();
    // The websocket to the browser dying is the one unrecoverable case;
    // everything else is a per-operation DOM failure.
    if message.contains("WebSocket")
        || message.contains("websocket")
        || message.contains("channel closed")
        || message.contains("connection closed")
    {
        DriverError::ConnectionLost(message)
    } else {
        DriverError::Dom(message)
    }
}
