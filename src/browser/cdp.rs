//! Chromium DevTools backend for [`PageSession`]
//!
//! Drives a real browser through chromiumoxide. Elements returned by the
//! protocol are parked in a registry keyed by [`ElementId`]; navigation
//! clears the registry, which is how handle invalidation is enforced.
//!
//! The session either connects to an already-running browser (so the
//! operator's logged-in profile is reused) or launches a headed instance of
//! its own. Headless is deliberately not offered here: the site's login is
//! interactive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::browser::{ElementId, PageSession, SessionResult};
use crate::config::BrowserConfig;
use crate::error::SessionError;

/// DevTools-backed page session
pub struct CdpSession {
    _browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    elements: Mutex<HashMap<u64, Arc<Element>>>,
    next_id: AtomicU64,
}

impl CdpSession {
    /// Connect to the endpoint named in the configuration, or launch a headed
    /// browser when no endpoint is configured.
    pub async fn open(config: &BrowserConfig) -> anyhow::Result<Self> {
        let (browser, mut handler) = if let Some(url) = &config.devtools_url {
            info!(%url, "connecting to running browser over DevTools");
            Browser::connect(url.clone()).await?
        } else {
            info!("launching browser instance");
            let chrome = ChromeConfig::builder()
                .with_head()
                .request_timeout(Duration::from_secs(config.page_load_timeout_secs))
                .build()
                .map_err(|e| anyhow::anyhow!("browser configuration rejected: {e}"))?;
            Browser::launch(chrome).await?
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            _browser: browser,
            page,
            handler,
            elements: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Park an element and hand out its handle
    async fn register(&self, element: Element) -> ElementId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.elements.lock().await.insert(id, Arc::new(element));
        ElementId(id)
    }

    /// Resolve a handle back to its parked element
    async fn resolve(&self, el: ElementId) -> SessionResult<Arc<Element>> {
        self.elements
            .lock()
            .await
            .get(&el.0)
            .cloned()
            .ok_or(SessionError::StaleHandle(el.0))
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl PageSession for CdpSession {
    async fn navigate(&self, url: &str) -> SessionResult<()> {
        debug!(%url, "navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        self.elements.lock().await.clear();
        Ok(())
    }

    async fn current_url(&self) -> SessionResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn find(&self, selector: &str) -> SessionResult<Option<ElementId>> {
        match self.page.find_element(selector).await {
            Ok(element) => Ok(Some(self.register(element).await)),
            // the protocol reports a miss as an error; callers expect None
            Err(_) => Ok(None),
        }
    }

    async fn find_all(&self, selector: &str) -> SessionResult<Vec<ElementId>> {
        let elements = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(Vec::new()),
        };
        let mut ids = Vec::with_capacity(elements.len());
        for element in elements {
            ids.push(self.register(element).await);
        }
        Ok(ids)
    }

    async fn find_in(&self, scope: ElementId, selector: &str) -> SessionResult<Option<ElementId>> {
        let parent = self.resolve(scope).await?;
        match parent.find_element(selector).await {
            Ok(element) => Ok(Some(self.register(element).await)),
            Err(_) => Ok(None),
        }
    }

    async fn find_all_in(
        &self,
        scope: ElementId,
        selector: &str,
    ) -> SessionResult<Vec<ElementId>> {
        let parent = self.resolve(scope).await?;
        let elements = match parent.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(Vec::new()),
        };
        let mut ids = Vec::with_capacity(elements.len());
        for element in elements {
            ids.push(self.register(element).await);
        }
        Ok(ids)
    }

    async fn text(&self, el: ElementId) -> SessionResult<String> {
        let element = self.resolve(el).await?;
        let text = element
            .inner_text()
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attr(&self, el: ElementId, name: &str) -> SessionResult<Option<String>> {
        let element = self.resolve(el).await?;
        element
            .attribute(name)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))
    }

    async fn click(&self, el: ElementId) -> SessionResult<()> {
        let element = self.resolve(el).await?;
        element
            .click()
            .await
            .map_err(|e| SessionError::Input(e.to_string()))?;
        Ok(())
    }

    async fn hover(&self, el: ElementId) -> SessionResult<()> {
        let element = self.resolve(el).await?;
        element
            .hover()
            .await
            .map_err(|e| SessionError::Input(e.to_string()))?;
        Ok(())
    }

    async fn focus(&self, el: ElementId) -> SessionResult<()> {
        let element = self.resolve(el).await?;
        element
            .focus()
            .await
            .map_err(|e| SessionError::Input(e.to_string()))?;
        Ok(())
    }

    async fn scroll_into_view(&self, el: ElementId) -> SessionResult<()> {
        let element = self.resolve(el).await?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| SessionError::Input(e.to_string()))?;
        Ok(())
    }

    async fn scroll_by(&self, delta: i64) -> SessionResult<()> {
        self.page
            .evaluate(format!("window.scrollBy(0, {delta});"))
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> SessionResult<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight);")
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(())
    }

    async fn scroll_element(&self, el: ElementId, delta: i64) -> SessionResult<()> {
        let element = self.resolve(el).await?;
        element
            .call_js_fn(
                format!("function() {{ this.scrollBy(0, {delta}); }}"),
                false,
            )
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(())
    }

    async fn dispatch_wheel(&self, el: ElementId, delta_y: i64) -> SessionResult<()> {
        let element = self.resolve(el).await?;
        element
            .call_js_fn(
                format!(
                    "function() {{ this.dispatchEvent(new WheelEvent('wheel', \
                     {{ deltaY: {delta_y}, bubbles: true }})); }}"
                ),
                false,
            )
            .await
            .map_err(|e| SessionError::Input(e.to_string()))?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> SessionResult<()> {
        let body = self
            .page
            .find_element("body")
            .await
            .map_err(|e| SessionError::ElementNotFound(e.to_string()))?;
        body.press_key(key)
            .await
            .map_err(|e| SessionError::Input(e.to_string()))?;
        Ok(())
    }

    async fn run_script(&self, script: &str) -> SessionResult<()> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(())
    }
}
