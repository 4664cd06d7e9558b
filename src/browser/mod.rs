//! Page-session capability surface
//!
//! The extraction pipeline never talks to an automation engine directly; it
//! consumes the [`PageSession`] trait, which models the small set of page
//! interactions the pipeline needs: navigate, locate elements, read text and
//! attributes, synthesize scroll/click/keyboard input, and run scripts.
//! Elements are addressed through opaque [`ElementId`] handles minted by the
//! backend, so scoped lookups (a reply container inside one comment node)
//! stay natural without leaking engine types.
//!
//! Backends:
//! - [`cdp::CdpSession`] drives a real Chromium instance over DevTools
//! - [`fake::FakeSession`] is a scripted in-memory page for tests

pub mod cdp;
pub mod fake;

use async_trait::async_trait;

use crate::config::BrowserConfig;
use crate::error::SessionError;

/// Result alias for capability calls
pub type SessionResult<T> = Result<T, SessionError>;

/// Opaque handle to a rendered element, valid until the next navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Capability surface consumed by the extraction pipeline
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate the session to a URL and wait for the document to load.
    /// Invalidates all previously issued element handles.
    async fn navigate(&self, url: &str) -> SessionResult<()>;

    /// URL the session currently points at
    async fn current_url(&self) -> SessionResult<String>;

    /// First element matching `selector` under the document, if any
    async fn find(&self, selector: &str) -> SessionResult<Option<ElementId>>;

    /// All elements matching `selector` under the document, document order
    async fn find_all(&self, selector: &str) -> SessionResult<Vec<ElementId>>;

    /// First element matching `selector` under `scope`, if any
    async fn find_in(&self, scope: ElementId, selector: &str) -> SessionResult<Option<ElementId>>;

    /// All elements matching `selector` under `scope`, document order
    async fn find_all_in(&self, scope: ElementId, selector: &str)
        -> SessionResult<Vec<ElementId>>;

    /// Rendered text content of an element, trimmed
    async fn text(&self, el: ElementId) -> SessionResult<String>;

    /// Attribute value of an element, `None` when absent
    async fn attr(&self, el: ElementId, name: &str) -> SessionResult<Option<String>>;

    async fn click(&self, el: ElementId) -> SessionResult<()>;

    async fn hover(&self, el: ElementId) -> SessionResult<()>;

    async fn focus(&self, el: ElementId) -> SessionResult<()>;

    async fn scroll_into_view(&self, el: ElementId) -> SessionResult<()>;

    /// Scroll the viewport down by `delta` pixels
    async fn scroll_by(&self, delta: i64) -> SessionResult<()>;

    /// Scroll the viewport to the bottom of the document
    async fn scroll_to_bottom(&self) -> SessionResult<()>;

    /// Scroll an element's own scroll container by `delta` pixels
    async fn scroll_element(&self, el: ElementId, delta: i64) -> SessionResult<()>;

    /// Dispatch a synthetic wheel event at the element's centre
    async fn dispatch_wheel(&self, el: ElementId, delta_y: i64) -> SessionResult<()>;

    /// Press a keyboard key against the focused document (e.g. "PageDown")
    async fn press_key(&self, key: &str) -> SessionResult<()>;

    /// Run an arbitrary script against the document
    async fn run_script(&self, script: &str) -> SessionResult<()>;
}

/// Connect the backend named in the configuration.
pub async fn connect(config: &BrowserConfig) -> anyhow::Result<std::sync::Arc<dyn PageSession>> {
    let session = cdp::CdpSession::open(config).await?;
    Ok(std::sync::Arc::new(session))
}

/// Give the operator a window to complete the interactive login before the
/// batch run starts. The site gates most content behind a QR-code login which
/// cannot (and per the non-goals, must not) be automated.
pub async fn interactive_login(
    session: &dyn PageSession,
    config: &BrowserConfig,
) -> SessionResult<()> {
    session.navigate(&config.base_url).await?;
    tracing::info!(
        grace_secs = config.login_grace_secs,
        "waiting for interactive login to complete"
    );
    tokio::time::sleep(std::time::Duration::from_secs(config.login_grace_secs)).await;
    Ok(())
}

/// Defensive capability reads
///
/// The extraction components read dozens of optional page fields; any single
/// missing element must degrade to an empty value instead of aborting its
/// siblings. These adapters collapse `Err` and `None` into defaults and log
/// the miss at debug level, keeping the component logic declarative.
pub mod probe {
    use super::{ElementId, PageSession};

    /// First document-level match, `None` on miss or error
    pub async fn find(session: &dyn PageSession, selector: &str) -> Option<ElementId> {
        match session.find(selector).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(selector, error = %e, "probe find failed");
                None
            }
        }
    }

    /// All document-level matches, empty on error
    pub async fn all(session: &dyn PageSession, selector: &str) -> Vec<ElementId> {
        match session.find_all(selector).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(selector, error = %e, "probe find_all failed");
                Vec::new()
            }
        }
    }

    /// First scoped match, `None` on miss or error
    pub async fn find_in(
        session: &dyn PageSession,
        scope: ElementId,
        selector: &str,
    ) -> Option<ElementId> {
        match session.find_in(scope, selector).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(selector, %scope, error = %e, "probe find_in failed");
                None
            }
        }
    }

    /// All scoped matches, empty on error
    pub async fn all_in(
        session: &dyn PageSession,
        scope: ElementId,
        selector: &str,
    ) -> Vec<ElementId> {
        match session.find_all_in(scope, selector).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(selector, %scope, error = %e, "probe find_all_in failed");
                Vec::new()
            }
        }
    }

    /// Text of an element, empty string on error
    pub async fn text(session: &dyn PageSession, el: ElementId) -> String {
        session.text(el).await.unwrap_or_default()
    }

    /// Text of the first `selector` match under `scope`, empty on any miss
    pub async fn text_under(session: &dyn PageSession, scope: ElementId, selector: &str) -> String {
        match find_in(session, scope, selector).await {
            Some(el) => text(session, el).await,
            None => String::new(),
        }
    }

    /// Attribute of an element, empty string when absent or on error
    pub async fn attr(session: &dyn PageSession, el: ElementId, name: &str) -> String {
        session
            .attr(el, name)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Attribute of the first `selector` match under `scope`, empty on miss
    pub async fn attr_under(
        session: &dyn PageSession,
        scope: ElementId,
        selector: &str,
        name: &str,
    ) -> String {
        match find_in(session, scope, selector).await {
            Some(el) => attr(session, el, name).await,
            None => String::new(),
        }
    }

    /// Click an element; true on success, logged miss otherwise
    pub async fn click(session: &dyn PageSession, el: ElementId) -> bool {
        match session.click(el).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(%el, error = %e, "probe click failed");
                false
            }
        }
    }
}
