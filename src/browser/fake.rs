//! Scripted in-memory page session for tests
//!
//! [`FakeSession`] lets tests stage a small DOM (nodes, document-level and
//! scoped selector matches) and simulate the behaviors the load controller
//! depends on: a lazily-rendered list that grows under scroll stimulus, an
//! expansion control that reveals more items when clicked, an end marker
//! that appears once everything is rendered, and failure injection per
//! selector. It fast-forwards rendering, so controller tests are
//! deterministic and need no real browser.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ElementId, PageSession, SessionResult};
use crate::error::SessionError;

#[derive(Debug, Default, Clone)]
struct FakeNode {
    text: String,
    attrs: HashMap<String, String>,
}

/// Lazily-rendered list: each viewport scroll reveals `growth` more items
/// until `total` are rendered.
#[derive(Debug)]
struct LazyList {
    selector: String,
    revealed: usize,
    total: usize,
    growth: usize,
    ids: Vec<ElementId>,
}

#[derive(Default)]
struct FakeState {
    nodes: HashMap<ElementId, FakeNode>,
    doc_matches: HashMap<String, Vec<ElementId>>,
    scoped_matches: HashMap<(ElementId, String), Vec<ElementId>>,
    lazy: Option<LazyList>,
    /// End-marker selector becomes visible once this many lazy items rendered
    end_marker: Option<(String, usize)>,
    /// Clicking these elements reveals more lazy items
    click_reveals: HashMap<ElementId, usize>,
    failing: HashSet<String>,
    /// When set, every scroll-flavored call errors out
    scrolls_fail: bool,
    next_id: u64,
    clicks: Vec<ElementId>,
    navigations: Vec<String>,
    key_presses: Vec<String>,
}

/// In-memory [`PageSession`] implementation for tests
pub struct FakeSession {
    state: Mutex<FakeState>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Add a node with text content and attributes, returning its handle
    pub fn add_node(&self, text: &str, attrs: &[(&str, &str)]) -> ElementId {
        let mut state = self.state.lock().unwrap();
        Self::mint_node(&mut state, text, attrs)
    }

    fn mint_node(state: &mut FakeState, text: &str, attrs: &[(&str, &str)]) -> ElementId {
        state.next_id += 1;
        let id = ElementId(state.next_id);
        state.nodes.insert(
            id,
            FakeNode {
                text: text.to_string(),
                attrs: attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        );
        id
    }

    /// Register document-level matches for a selector
    pub fn set_matches(&self, selector: &str, ids: Vec<ElementId>) {
        let mut state = self.state.lock().unwrap();
        state.doc_matches.insert(selector.to_string(), ids);
    }

    /// Register matches for a selector scoped under `scope`
    pub fn set_scoped(&self, scope: ElementId, selector: &str, ids: Vec<ElementId>) {
        let mut state = self.state.lock().unwrap();
        state
            .scoped_matches
            .insert((scope, selector.to_string()), ids);
    }

    /// Stage a lazily-rendered list behind `selector`: `initial` items are
    /// rendered up front and each viewport scroll reveals `growth` more,
    /// up to `total`.
    pub fn set_lazy_list(&self, selector: &str, initial: usize, total: usize, growth: usize) {
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::new();
        for _ in 0..initial.min(total) {
            ids.push(Self::mint_node(&mut state, "", &[]));
        }
        state.lazy = Some(LazyList {
            selector: selector.to_string(),
            revealed: initial.min(total),
            total,
            growth,
            ids,
        });
    }

    /// The end-marker `selector` resolves once `visible_at` lazy items are
    /// rendered
    pub fn set_end_marker(&self, selector: &str, visible_at: usize) {
        let mut state = self.state.lock().unwrap();
        state.end_marker = Some((selector.to_string(), visible_at));
    }

    /// Clicking `el` reveals `count` additional lazy items
    pub fn click_reveals(&self, el: ElementId, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.click_reveals.insert(el, count);
    }

    /// Any lookup on `selector` returns an error
    pub fn fail_selector(&self, selector: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing.insert(selector.to_string());
    }

    /// Every scroll call (viewport, element, wheel) returns an error.
    /// Keyboard input still works, so the lazy list can only advance
    /// through PageDown presses.
    pub fn fail_scrolls(&self) {
        let mut state = self.state.lock().unwrap();
        state.scrolls_fail = true;
    }

    pub fn click_count(&self) -> usize {
        self.state.lock().unwrap().clicks.len()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn key_presses(&self) -> Vec<String> {
        self.state.lock().unwrap().key_presses.clone()
    }

    pub fn revealed(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .lazy
            .as_ref()
            .map(|l| l.revealed)
            .unwrap_or(0)
    }

    fn reveal(state: &mut FakeState, count: usize) {
        let (target, missing) = match state.lazy.as_ref() {
            Some(lazy) => {
                let target = (lazy.revealed + count).min(lazy.total);
                (target, target.saturating_sub(lazy.ids.len()))
            }
            None => return,
        };
        for _ in 0..missing {
            state.next_id += 1;
            let id = ElementId(state.next_id);
            state.nodes.insert(id, FakeNode::default());
            if let Some(lazy) = state.lazy.as_mut() {
                lazy.ids.push(id);
            }
        }
        if let Some(lazy) = state.lazy.as_mut() {
            lazy.revealed = target;
        }
    }

    fn lookup(state: &FakeState, selector: &str) -> SessionResult<Vec<ElementId>> {
        if state.failing.contains(selector) {
            return Err(SessionError::Script(format!(
                "injected failure for {selector}"
            )));
        }
        if let Some(lazy) = &state.lazy {
            if lazy.selector == selector {
                return Ok(lazy.ids[..lazy.revealed].to_vec());
            }
        }
        if let Some((marker, visible_at)) = &state.end_marker {
            if marker == selector {
                let rendered = state.lazy.as_ref().map(|l| l.revealed).unwrap_or(0);
                if rendered >= *visible_at {
                    // Marker node is synthesized on first successful lookup
                    return Ok(state
                        .doc_matches
                        .get(selector)
                        .cloned()
                        .unwrap_or_else(|| vec![ElementId(u64::MAX)]));
                }
                return Ok(Vec::new());
            }
        }
        Ok(state.doc_matches.get(selector).cloned().unwrap_or_default())
    }
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&self, url: &str) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> SessionResult<String> {
        let state = self.state.lock().unwrap();
        Ok(state.navigations.last().cloned().unwrap_or_default())
    }

    async fn find(&self, selector: &str) -> SessionResult<Option<ElementId>> {
        let state = self.state.lock().unwrap();
        Ok(Self::lookup(&state, selector)?.first().copied())
    }

    async fn find_all(&self, selector: &str) -> SessionResult<Vec<ElementId>> {
        let state = self.state.lock().unwrap();
        Self::lookup(&state, selector)
    }

    async fn find_in(&self, scope: ElementId, selector: &str) -> SessionResult<Option<ElementId>> {
        Ok(self.find_all_in(scope, selector).await?.first().copied())
    }

    async fn find_all_in(
        &self,
        scope: ElementId,
        selector: &str,
    ) -> SessionResult<Vec<ElementId>> {
        let state = self.state.lock().unwrap();
        if state.failing.contains(selector) {
            return Err(SessionError::Script(format!(
                "injected failure for {selector}"
            )));
        }
        Ok(state
            .scoped_matches
            .get(&(scope, selector.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn text(&self, el: ElementId) -> SessionResult<String> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(&el)
            .map(|n| n.text.trim().to_string())
            .ok_or(SessionError::StaleHandle(el.0))
    }

    async fn attr(&self, el: ElementId, name: &str) -> SessionResult<Option<String>> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(&el)
            .map(|n| n.attrs.get(name).cloned())
            .ok_or(SessionError::StaleHandle(el.0))
    }

    async fn click(&self, el: ElementId) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(&el) && el != ElementId(u64::MAX) {
            return Err(SessionError::StaleHandle(el.0));
        }
        state.clicks.push(el);
        if let Some(count) = state.click_reveals.get(&el).copied() {
            Self::reveal(&mut state, count);
        }
        Ok(())
    }

    async fn hover(&self, _el: ElementId) -> SessionResult<()> {
        Ok(())
    }

    async fn focus(&self, _el: ElementId) -> SessionResult<()> {
        Ok(())
    }

    async fn scroll_into_view(&self, _el: ElementId) -> SessionResult<()> {
        Ok(())
    }

    async fn scroll_by(&self, delta: i64) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.scrolls_fail {
            return Err(SessionError::Input(format!("scroll_by({delta}) rejected")));
        }
        let growth = state.lazy.as_ref().map(|l| l.growth).unwrap_or(0);
        Self::reveal(&mut state, growth);
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> SessionResult<()> {
        self.scroll_by(0).await
    }

    async fn scroll_element(&self, el: ElementId, _delta: i64) -> SessionResult<()> {
        let state = self.state.lock().unwrap();
        if state.scrolls_fail {
            return Err(SessionError::Input(format!("scroll on {el} rejected")));
        }
        Ok(())
    }

    async fn dispatch_wheel(&self, el: ElementId, _delta_y: i64) -> SessionResult<()> {
        let state = self.state.lock().unwrap();
        if state.scrolls_fail {
            return Err(SessionError::Input(format!("wheel on {el} rejected")));
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> SessionResult<()> {
        let mut state = self.state.lock().unwrap();
        state.key_presses.push(key.to_string());
        // A page-down lands on the document scroll region, so it moves the
        // lazy list exactly like a viewport scroll would.
        if key == "PageDown" {
            let growth = state.lazy.as_ref().map(|l| l.growth).unwrap_or(0);
            Self::reveal(&mut state, growth);
        }
        Ok(())
    }

    async fn run_script(&self, _script: &str) -> SessionResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_list_grows_under_scroll() {
        let fake = FakeSession::new();
        fake.set_lazy_list("div.item", 1, 4, 1);

        assert_eq!(fake.find_all("div.item").await.unwrap().len(), 1);
        fake.scroll_by(500).await.unwrap();
        fake.scroll_by(500).await.unwrap();
        assert_eq!(fake.revealed(), 3);
        assert_eq!(fake.find_all("div.item").await.unwrap().len(), 3);
        for _ in 0..10 {
            fake.scroll_by(500).await.unwrap();
        }
        assert_eq!(fake.find_all("div.item").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_end_marker_appears_at_threshold() {
        let fake = FakeSession::new();
        fake.set_lazy_list("div.item", 2, 3, 1);
        fake.set_end_marker("div.end", 3);

        assert!(fake.find("div.end").await.unwrap().is_none());
        fake.scroll_by(500).await.unwrap();
        assert!(fake.find("div.end").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scroll_failure_leaves_keyboard_working() {
        let fake = FakeSession::new();
        fake.set_lazy_list("div.item", 1, 3, 1);
        fake.fail_scrolls();

        assert!(fake.scroll_by(500).await.is_err());
        let el = fake.add_node("", &[]);
        assert!(fake.scroll_element(el, 500).await.is_err());
        assert!(fake.dispatch_wheel(el, 300).await.is_err());

        fake.press_key("PageDown").await.unwrap();
        assert_eq!(fake.revealed(), 2);
        assert_eq!(fake.key_presses(), vec!["PageDown"]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let fake = FakeSession::new();
        fake.fail_selector("div.broken");
        assert!(fake.find_all("div.broken").await.is_err());
    }

    #[tokio::test]
    async fn test_scoped_matches() {
        let fake = FakeSession::new();
        let root = fake.add_node("", &[]);
        let child = fake.add_node("hello", &[("id", "c1")]);
        fake.set_scoped(root, "span.child", vec![child]);

        let found = fake.find_in(root, "span.child").await.unwrap().unwrap();
        assert_eq!(fake.text(found).await.unwrap(), "hello");
        assert_eq!(
            fake.attr(found, "id").await.unwrap(),
            Some("c1".to_string())
        );
        assert_eq!(fake.attr(found, "missing").await.unwrap(), None);
    }
}
