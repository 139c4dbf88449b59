//! Scripted in-memory [`PageDriver`] for tests.
//!
//! A [`MockPage`] holds a set of [`MockDocument`]s addressed by URL. Clicking a
//! selector registered with [`MockDocument::with_link_to`] loads the target
//! document, which is how pagination is simulated. Missing elements fail the
//! way a real page does: with a [`BrowserError::Timeout`].

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use {async_trait::async_trait, serde_json::Value};

use crate::{
    driver::{PageDriver, Record, Result},
    error::BrowserError,
    types::{
        AxNode, Capabilities, ElementSnapshot, ElementState, FieldSpec, LoadState, Locator,
        ScreenshotTarget, ScrollEdge, TabInfo, TypeOptions, validate_url,
    },
};

/// PNG signature, enough for callers that only write the bytes out.
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// One page of content.
#[derive(Debug, Clone, Default)]
pub struct MockDocument {
    pub url: String,
    pub title: String,
    elements: BTreeMap<String, Vec<ElementSnapshot>>,
    records: BTreeMap<String, Vec<Record>>,
    links: BTreeMap<String, String>,
    scroll_batches: VecDeque<(String, Vec<ElementSnapshot>)>,
}

impl MockDocument {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Elements returned for an exact selector string.
    pub fn with_elements(mut self, selector: impl Into<String>, elements: Vec<ElementSnapshot>) -> Self {
        self.elements.insert(selector.into(), elements);
        self
    }

    /// Field records returned by `query_fields` for a container selector.
    pub fn with_records(mut self, container: impl Into<String>, records: Vec<Record>) -> Self {
        self.records.insert(container.into(), records);
        self
    }

    /// Clicking `selector` loads the document at `url`. Adds a visible element
    /// for the selector when none is registered.
    pub fn with_link_to(mut self, selector: impl Into<String>, url: impl Into<String>) -> Self {
        let selector = selector.into();
        self.elements
            .entry(selector.clone())
            .or_insert_with(|| vec![ElementSnapshot::new("Next")]);
        self.links.insert(selector, url.into());
        self
    }

    /// Each scroll to the bottom appends the next batch to `selector`.
    pub fn with_scroll_batch(mut self, selector: impl Into<String>, batch: Vec<ElementSnapshot>) -> Self {
        self.scroll_batches.push_back((selector.into(), batch));
        self
    }

    fn resolve(&self, locator: &Locator) -> Option<(&str, &ElementSnapshot)> {
        let all = || {
            self.elements
                .iter()
                .flat_map(|(sel, els)| els.iter().map(move |el| (sel.as_str(), el)))
        };
        match locator {
            Locator::Css { selector } => self
                .elements
                .get_key_value(selector)
                .and_then(|(sel, els)| els.first().map(|el| (sel.as_str(), el))),
            Locator::Text { text } => {
                let needle = text.to_lowercase();
                all()
                    .filter(|(_, el)| el.visible && el.text.to_lowercase().contains(&needle))
                    .min_by_key(|(_, el)| el.text.len())
            },
            Locator::Role { role, name } => all().find(|(_, el)| {
                let role_matches = el
                    .attributes
                    .get("role")
                    .is_some_and(|r| r.eq_ignore_ascii_case(role));
                let name_matches = name.as_ref().is_none_or(|n| {
                    let n = n.to_lowercase();
                    el.text.to_lowercase().contains(&n)
                        || el
                            .attributes
                            .get("aria-label")
                            .is_some_and(|l| l.to_lowercase().contains(&n))
                });
                role_matches && name_matches
            }),
        }
    }
}

struct MockState {
    documents: Vec<MockDocument>,
    /// Document index shown by each tab.
    tabs: Vec<usize>,
    active: usize,
    calls: Vec<String>,
    failures: HashMap<String, VecDeque<BrowserError>>,
    eval_results: VecDeque<Value>,
}

impl MockState {
    fn doc(&self) -> &MockDocument {
        &self.documents[self.tabs[self.active]]
    }

    fn doc_mut(&mut self) -> &mut MockDocument {
        let index = self.tabs[self.active];
        &mut self.documents[index]
    }

    fn doc_index(&mut self, url: &str) -> usize {
        match self.documents.iter().position(|d| d.url == url) {
            Some(i) => i,
            None => {
                self.documents.push(MockDocument::new(url));
                self.documents.len() - 1
            },
        }
    }

    /// Records the call and pops a scripted failure for `op`, if any.
    fn enter(&mut self, op: &str, detail: impl std::fmt::Display) -> Result<()> {
        self.calls.push(format!("{op} {detail}").trim_end().to_string());
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn check_tab(&self, index: usize) -> Result<()> {
        if index < self.tabs.len() {
            Ok(())
        } else {
            Err(BrowserError::TabNotFound(index))
        }
    }
}

/// Scripted page driver.
pub struct MockPage {
    state: Mutex<MockState>,
    ax_tree: Option<AxNode>,
}

impl MockPage {
    /// The first document is loaded in the only tab. Later documents are
    /// reachable by URL or through links.
    pub fn new(documents: Vec<MockDocument>) -> Self {
        let documents = if documents.is_empty() {
            vec![MockDocument::new("about:blank")]
        } else {
            documents
        };
        Self {
            state: Mutex::new(MockState {
                documents,
                tabs: vec![0],
                active: 0,
                calls: Vec::new(),
                failures: HashMap::new(),
                eval_results: VecDeque::new(),
            }),
            ax_tree: None,
        }
    }

    pub fn blank() -> Self {
        Self::new(Vec::new())
    }

    /// Enables the accessibility-tree capability.
    pub fn with_accessibility_tree(mut self, root: AxNode) -> Self {
        self.ax_tree = Some(root);
        self
    }

    /// The next call to `op` (the trait method name) fails with `err`.
    /// Queued failures are consumed in order.
    pub fn fail_next(&self, op: &str, err: BrowserError) {
        self.lock()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    /// Value returned by the next `evaluate` call.
    pub fn push_eval_result(&self, value: Value) {
        self.lock().eval_results.push_back(value);
    }

    /// Every call made so far, as `"<op> <detail>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls to `op`.
    pub fn call_count(&self, op: &str) -> usize {
        let prefix = format!("{op} ");
        self.lock()
            .calls
            .iter()
            .filter(|c| *c == op || c.starts_with(&prefix))
            .count()
    }

    pub fn active_url(&self) -> String {
        self.lock().doc().url.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn missing(locator: &Locator, timeout: Duration) -> BrowserError {
    BrowserError::Timeout(format!(
        "{}ms waiting for {locator} to appear",
        timeout.as_millis()
    ))
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.enter("goto", url)?;
        validate_url(url)?;
        let index = state.doc_index(url);
        let active = state.active;
        state.tabs[active] = index;
        Ok(())
    }

    async fn reload(&self, timeout: Duration) -> Result<()> {
        self.lock()
            .enter("reload", format_args!("{}ms", timeout.as_millis()))
    }

    async fn wait_for_load(&self, state: LoadState, _timeout: Duration) -> Result<()> {
        self.lock().enter("wait_for_load", format_args!("{state:?}"))
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.lock().doc().url.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.lock().doc().title.clone())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        element_state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        let mut state = self.lock();
        state.enter("wait_for_selector", selector)?;
        let els = state.doc().elements.get(selector);
        let attached = els.is_some_and(|e| !e.is_empty());
        let visible = els.is_some_and(|e| e.iter().any(|el| el.visible));
        let reached = match element_state {
            ElementState::Visible => visible,
            ElementState::Hidden => !visible,
            ElementState::Attached => attached,
            ElementState::Detached => !attached,
        };
        if reached {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!(
                "{}ms waiting for `{selector}` to be {element_state}",
                timeout.as_millis()
            )))
        }
    }

    async fn click(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.enter("click", locator)?;
        let (selector, el) = state
            .doc()
            .resolve(locator)
            .ok_or_else(|| missing(locator, timeout))?;
        if el.disabled || !el.visible {
            return Err(BrowserError::Timeout(format!(
                "{}ms waiting for {locator} to become clickable",
                timeout.as_millis()
            )));
        }
        if let Some(target) = state.doc().links.get(selector).cloned() {
            let index = state.doc_index(&target);
            let active = state.active;
            state.tabs[active] = index;
        }
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str, opts: &TypeOptions) -> Result<()> {
        let mut state = self.lock();
        state.enter("type_text", format_args!("{locator} {text}"))?;
        state
            .doc()
            .resolve(locator)
            .map(|_| ())
            .ok_or_else(|| missing(locator, opts.timeout))
    }

    async fn press_key(&self, locator: &Locator, key: &str) -> Result<()> {
        let mut state = self.lock();
        state.enter("press_key", format_args!("{locator} {key}"))?;
        state
            .doc()
            .resolve(locator)
            .map(|_| ())
            .ok_or_else(|| BrowserError::ElementNotFound(locator.to_string()))
    }

    async fn scroll_into_view(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.enter("scroll_into_view", locator)?;
        state
            .doc()
            .resolve(locator)
            .map(|_| ())
            .ok_or_else(|| missing(locator, timeout))
    }

    async fn scroll_by(&self, dx: i64, dy: i64, _smooth: bool) -> Result<()> {
        self.lock().enter("scroll_by", format_args!("{dx} {dy}"))
    }

    async fn scroll_to(&self, edge: ScrollEdge, _smooth: bool) -> Result<()> {
        let mut state = self.lock();
        state.enter("scroll_to", format_args!("{edge:?}"))?;
        if edge == ScrollEdge::Bottom {
            let doc = state.doc_mut();
            if let Some((selector, batch)) = doc.scroll_batches.pop_front() {
                doc.elements.entry(selector).or_default().extend(batch);
            }
        }
        Ok(())
    }

    async fn query_all(&self, selector: &str, limit: usize) -> Result<Vec<ElementSnapshot>> {
        let mut state = self.lock();
        state.enter("query_all", selector)?;
        Ok(state
            .doc()
            .elements
            .get(selector)
            .map(|els| els.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let mut state = self.lock();
        state.enter("count", selector)?;
        Ok(state.doc().elements.get(selector).map_or(0, Vec::len))
    }

    async fn query_fields(
        &self,
        container: &str,
        fields: &[FieldSpec],
        limit: usize,
    ) -> Result<Vec<Record>> {
        let mut state = self.lock();
        state.enter("query_fields", container)?;
        let Some(records) = state.doc().records.get(container) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .take(limit)
            .map(|record| {
                fields
                    .iter()
                    .map(|f| {
                        let value = record.get(&f.name).cloned().unwrap_or(Value::Null);
                        (f.name.clone(), value)
                    })
                    .collect()
            })
            .collect())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let mut state = self.lock();
        state.enter("evaluate", script)?;
        Ok(state.eval_results.pop_front().unwrap_or(Value::Null))
    }

    async fn screenshot(&self, target: &ScreenshotTarget) -> Result<Vec<u8>> {
        let mut state = self.lock();
        state.enter("screenshot", format_args!("{target:?}"))?;
        if let ScreenshotTarget::Element(selector) = target
            && !state.doc().elements.contains_key(selector)
        {
            return Err(BrowserError::ElementNotFound(selector.clone()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            accessibility_tree: self.ax_tree.is_some(),
        }
    }

    async fn accessibility_tree(&self) -> Result<AxNode> {
        self.lock().enter("accessibility_tree", "")?;
        self.ax_tree
            .clone()
            .ok_or_else(|| BrowserError::Unsupported("accessibility tree".into()))
    }

    async fn new_tab(&self, url: Option<&str>) -> Result<usize> {
        let mut state = self.lock();
        state.enter("new_tab", url.unwrap_or_default())?;
        if let Some(url) = url {
            validate_url(url)?;
        }
        let index = state.doc_index(url.unwrap_or("about:blank"));
        state.tabs.push(index);
        Ok(state.tabs.len() - 1)
    }

    async fn close_tab(&self, index: usize) -> Result<()> {
        let mut state = self.lock();
        state.enter("close_tab", index)?;
        state.check_tab(index)?;
        if state.tabs.len() == 1 {
            return Err(BrowserError::LastTab);
        }
        state.tabs.remove(index);
        if state.active > index || state.active == state.tabs.len() {
            state.active -= 1;
        }
        Ok(())
    }

    async fn switch_tab(&self, index: usize) -> Result<()> {
        let mut state = self.lock();
        state.enter("switch_tab", index)?;
        state.check_tab(index)?;
        state.active = index;
        Ok(())
    }

    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let mut state = self.lock();
        state.enter("list_tabs", "")?;
        Ok(state
            .tabs
            .iter()
            .enumerate()
            .map(|(index, &doc)| TabInfo {
                index,
                url: state.documents[doc].url.clone(),
                title: state.documents[doc].title.clone(),
                active: index == state.active,
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(500);

    fn shop() -> MockPage {
        MockPage::new(vec![
            MockDocument::new("https://shop.test/?page=1")
                .with_title("Page 1")
                .with_elements(".item", vec![ElementSnapshot::new("A"), ElementSnapshot::new("B")])
                .with_link_to("a.next", "https://shop.test/?page=2"),
            MockDocument::new("https://shop.test/?page=2")
                .with_title("Page 2")
                .with_elements(".item", vec![ElementSnapshot::new("C")]),
        ])
    }

    #[tokio::test]
    async fn clicking_a_link_loads_the_target_document() {
        let page = shop();
        page.click(&Locator::css("a.next"), WAIT).await.unwrap();
        assert_eq!(page.current_url().await.unwrap(), "https://shop.test/?page=2");
        assert_eq!(page.count(".item").await.unwrap(), 1);

        let err = page.click(&Locator::css("a.next"), WAIT).await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn text_and_role_locators_resolve() {
        let page = MockPage::new(vec![
            MockDocument::new("https://a.test/")
                .with_elements(
                    "button",
                    vec![ElementSnapshot::new("Search").with_attr("role", "button")],
                )
                .with_elements("p", vec![ElementSnapshot::new("Search results for rust")]),
        ]);
        page.click(&Locator::text("search"), WAIT).await.unwrap();
        page.click(&Locator::role("button", Some("sear".into())), WAIT)
            .await
            .unwrap();
        assert!(
            page.click(&Locator::role("link", None), WAIT)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let page = shop();
        page.fail_next("reload", BrowserError::Timeout("first".into()));
        assert!(page.reload(WAIT).await.is_err());
        assert!(page.reload(WAIT).await.is_ok());
        assert_eq!(page.call_count("reload"), 2);
    }

    #[tokio::test]
    async fn tabs_track_active_index() {
        let page = shop();
        let idx = page.new_tab(Some("https://shop.test/?page=2")).await.unwrap();
        assert_eq!(idx, 1);
        assert_eq!(page.active_url(), "https://shop.test/?page=1");

        page.switch_tab(1).await.unwrap();
        assert_eq!(page.title().await.unwrap(), "Page 2");

        page.close_tab(1).await.unwrap();
        assert_eq!(page.active_url(), "https://shop.test/?page=1");
        assert!(matches!(page.close_tab(0).await, Err(BrowserError::LastTab)));
        assert!(matches!(
            page.switch_tab(4).await,
            Err(BrowserError::TabNotFound(4))
        ));
    }

    #[tokio::test]
    async fn scroll_to_bottom_appends_batches() {
        let page = MockPage::new(vec![
            MockDocument::new("https://feed.test/")
                .with_elements(".post", vec![ElementSnapshot::new("p1")])
                .with_scroll_batch(".post", vec![ElementSnapshot::new("p2")]),
        ]);
        page.scroll_to(ScrollEdge::Bottom, false).await.unwrap();
        page.scroll_to(ScrollEdge::Bottom, false).await.unwrap();
        assert_eq!(page.count(".post").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn accessibility_tree_requires_capability() {
        let page = MockPage::blank();
        assert!(!page.capabilities().accessibility_tree);
        assert!(matches!(
            page.accessibility_tree().await,
            Err(BrowserError::Unsupported(_))
        ));
    }
}
