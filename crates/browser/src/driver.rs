//! The browser-control seam.

use std::time::Duration;

use {async_trait::async_trait, serde_json::Value};

use crate::{
    error::BrowserError,
    types::{
        AxNode, Capabilities, ElementSnapshot, ElementState, FieldSpec, LoadState, Locator,
        ScreenshotTarget, ScrollEdge, TabInfo, TypeOptions,
    },
};

pub type Result<T> = std::result::Result<T, BrowserError>;

/// A field record produced by [`PageDriver::query_fields`].
pub type Record = serde_json::Map<String, Value>;

/// Operations on the active tab of one browser.
///
/// Callers drive a single page sequentially; implementations may assume no
/// two calls overlap on the same tab.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn reload(&self, timeout: Duration) -> Result<()>;

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Resolves once an element matching `selector` reaches `state`, or fails
    /// with [`BrowserError::Timeout`].
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()>;

    /// Waits for the element to become visible, then clicks its centre.
    async fn click(&self, locator: &Locator, timeout: Duration) -> Result<()>;

    async fn type_text(&self, locator: &Locator, text: &str, opts: &TypeOptions) -> Result<()>;

    /// Sends a single named key (e.g. `Enter`) to the element.
    async fn press_key(&self, locator: &Locator, key: &str) -> Result<()>;

    async fn scroll_into_view(&self, locator: &Locator, timeout: Duration) -> Result<()>;

    async fn scroll_by(&self, dx: i64, dy: i64, smooth: bool) -> Result<()>;

    async fn scroll_to(&self, edge: ScrollEdge, smooth: bool) -> Result<()>;

    /// Up to `limit` elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str, limit: usize) -> Result<Vec<ElementSnapshot>>;

    async fn count(&self, selector: &str) -> Result<usize>;

    /// One record per `container` match, each field read from the first
    /// element matching its sub-selector inside that container.
    async fn query_fields(
        &self,
        container: &str,
        fields: &[FieldSpec],
        limit: usize,
    ) -> Result<Vec<Record>>;

    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// PNG bytes.
    async fn screenshot(&self, target: &ScreenshotTarget) -> Result<Vec<u8>>;

    fn capabilities(&self) -> Capabilities;

    /// Fails with [`BrowserError::Unsupported`] when the capability is absent.
    async fn accessibility_tree(&self) -> Result<AxNode>;

    /// Opens a tab and returns its index. The active tab does not change.
    async fn new_tab(&self, url: Option<&str>) -> Result<usize>;

    async fn close_tab(&self, index: usize) -> Result<()>;

    async fn switch_tab(&self, index: usize) -> Result<()>;

    async fn list_tabs(&self) -> Result<Vec<TabInfo>>;
}
