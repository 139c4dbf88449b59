//! Chrome over CDP, one process per session, addressed through [`PageDriver`].

use std::time::Duration;

use {
    async_trait::async_trait,
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig, Page,
        cdp::browser_protocol::{
            accessibility::{EnableParams, GetFullAxTreeParams},
            input::{
                DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
                DispatchMouseEventType, MouseButton,
            },
            page::{BringToFrontParams, CaptureScreenshotFormat, ReloadParams, Viewport},
        },
        handler::viewport::Viewport as LaunchViewport,
        page::ScreenshotParams,
    },
    futures::StreamExt,
    serde::{Deserialize, de::DeserializeOwned},
    serde_json::Value,
    tokio::{sync::Mutex, task::JoinHandle, time::Instant},
    tracing::{debug, info, warn},
    wayfarer_config::BrowserConfig,
};

use crate::{
    ax_tree,
    detect::require_browser,
    driver::{PageDriver, Record, Result},
    error::BrowserError,
    scripts,
    types::{
        AxNode, Capabilities, ElementSnapshot, ElementState, FieldSpec, LoadState, Locator,
        ScreenshotTarget, ScrollEdge, TabInfo, TypeOptions, is_domain_allowed, validate_url,
    },
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Quiet period treated as "network idle" once the document has loaded.
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);

struct Tabs {
    pages: Vec<Page>,
    active: usize,
}

impl Tabs {
    fn get(&self, index: usize) -> Result<&Page> {
        self.pages.get(index).ok_or(BrowserError::TabNotFound(index))
    }
}

#[derive(Debug, Deserialize)]
struct Probe {
    found: bool,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

#[derive(Debug, Deserialize)]
struct SelectorState {
    attached: bool,
    visible: bool,
}

#[derive(Debug, Deserialize)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// A launched browser and its tabs.
///
/// Created once per run and shared by `Arc`; dropping it without
/// [`BrowserSession::close`] leaves Chrome to exit with the handler task.
pub struct BrowserSession {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    tabs: Mutex<Tabs>,
    capabilities: Capabilities,
    allowed_domains: Vec<String>,
}

impl BrowserSession {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let executable = require_browser(config.chrome_path.as_deref())?;

        let mut builder = CdpBrowserConfig::builder()
            .chrome_executable(&executable)
            .viewport(LaunchViewport {
                width: config.viewport_width,
                height: config.viewport_height,
                device_scale_factor: Some(config.device_scale_factor),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .request_timeout(Duration::from_millis(config.navigation_timeout_ms))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run");

        // chromiumoxide defaults to headless
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref ua) = config.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let cdp_config = builder.build().map_err(|e| {
            BrowserError::LaunchFailed(format!("failed to build browser config: {e}"))
        })?;

        info!(
            executable = %executable.display(),
            headless = config.headless,
            viewport_width = config.viewport_width,
            viewport_height = config.viewport_height,
            "launching browser"
        );

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
            debug!("browser event handler exited");
        });

        let page = browser.new_page("about:blank").await?;
        let accessibility_tree = match page.execute(EnableParams::default()).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "accessibility domain unavailable, inspection will use selectors");
                false
            },
        };

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            tabs: Mutex::new(Tabs {
                pages: vec![page],
                active: 0,
            }),
            capabilities: Capabilities { accessibility_tree },
            allowed_domains: config.allowed_domains.clone(),
        })
    }

    /// Close every tab and shut Chrome down.
    pub async fn close(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        self.handler.abort();
        info!("browser closed");
    }

    async fn page(&self) -> Page {
        let tabs = self.tabs.lock().await;
        tabs.pages[tabs.active].clone()
    }

    fn check_url(&self, url: &str) -> Result<()> {
        validate_url(url)?;
        if !is_domain_allowed(url, &self.allowed_domains) {
            return Err(BrowserError::NavigationFailed(format!(
                "{url}: domain is not in the allow-list"
            )));
        }
        Ok(())
    }

    async fn eval_value(&self, js: &str) -> Result<Value> {
        let result = self
            .page()
            .await
            .evaluate(js)
            .await
            .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn eval<T: DeserializeOwned>(&self, js: &str) -> Result<T> {
        serde_json::from_value(self.eval_value(js).await?)
            .map_err(|e| BrowserError::JsEvalFailed(format!("unexpected script result: {e}")))
    }

    /// Poll until the locator resolves to a visible element.
    async fn await_element(&self, locator: &Locator, timeout: Duration) -> Result<Probe> {
        let deadline = Instant::now() + timeout;
        let script = scripts::probe(locator);
        loop {
            let probe: Probe = self.eval(&script).await?;
            if probe.found && probe.visible && !probe.disabled {
                return Ok(probe);
            }
            if Instant::now() >= deadline {
                let what = match (probe.found, probe.visible) {
                    (false, _) => "to appear",
                    (true, false) => "to become visible",
                    (true, true) => "to become enabled",
                };
                return Err(BrowserError::Timeout(format!(
                    "{}ms waiting for {locator} {what}",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn send_key(page: &Page, key: &str, text: Option<&str>, vk: i64) -> Result<()> {
        for (kind, down) in [
            (DispatchKeyEventType::KeyDown, true),
            (DispatchKeyEventType::KeyUp, false),
        ] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key)
                .code(key)
                .windows_virtual_key_code(vk);
            if let Some(t) = text.filter(|_| down) {
                builder = builder.text(t);
            }
            let cmd = builder.build().map_err(BrowserError::Cdp)?;
            page.execute(cmd).await?;
        }
        Ok(())
    }
}

/// Wrap a future with a deadline that surfaces as [`BrowserError::Timeout`].
async fn within<T>(
    timeout: Duration,
    what: impl std::fmt::Display,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        BrowserError::Timeout(format!("{what} exceeded {}ms", timeout.as_millis()))
    })?
}

fn navigation_error(err: chromiumoxide::error::CdpError) -> BrowserError {
    match BrowserError::from(err) {
        BrowserError::Cdp(msg) => BrowserError::NavigationFailed(msg),
        other => other,
    }
}

fn key_code(key: &str) -> (&str, Option<&str>, i64) {
    match key {
        "Enter" => ("Enter", Some("\r"), 13),
        "Tab" => ("Tab", None, 9),
        "Escape" => ("Escape", None, 27),
        "Backspace" => ("Backspace", None, 8),
        "ArrowDown" => ("ArrowDown", None, 40),
        "ArrowUp" => ("ArrowUp", None, 38),
        other => (other, None, 0),
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        self.check_url(url)?;
        let page = self.page().await;
        within(timeout, format!("navigation to {url}"), async {
            page.goto(url).await.map_err(navigation_error)?;
            page.wait_for_navigation().await.map_err(navigation_error)?;
            Ok(())
        })
        .await?;
        debug!(url, "navigated");
        Ok(())
    }

    async fn reload(&self, timeout: Duration) -> Result<()> {
        let page = self.page().await;
        within(timeout, "reload", async {
            page.execute(ReloadParams::default())
                .await
                .map_err(navigation_error)?;
            page.wait_for_navigation().await.map_err(navigation_error)?;
            Ok(())
        })
        .await
    }

    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let ready: String = self.eval(scripts::READY_STATE).await?;
            let reached = match state {
                LoadState::DomContentLoaded => ready == "interactive" || ready == "complete",
                LoadState::Load | LoadState::NetworkIdle => ready == "complete",
            };
            if reached {
                if state == LoadState::NetworkIdle {
                    tokio::time::sleep(NETWORK_IDLE_GRACE).await;
                }
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "{}ms waiting for load state {state:?} (document is `{ready}`)",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page().await.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.page().await.get_title().await?.unwrap_or_default())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let script = scripts::selector_state(selector);
        loop {
            let s: SelectorState = self.eval(&script).await?;
            let reached = match state {
                ElementState::Visible => s.visible,
                ElementState::Hidden => !s.visible,
                ElementState::Attached => s.attached,
                ElementState::Detached => !s.attached,
            };
            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "{}ms waiting for `{selector}` to be {state}",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let probe = self.await_element(locator, timeout).await?;
        let page = self.page().await;

        for kind in [
            DispatchMouseEventType::MousePressed,
            DispatchMouseEventType::MouseReleased,
        ] {
            let cmd = DispatchMouseEventParams::builder()
                .r#type(kind)
                .x(probe.x)
                .y(probe.y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(BrowserError::Cdp)?;
            page.execute(cmd).await?;
        }

        debug!(%locator, x = probe.x, y = probe.y, "clicked");
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str, opts: &TypeOptions) -> Result<()> {
        self.await_element(locator, opts.timeout).await?;
        let focused: bool = self.eval(&scripts::focus(locator, opts.clear_first)).await?;
        if !focused {
            return Err(BrowserError::ElementNotFound(locator.to_string()));
        }

        let page = self.page().await;
        for c in text.chars() {
            for (kind, down) in [
                (DispatchKeyEventType::KeyDown, true),
                (DispatchKeyEventType::KeyUp, false),
            ] {
                let mut builder = DispatchKeyEventParams::builder().r#type(kind);
                if down {
                    builder = builder.text(c.to_string());
                }
                let cmd = builder.build().map_err(BrowserError::Cdp)?;
                page.execute(cmd).await?;
            }
            if !opts.delay.is_zero() {
                tokio::time::sleep(opts.delay).await;
            }
        }

        debug!(%locator, chars = text.chars().count(), "typed text");
        Ok(())
    }

    async fn press_key(&self, locator: &Locator, key: &str) -> Result<()> {
        let focused: bool = self.eval(&scripts::focus(locator, false)).await?;
        if !focused {
            return Err(BrowserError::ElementNotFound(locator.to_string()));
        }
        let (name, text, vk) = key_code(key);
        Self::send_key(&self.page().await, name, text, vk).await
    }

    async fn scroll_into_view(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let script = scripts::scroll_into_view(locator);
        loop {
            if self.eval::<bool>(&script).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "{}ms waiting for {locator} to scroll into view",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn scroll_by(&self, dx: i64, dy: i64, smooth: bool) -> Result<()> {
        self.eval::<bool>(&scripts::scroll_by(dx, dy, smooth))
            .await
            .map(|_| ())
    }

    async fn scroll_to(&self, edge: ScrollEdge, smooth: bool) -> Result<()> {
        self.eval::<bool>(&scripts::scroll_to(edge, smooth))
            .await
            .map(|_| ())
    }

    async fn query_all(&self, selector: &str, limit: usize) -> Result<Vec<ElementSnapshot>> {
        self.eval(&scripts::query_all(selector, limit)).await
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.eval(&scripts::count(selector)).await
    }

    async fn query_fields(
        &self,
        container: &str,
        fields: &[FieldSpec],
        limit: usize,
    ) -> Result<Vec<Record>> {
        self.eval(&scripts::query_fields(container, fields, limit))
            .await
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.eval_value(script).await
    }

    async fn screenshot(&self, target: &ScreenshotTarget) -> Result<Vec<u8>> {
        let builder = ScreenshotParams::builder().format(CaptureScreenshotFormat::Png);
        let params = match target {
            ScreenshotTarget::Viewport => builder.full_page(false).build(),
            ScreenshotTarget::FullPage => builder.full_page(true).build(),
            ScreenshotTarget::Element(selector) => {
                let rect: Option<Rect> = self.eval(&scripts::element_rect(selector)).await?;
                let rect = rect.ok_or_else(|| BrowserError::ElementNotFound(selector.clone()))?;
                builder
                    .clip(Viewport {
                        x: rect.x,
                        y: rect.y,
                        width: rect.width,
                        height: rect.height,
                        scale: 1.0,
                    })
                    .capture_beyond_viewport(true)
                    .build()
            },
        };

        self.page()
            .await
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn accessibility_tree(&self) -> Result<AxNode> {
        if !self.capabilities.accessibility_tree {
            return Err(BrowserError::Unsupported("accessibility tree".into()));
        }
        let response = self
            .page()
            .await
            .execute(GetFullAxTreeParams::default())
            .await?;
        let payload = serde_json::to_value(&response.result)
            .map_err(|e| BrowserError::Cdp(format!("accessibility tree: {e}")))?;
        ax_tree::from_cdp_nodes(&payload)
    }

    async fn new_tab(&self, url: Option<&str>) -> Result<usize> {
        if let Some(url) = url {
            self.check_url(url)?;
        }
        let page = self
            .browser
            .lock()
            .await
            .new_page(url.unwrap_or("about:blank"))
            .await?;
        let mut tabs = self.tabs.lock().await;
        tabs.pages.push(page);
        let index = tabs.pages.len() - 1;
        debug!(index, url, "opened tab");
        Ok(index)
    }

    async fn close_tab(&self, index: usize) -> Result<()> {
        let mut tabs = self.tabs.lock().await;
        tabs.get(index)?;
        if tabs.pages.len() == 1 {
            return Err(BrowserError::LastTab);
        }
        let page = tabs.pages.remove(index);
        if tabs.active > index || tabs.active == tabs.pages.len() {
            tabs.active -= 1;
        }
        let active = tabs.get(tabs.active)?.clone();
        drop(tabs);

        page.close().await?;
        active.execute(BringToFrontParams::default()).await?;
        debug!(index, "closed tab");
        Ok(())
    }

    async fn switch_tab(&self, index: usize) -> Result<()> {
        let mut tabs = self.tabs.lock().await;
        let page = tabs.get(index)?.clone();
        tabs.active = index;
        drop(tabs);

        page.execute(BringToFrontParams::default()).await?;
        debug!(index, "switched tab");
        Ok(())
    }

    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let (pages, active) = {
            let tabs = self.tabs.lock().await;
            (tabs.pages.clone(), tabs.active)
        };
        let mut out = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            out.push(TabInfo {
                index,
                url: page.url().await?.unwrap_or_default(),
                title: page.get_title().await?.unwrap_or_default(),
                active: index == active,
            });
        }
        Ok(out)
    }
}
