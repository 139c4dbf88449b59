//! Value types exchanged with a [`PageDriver`](crate::PageDriver).

use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

/// How an element is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// CSS selector.
    Css { selector: String },
    /// Smallest visible element whose text contains the needle.
    Text { text: String },
    /// ARIA role with an optional accessible-name filter.
    Role {
        role: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn role(role: impl Into<String>, name: Option<String>) -> Self {
        Self::Role {
            role: role.into(),
            name,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { selector } => write!(f, "css `{selector}`"),
            Self::Text { text } => write!(f, "text `{text}`"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role `{role}` named `{name}`"),
            Self::Role { role, name: None } => write!(f, "role `{role}`"),
        }
    }
}

/// Target state for [`PageDriver::wait_for_selector`](crate::PageDriver::wait_for_selector).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl ElementState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "visible" => Some(Self::Visible),
            "hidden" => Some(Self::Hidden),
            "attached" => Some(Self::Attached),
            "detached" => Some(Self::Detached),
            _ => None,
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Attached => "attached",
            Self::Detached => "detached",
        })
    }
}

/// Document readiness levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    DomContentLoaded,
    #[default]
    Load,
    NetworkIdle,
}

impl LoadState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "domcontentloaded" => Some(Self::DomContentLoaded),
            "load" => Some(Self::Load),
            "networkidle" => Some(Self::NetworkIdle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone)]
pub struct TypeOptions {
    /// Clear the field before typing.
    pub clear_first: bool,
    /// Pause between keystrokes.
    pub delay: Duration,
    /// Time allowed for the element to appear.
    pub timeout: Duration,
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            clear_first: true,
            delay: Duration::from_millis(30),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotTarget {
    Viewport,
    FullPage,
    Element(String),
}

/// One element returned by [`PageDriver::query_all`](crate::PageDriver::query_all).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Trimmed `innerText` (or `value` for form controls).
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// `href` of the element itself or of its first descendant link.
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl ElementSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_link(mut self, href: impl Into<String>) -> Self {
        self.link = Some(href.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// A named sub-selector used by [`PageDriver::query_fields`](crate::PageDriver::query_fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub selector: String,
    /// Attribute to read instead of the text content.
    #[serde(default)]
    pub attribute: Option<String>,
}

/// What the connected browser supports, probed once per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub accessibility_tree: bool,
}

/// Accessibility tree node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxNode {
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub children: Vec<AxNode>,
}

impl AxNode {
    pub fn new(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_children(mut self, children: Vec<AxNode>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabInfo {
    pub index: usize,
    pub url: String,
    pub title: String,
    pub active: bool,
}

/// Only http(s) URLs may be loaded.
pub fn validate_url(raw: &str) -> Result<url::Url, BrowserError> {
    let parsed = url::Url::parse(raw).map_err(|e| BrowserError::InvalidUrl(format!("{raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(BrowserError::InvalidUrl(format!(
            "{raw}: scheme `{other}` is not allowed"
        ))),
    }
}

/// Whether the URL's host matches the allow-list. An empty list allows everything.
///
/// `*.example.com` matches `example.com` and any subdomain of it.
pub fn is_domain_allowed(url: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }
    let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
    else {
        return false;
    };

    allowed_domains
        .iter()
        .any(|pattern| match pattern.strip_prefix("*.") {
            Some(base) => host == base || host.ends_with(&format!(".{base}")),
            None => host == *pattern,
        })
}
