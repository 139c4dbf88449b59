//! Browser control over CDP.
//!
//! Everything above this crate talks to a page through the [`PageDriver`]
//! trait. [`BrowserSession`] implements it on top of a chromiumoxide-managed
//! Chrome; with the `test-support` feature, [`mock::MockPage`] implements it
//! in memory.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use wayfarer_browser::{BrowserSession, Locator, PageDriver};
//!
//! let session = BrowserSession::launch(&config.browser).await?;
//! session.goto("https://example.com", Duration::from_secs(30)).await?;
//! session.click(&Locator::text("More information"), Duration::from_secs(10)).await?;
//! session.close().await;
//! ```

pub mod ax_tree;
pub mod detect;
pub mod driver;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod scripts;
pub mod session;
pub mod types;

pub use {
    ax_tree::InteractiveElement,
    driver::{PageDriver, Record},
    error::BrowserError,
    session::BrowserSession,
    types::{
        AxNode, Capabilities, ElementSnapshot, ElementState, FieldSpec, LoadState, Locator,
        ScreenshotTarget, ScrollEdge, TabInfo, TypeOptions,
    },
};
