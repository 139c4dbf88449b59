//! Browser actions and the registry that dispatches them by name.
//!
//! Every action takes a JSON parameter map and returns an [`ActionResult`].
//! Failures are returned as data with an [`ErrorKind`] so callers can tell
//! a bad plan from a flaky page.

pub mod action;
pub mod click;
pub mod error;
pub mod extract;
pub mod inspect;
pub mod navigate;
pub mod pattern_loop;
pub mod registry;
pub mod reload;
pub mod result;
pub mod screenshot;
pub mod scroll;
pub mod tab;
pub mod type_text;
pub mod wait;

pub use {
    action::{Action, ActionContext},
    error::{ActionError, ErrorKind},
    inspect::suggestion_selector,
    pattern_loop::{LoopConfig, LoopTermination},
    registry::ActionRegistry,
    result::{ActionResult, Params, Task},
};
