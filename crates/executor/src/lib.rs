//! Plan execution: task and whole-plan retries, selector repair, collected
//! data and the planner boundary.

pub mod error;
pub mod executor;
pub mod planner;
pub mod policy;
pub mod summary;

pub use {
    error::PlanError,
    executor::Executor,
    planner::{PlanFile, Planner},
    policy::{PlanOptions, RetryPolicy},
    summary::{CollectedItem, ExecutionSummary, FailedTask},
};
