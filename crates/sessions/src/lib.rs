//! Session recording, storage and replay.
//!
//! Sessions are stored as one JSON file per run at
//! `<sessions_dir>/<session_id>.json` and never edited after they are written.

pub mod error;
pub mod model;
pub mod recorder;
pub mod replay;
pub mod store;

pub use {
    error::{ReplayError, SessionError},
    model::{LogEntry, Session, SessionSummary},
    recorder::{SavedSession, SessionRecorder},
    replay::{ReplayOptions, ReplayReport, Replayer},
    store::SessionStore,
};
