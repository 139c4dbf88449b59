use std::path::PathBuf;

use {
    chrono::{DateTime, Utc},
    uuid::Uuid,
    wayfarer_actions::{ActionResult, Params},
};

use crate::{
    error::Result,
    model::{LogEntry, Session, SessionSummary},
    store::SessionStore,
};

struct OpenSession {
    id: Uuid,
    goal: String,
    start_time: DateTime<Utc>,
    actions: Vec<LogEntry>,
}

/// A session that has been sealed and written.
#[derive(Debug, Clone)]
pub struct SavedSession {
    pub session: Session,
    pub path: PathBuf,
}

/// Records the actions of one run at a time.
///
/// Entries are only ever appended. `end_session` seals the buffer, writes it
/// through the [`SessionStore`] and leaves the recorder ready for the next run.
pub struct SessionRecorder {
    store: SessionStore,
    current: Option<OpenSession>,
}

impl SessionRecorder {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            current: None,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Opens a new session, discarding any session still open.
    pub fn start_session(&mut self, goal: &str) -> Uuid {
        if let Some(previous) = self.current.take() {
            tracing::warn!(
                session_id = %previous.id,
                actions = previous.actions.len(),
                "discarding unsealed session"
            );
        }
        let id = Uuid::new_v4();
        tracing::info!(session_id = %id, %goal, "session started");
        self.current = Some(OpenSession {
            id,
            goal: goal.to_string(),
            start_time: Utc::now(),
            actions: Vec::new(),
        });
        id
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.current.as_ref().map(|s| s.id)
    }

    pub fn is_recording(&self) -> bool {
        self.current.is_some()
    }

    /// Number of entries in the open session.
    pub fn action_count(&self) -> usize {
        self.current.as_ref().map_or(0, |s| s.actions.len())
    }

    /// Appends one entry. Ignored when no session is open.
    pub fn log_action(&mut self, action: &str, params: &Params, result: &ActionResult) {
        let Some(session) = self.current.as_mut() else {
            tracing::warn!(%action, "no open session, action not recorded");
            return;
        };
        session.actions.push(LogEntry::new(action, params, result));
    }

    /// Seals and persists the open session. `Ok(None)` when nothing is open.
    pub async fn end_session(
        &mut self,
        success: bool,
        error: Option<String>,
    ) -> Result<Option<SavedSession>> {
        let Some(open) = self.current.take() else {
            return Ok(None);
        };
        let end_time = Utc::now();
        let duration = end_time - open.start_time;
        let session = Session {
            session_id: open.id,
            goal: open.goal,
            start_time: open.start_time,
            end_time,
            duration_seconds: duration.num_milliseconds() as f64 / 1000.0,
            success,
            error,
            action_count: open.actions.len(),
            actions: open.actions,
        };
        let path = self.store.save(&session).await?;
        tracing::info!(
            session_id = %session.session_id,
            success,
            actions = session.action_count,
            path = %path.display(),
            "session saved"
        );
        Ok(Some(SavedSession { session, path }))
    }

    pub async fn get_log(&self, session_id: &str) -> Result<Session> {
        self.store.load(session_id).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.store.list().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde_json::json, wayfarer_actions::ActionError};

    fn recorder() -> (SessionRecorder, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (SessionRecorder::new(SessionStore::new(dir.path())), dir)
    }

    fn params(v: serde_json::Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn written_session_reads_back_field_for_field() {
        let (mut recorder, _dir) = recorder();
        let id = recorder.start_session("collect titles");

        let nav = params(json!({"url": "https://news.test/"}));
        recorder.log_action(
            "navigate",
            &nav,
            &ActionResult::ok("navigate").with_data(json!({"url": "https://news.test/"})),
        );
        let ext = params(json!({"selector": ".title", "multiple": true}));
        recorder.log_action(
            "extract",
            &ext,
            &ActionResult::failed("extract", &ActionError::Timeout("timeout: 5000ms".into())),
        );
        assert_eq!(recorder.action_count(), 2);

        let saved = recorder
            .end_session(false, Some("extract failed".into()))
            .await
            .unwrap()
            .expect("session was open");
        assert!(!recorder.is_recording());
        assert_eq!(saved.session.session_id, id);
        assert_eq!(saved.session.action_count, 2);

        let read = recorder.get_log(&id.to_string()).await.unwrap();
        assert_eq!(read.action_count, saved.session.action_count);
        assert_eq!(read.actions, saved.session.actions);
        assert_eq!(read.actions[0].params, nav);
        assert_eq!(read.actions[1].error.as_deref(), Some("timeout: 5000ms"));
        assert!(!read.actions[1].success);
        assert_eq!(read.error.as_deref(), Some("extract failed"));
        assert!(read.duration_seconds >= 0.0);
    }

    #[tokio::test]
    async fn logging_without_a_session_is_ignored() {
        let (mut recorder, _dir) = recorder();
        recorder.log_action("click", &Params::new(), &ActionResult::ok("click"));
        assert_eq!(recorder.action_count(), 0);
        assert!(recorder.end_session(true, None).await.unwrap().is_none());
        assert!(recorder.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let (mut recorder, _dir) = recorder();
        let first = recorder.start_session("one");
        recorder.log_action("wait", &Params::new(), &ActionResult::ok("wait"));
        recorder.end_session(true, None).await.unwrap();

        let second = recorder.start_session("two");
        assert_ne!(first, second);
        assert_eq!(recorder.action_count(), 0);
        recorder.end_session(true, None).await.unwrap();

        assert_eq!(recorder.list_sessions().await.unwrap().len(), 2);
        assert_eq!(recorder.get_log(&second.to_string()).await.unwrap().action_count, 0);
    }

    #[tokio::test]
    async fn restarting_discards_the_open_buffer() {
        let (mut recorder, _dir) = recorder();
        recorder.start_session("abandoned");
        recorder.log_action("wait", &Params::new(), &ActionResult::ok("wait"));
        let id = recorder.start_session("fresh");
        assert_eq!(recorder.session_id(), Some(id));
        assert_eq!(recorder.action_count(), 0);
    }
}
