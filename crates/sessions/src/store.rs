use std::{
    fs,
    path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::{
    error::{Result, SessionError},
    model::{Session, SessionSummary},
};

/// One pretty-printed JSON file per session, named `<session_id>.json`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    base_dir: PathBuf,
}

impl SessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_for(&self, id: &Uuid) -> PathBuf {
        self.base_dir.join(format!("{id}.json"))
    }

    /// Writes the session through a temp file and a rename, so readers never
    /// see a partial file.
    pub async fn save(&self, session: &Session) -> Result<PathBuf> {
        let path = self.path_for(&session.session_id);
        let tmp = self
            .base_dir
            .join(format!(".{}.json.tmp", session.session_id));
        let data = serde_json::to_vec_pretty(session)?;

        let written = path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&tmp, &data)?;
            fs::rename(&tmp, &path)?;
            Ok(())
        })
        .await??;

        tracing::debug!(path = %written.display(), "saved session");
        Ok(written)
    }

    /// Reads a session back. Ids that are not UUIDs are reported as not found.
    pub async fn load(&self, id: &str) -> Result<Session> {
        let uuid = Uuid::parse_str(id).map_err(|_| SessionError::NotFound(id.to_string()))?;
        let path = self.path_for(&uuid);
        let id = id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Session> {
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SessionError::NotFound(id));
                },
                Err(e) => return Err(e.into()),
            };
            Ok(serde_json::from_slice(&data)?)
        })
        .await?
    }

    /// Summaries of every readable session, newest first. Unreadable files are
    /// skipped with a warning.
    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let base = self.base_dir.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<SessionSummary>> {
            let entries = match fs::read_dir(&base) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            let mut sessions = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                let is_session = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".json") && !n.starts_with('.'));
                if !is_session {
                    continue;
                }
                let parsed = fs::read(&path)
                    .map_err(SessionError::from)
                    .and_then(|data| Ok(serde_json::from_slice::<Session>(&data)?));
                match parsed {
                    Ok(session) => sessions.push(SessionSummary::from(&session)),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session file");
                    },
                }
            }
            sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
            Ok(sessions)
        })
        .await?
    }
}
