//! `wayfarer sessions`: inspect recorded sessions.

use {
    anyhow::Result,
    clap::Subcommand,
    wayfarer_config::WayfarerConfig,
    wayfarer_sessions::{ReplayError, SessionStore},
};

#[derive(Subcommand, Default)]
pub enum SessionAction {
    /// List recorded sessions, newest first.
    #[default]
    List,
    /// Print one session as JSON.
    Show { session_id: String },
}

pub async fn handle_sessions(config: &WayfarerConfig, action: SessionAction) -> Result<()> {
    let store = SessionStore::new(&config.paths.sessions_dir);
    match action {
        SessionAction::List => {
            let sessions = store.list().await?;
            if sessions.is_empty() {
                println!("No sessions recorded in {}.", store.base_dir().display());
                return Ok(());
            }
            for s in &sessions {
                let status = if s.success { "ok" } else { "failed" };
                println!(
                    "{}  {}  {:>6}  {:>3} actions  {}",
                    s.session_id,
                    s.start_time.format("%Y-%m-%d %H:%M:%S"),
                    status,
                    s.action_count,
                    s.goal
                );
            }
        },
        SessionAction::Show { session_id } => {
            let session = store.load(&session_id).await.map_err(ReplayError::from)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        },
    }
    Ok(())
}
