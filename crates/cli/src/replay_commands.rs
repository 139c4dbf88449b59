//! `wayfarer replay`: re-drive a recorded session in a fresh browser.

use std::sync::Arc;

use {
    anyhow::{Result, bail},
    clap::Args,
    tracing::warn,
    wayfarer_actions::ActionRegistry,
    wayfarer_browser::BrowserSession,
    wayfarer_config::WayfarerConfig,
    wayfarer_sessions::{ReplayError, ReplayOptions, ReplayReport, Replayer, SessionStore},
};

#[derive(Args)]
pub struct ReplayArgs {
    /// Session id, as printed by `wayfarer sessions`.
    pub session_id: String,

    /// Replay speed multiplier. `0` removes the pause between actions.
    #[arg(long)]
    pub speed: Option<f64>,

    /// Keep replaying after an action fails.
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Print the report as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub async fn handle_replay(config: &WayfarerConfig, args: ReplayArgs) -> Result<()> {
    let options = replay_options(config, &args);
    let store = SessionStore::new(&config.paths.sessions_dir);
    // Fail on unknown ids before a browser is started.
    let session = store
        .load(&args.session_id)
        .await
        .map_err(ReplayError::from)?;

    let browser = Arc::new(BrowserSession::launch(&config.browser).await?);
    let registry = Arc::new(ActionRegistry::with_builtins(&config.paths.screenshots_dir));
    let replayer = Replayer::new(store, registry);

    let outcome = tokio::select! {
        report = replayer.replay_session(browser.as_ref(), &session, &options) => Some(report),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, abandoning replay");
            None
        },
    };
    browser.close().await;
    let Some(report) = outcome else {
        bail!("replay interrupted");
    };
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    if !report.success {
        bail!(
            "replay failed: {}/{} actions succeeded",
            report.successful_actions,
            report.total_actions
        );
    }
    Ok(())
}

fn replay_options(config: &WayfarerConfig, args: &ReplayArgs) -> ReplayOptions {
    let mut options = ReplayOptions::from(&config.replay);
    if let Some(speed) = args.speed {
        options.speed = speed;
    }
    if args.continue_on_error {
        options.stop_on_error = false;
    }
    options
}

fn print_report(report: &ReplayReport) {
    println!();
    println!("Session: {}", report.session_id);
    for (index, result) in report.results.iter().enumerate() {
        let status = if result.success { "ok" } else { "FAILED" };
        match &result.error {
            Some(error) => println!("  [{}] {} {status}: {error}", index + 1, result.action_name),
            None => println!("  [{}] {} {status}", index + 1, result.action_name),
        }
    }
    println!(
        "Replayed {}/{} actions successfully",
        report.successful_actions, report.total_actions
    );
}

#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    #[test]
    fn flags_override_replay_config() {
        let config = WayfarerConfig::default();
        let args = ReplayArgs {
            session_id: "id".into(),
            speed: Some(4.0),
            continue_on_error: true,
            json: false,
        };
        let options = replay_options(&config, &args);
        assert!(!options.stop_on_error);
        assert_eq!(options.inter_action_delay(), Some(Duration::from_millis(125)));

        let args = ReplayArgs {
            speed: None,
            continue_on_error: false,
            ..args
        };
        let options = replay_options(&config, &args);
        assert!(options.stop_on_error);
        assert_eq!(options.speed, config.replay.speed);
    }
}
