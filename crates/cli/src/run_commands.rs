//! `wayfarer run`: plan file in, summary and exports out.

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    tracing::{info, warn},
    wayfarer_actions::ActionRegistry,
    wayfarer_browser::BrowserSession,
    wayfarer_config::{ExecutorConfig, WayfarerConfig},
    wayfarer_executor::{ExecutionSummary, Executor, PlanFile, PlanOptions, Planner, RetryPolicy},
    wayfarer_sessions::{SessionRecorder, SessionStore},
};

#[derive(Args)]
pub struct RunArgs {
    /// What the run should achieve. Defaults to the plan file's `goal`.
    #[arg(short, long)]
    pub goal: Option<String>,

    /// Plan file: JSON or YAML, `{"tasks": [...]}` or a bare task list.
    #[arg(short, long)]
    pub plan: PathBuf,

    /// Keep going after a task fails.
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Run the plan once, without whole-plan retries.
    #[arg(long, default_value_t = false)]
    pub no_plan_retry: bool,

    /// Skip CSV/JSON export of collected data.
    #[arg(long, default_value_t = false)]
    pub no_export: bool,

    /// Print the summary as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub async fn handle_run(config: &WayfarerConfig, args: RunArgs) -> Result<()> {
    let plan = PlanFile::load(&args.plan).await?;
    let goal = args
        .goal
        .clone()
        .or_else(|| plan.goal.clone())
        .context("no goal given: pass --goal or set `goal` in the plan file")?;
    let tasks = plan.plan(&goal, None).await?;
    info!(%goal, tasks = tasks.len(), plan = %args.plan.display(), "plan loaded");

    let policy = RetryPolicy::from(config);
    let options = plan_options(&config.executor, &args);

    let browser = Arc::new(BrowserSession::launch(&config.browser).await?);
    let registry = Arc::new(ActionRegistry::with_builtins(&config.paths.screenshots_dir));
    let recorder = SessionRecorder::new(SessionStore::new(&config.paths.sessions_dir));
    let mut executor = Executor::new(browser.clone(), registry, recorder, policy);

    let outcome = tokio::select! {
        summary = executor.execute_plan(&tasks, &goal, options) => Some(summary),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, abandoning run");
            None
        },
    };
    browser.close().await;
    let Some(summary) = outcome else {
        bail!("run interrupted");
    };

    if summary.success && !args.no_export {
        let output_dir = &config.paths.output_dir;
        match wayfarer_export::export_collected(output_dir, &summary.collected_data, &goal) {
            Ok(Some(paths)) => {
                if let Some(csv) = &paths.csv {
                    println!("Exported CSV:  {}", csv.display());
                }
                println!("Exported JSON: {}", paths.json.display());
            },
            Ok(None) => {},
            Err(e) => warn!(error = %e, "export failed"),
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if !summary.success {
        bail!("plan failed after {} attempt(s)", summary.attempts);
    }
    Ok(())
}

fn plan_options(executor: &ExecutorConfig, args: &RunArgs) -> PlanOptions {
    let mut options = PlanOptions::from(executor);
    if args.continue_on_error {
        options.stop_on_error = false;
    }
    if args.no_plan_retry {
        options.retry_full_plan = false;
    }
    options
}

fn print_summary(summary: &ExecutionSummary) {
    println!();
    println!("Goal:      {}", summary.goal);
    println!("Success:   {}", summary.success);
    println!(
        "Tasks:     {}/{} completed",
        summary.completed_tasks, summary.total_tasks
    );
    println!("Attempts:  {}", summary.attempts);
    if let Some(failed) = &summary.failed_task {
        println!(
            "Failed:    task {} ({}): {}",
            failed.index + 1,
            failed.task.action,
            failed.error
        );
    }
    println!("Collected: {} item(s)", summary.collected_data.len());
    if let Some(path) = &summary.log_path {
        println!("Log:       {}", path.display());
    }
}
