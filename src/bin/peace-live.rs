//! peace-live CLI: operator interface to the live pipeline feed.

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use peace_live::config::Config;
use peace_live::event::Event;
use peace_live::history::{HistorySource, HttpHistory};
use peace_live::model::StepRef;
use peace_live::pipeline::{StageMap, reconstruct};
use peace_live::reconcile::{StepReconciler, StepView};
use peace_live::stream::{
    ConnectionStatus, HttpEventFeed, LiveSession, LiveState, format_elapsed,
};
use peace_live::telemetry::{TelemetryConfig, init_telemetry};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "peace-live", about = "Live view of the ORDER pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tail the live event feed
    Watch {
        /// Also keep this run's step reconciled (requires --step)
        #[arg(long, requires = "step")]
        run: Option<i64>,
        /// Step number to reconcile
        #[arg(long, requires = "run")]
        step: Option<i64>,
    },
    /// Reconstruct and print stage state for one step
    Stages {
        #[arg(long)]
        run: i64,
        #[arg(long)]
        step: i64,
    },
    /// Show the current live snapshot and feed status
    Snapshot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "peace-live".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Watch { run, step } => {
            let target = run
                .zip(step)
                .map(|(run_id, step_number)| StepRef {
                    run_id,
                    step_number,
                });
            cmd_watch(&config, target).await
        }
        Command::Stages { run, step } => {
            cmd_stages(
                &config,
                StepRef {
                    run_id: run,
                    step_number: step,
                },
            )
            .await
        }
        Command::Snapshot => cmd_snapshot(&config).await,
    }
}

async fn cmd_watch(config: &Config, target: Option<StepRef>) -> anyhow::Result<()> {
    let feed = Arc::new(HttpEventFeed::new(&config.api_url));
    let url = feed.url().to_string();
    let session = LiveSession::start(feed, config.session_config());
    println!("Watching {url} (session {})", session.id());

    let reconciler = match target {
        Some(step) => Some(StepReconciler::start(
            Arc::new(HttpHistory::new(&config.api_url)?),
            config.topology()?,
            step,
            session.invalidations(),
        )),
        None => None,
    };
    if let Some(ref reconciler) = reconciler {
        println!("Reconciling {}", reconciler.step());
    }

    let mut states = session.watch();
    let mut views = reconciler.as_ref().map(StepReconciler::watch_view);
    let mut printer = WatchPrinter::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = Arc::clone(&states.borrow_and_update());
                printer.state(&state);
            }
            Some(view) = next_view(&mut views) => printer.view(&view),
        }
    }

    if let Some(reconciler) = reconciler {
        reconciler.close().await;
    }
    session.close().await;
    Ok(())
}

/// Resolves with the next published view, or never when not reconciling.
async fn next_view(views: &mut Option<watch::Receiver<Arc<StepView>>>) -> Option<Arc<StepView>> {
    match views {
        Some(rx) => {
            rx.changed().await.ok()?;
            Some(Arc::clone(&rx.borrow_and_update()))
        }
        None => std::future::pending().await,
    }
}

#[derive(Default)]
struct WatchPrinter {
    status: ConnectionStatus,
    last_printed: Option<Arc<Event>>,
    last_dispatch: Option<Event>,
}

impl WatchPrinter {
    fn state(&mut self, state: &LiveState) {
        if state.status != self.status {
            println!("-- {}", state.status);
            self.status = state.status;
        }

        for event in state.events_since(self.last_printed.as_ref()) {
            let step = event
                .step
                .map(|n| format!("step {n}"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:>6}  {:<8}  {:<18}  {}",
                event.seq,
                step,
                event.kind,
                event.describe()
            );
        }
        if let Some(ref last) = state.last_event {
            self.last_printed = Some(Arc::clone(last));
        }

        let dispatch = state.active_dispatch();
        if dispatch.as_ref().map(|d| &d.event) != self.last_dispatch.as_ref() {
            if let Some(ref dispatch) = dispatch {
                println!(
                    "   >> dispatching {} ({}) for {}",
                    dispatch.skill().unwrap_or_else(|| "?".to_string()),
                    dispatch.model().unwrap_or_else(|| "default".to_string()),
                    format_elapsed(dispatch.elapsed(Utc::now()).as_secs())
                );
            }
            self.last_dispatch = dispatch.map(|d| d.event);
        }
    }

    fn view(&mut self, view: &StepView) {
        if view.history.is_none() {
            return;
        }
        println!("-- stage map (revision {})", view.revision);
        print_stages(&view.stages);
    }
}

async fn cmd_stages(config: &Config, step: StepRef) -> anyhow::Result<()> {
    let history = HttpHistory::new(&config.api_url)?;
    let topology = config.topology()?;
    let detail = history.step_history(step).await?;

    println!(
        "{step}: {}",
        detail.title.as_deref().unwrap_or("(untitled)")
    );
    println!(
        "Transitions: {}  Arbiter events: {}",
        detail.transitions.len(),
        detail.arbiter_events.len()
    );
    print_stages(&reconstruct(
        &topology,
        &detail.transitions,
        &detail.arbiter_events,
    ));
    Ok(())
}

fn print_stages(stages: &StageMap) {
    println!(
        "{:<20}  {:<10}  {:<8}  {:<9}  ARBITER",
        "STAGE", "LABEL", "STATUS", "REVISIONS"
    );
    println!("{}", "-".repeat(64));
    for (stage, info) in stages.iter() {
        println!(
            "{:<20}  {:<10}  {:<8}  {:<9}  {}",
            stage.id,
            stage.label,
            info.status(),
            info.self_transition_count,
            info.arbiter_event_count
        );
    }
}

async fn cmd_snapshot(config: &Config) -> anyhow::Result<()> {
    let history = HttpHistory::new(&config.api_url)?;

    match history.live_snapshot().await? {
        Some(snapshot) => {
            println!(
                "State:       {}",
                snapshot.current_state.as_deref().unwrap_or("-")
            );
            println!(
                "Step:        {}",
                snapshot
                    .step_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!(
                "Spec:        {}",
                snapshot.spec_id.as_deref().unwrap_or("-")
            );
            println!(
                "Last:        {}",
                snapshot.last_transition.as_deref().unwrap_or("-")
            );
            if let Some(ref result) = snapshot.last_result {
                println!(
                    "Result:      {} via {}",
                    result.verdict.as_deref().unwrap_or("-"),
                    result.skill.as_deref().unwrap_or("-")
                );
            }
            println!("Failures:    {}", snapshot.consecutive_failures);
        }
        None => println!("No active run."),
    }

    let status = history.feed_status().await?;
    println!("---");
    println!("Clients:     {}", status.connected_clients);
    println!("Last seq:    {}", status.last_event_id);
    println!("Buffered:    {}", status.recent_event_count);
    Ok(())
}
