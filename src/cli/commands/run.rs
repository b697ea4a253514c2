//! `foresight run`: the anticipation daemon in the foreground.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cli::output::{action_success, create_spinner, output, CommandOutput};
use crate::cli::workspace::{ContextSnapshot, Workspace};
use crate::services::{
    AnticipationDaemon, AnticipationDaemonConfig, DaemonEvent, EngineEvent, EventEnvelope,
    StopReason,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML or JSON file with calendar, context and occupants
    #[arg(short, long)]
    pub context: Option<PathBuf>,

    /// Seconds between ticks (overrides daemon.tick_interval_secs)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Stop after this many ticks
    #[arg(short, long)]
    pub ticks: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub ticks: u64,
    pub events_published: u64,
    pub preparations_triggered: u64,
    pub patterns_saved: usize,
    pub observations_purged: u64,
    pub stop_reason: String,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        [
            action_success(&format!(
                "Daemon stopped ({}) after {} tick(s)",
                self.stop_reason, self.ticks
            )),
            format!("  Events published:       {}", self.events_published),
            format!("  Preparations triggered: {}", self.preparations_triggered),
            format!("  Patterns saved:         {}", self.patterns_saved),
            format!("  Observations purged:    {}", self.observations_purged),
        ]
        .join("\n")
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let workspace = Workspace::open().await?;
    let (mut anticipator, _) = workspace.anticipator().await?;
    if let Some(path) = &args.context {
        ContextSnapshot::load(path)?.apply(&mut anticipator)?;
    }

    let mut engine_events = anticipator.bus().subscribe();
    let anticipator = Arc::new(Mutex::new(anticipator));

    let mut daemon_config = AnticipationDaemonConfig::from(&workspace.config.daemon);
    if let Some(secs) = args.interval {
        daemon_config.tick_interval = Duration::from_secs(secs.max(1));
    }
    daemon_config.max_ticks = args.ticks;

    let daemon = AnticipationDaemon::new(anticipator.clone(), daemon_config);
    let handle = daemon.handle();
    let mut daemon_events = daemon.run();

    let spinner = (!json_mode).then(|| create_spinner("starting anticipation daemon"));

    let reason = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping daemon");
                handle.stop();
            }
            event = engine_events.recv() => match event {
                Ok(envelope) => report_event(&envelope, json_mode, spinner.as_ref()),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event subscriber lagged"),
                Err(RecvError::Closed) => {}
            },
            event = daemon_events.recv() => match event {
                Some(DaemonEvent::Started) => {}
                Some(DaemonEvent::TickCompleted { run_number, published, live_scenarios, duration_ms }) => {
                    let saved = workspace.save_patterns(&*anticipator.lock().await).await?;
                    info!(run_number, published, live_scenarios, duration_ms, saved, "tick completed");
                    if let Some(spinner) = &spinner {
                        spinner.set_message(format!(
                            "tick {run_number}: {live_scenarios} live scenario(s), {published} event(s)"
                        ));
                    }
                }
                Some(DaemonEvent::Stopped { reason }) => break reason,
                None => break StopReason::ChannelClosed,
            },
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let status = handle.status().await;
    let anticipator = anticipator.lock().await;
    let patterns_saved = workspace.save_patterns(&anticipator).await?;
    let observations_purged = workspace.purge_expired(&anticipator).await?;

    output(
        &RunOutput {
            ticks: status.total_ticks,
            events_published: status.events_published,
            preparations_triggered: status.preparations_triggered,
            patterns_saved,
            observations_purged,
            stop_reason: stop_reason_label(&reason).to_string(),
        },
        json_mode,
    );
    Ok(())
}

fn stop_reason_label(reason: &StopReason) -> &'static str {
    match reason {
        StopReason::Requested => "requested",
        StopReason::TickLimit => "tick limit",
        StopReason::ChannelClosed => "channel closed",
    }
}

/// One line per engine event: JSON Lines on stdout in JSON mode, otherwise above the spinner.
fn report_event(envelope: &EventEnvelope, json_mode: bool, spinner: Option<&indicatif::ProgressBar>) {
    if json_mode {
        if let Ok(line) = serde_json::to_string(envelope) {
            println!("{line}");
        }
        return;
    }

    let line = format!(
        "{} {}",
        style(format!("#{}", envelope.sequence.0)).dim(),
        describe_event(&envelope.event)
    );
    match spinner {
        Some(spinner) => spinner.println(line),
        None => eprintln!("{line}"),
    }
}

pub fn describe_event(event: &EngineEvent) -> String {
    let name = style(event.name()).cyan();
    match event {
        EngineEvent::PatternDiscovered { pattern }
        | EngineEvent::PatternStrengthened { pattern }
        | EngineEvent::PatternWeakened { pattern }
        | EngineEvent::PatternFaded { pattern } => format!(
            "{name} {} ({:.0}%)",
            pattern.summary(),
            pattern.confidence * 100.0
        ),
        EngineEvent::AnomalyDetected {
            observation,
            pattern,
        } => format!(
            "{name} {} at {} deviates from {}",
            observation.kind(),
            observation.timestamp.format("%H:%M"),
            pattern.summary()
        ),
        EngineEvent::ScenarioGenerated { scenario }
        | EngineEvent::ScenarioUpdated { scenario }
        | EngineEvent::ScenarioExpired { scenario } => format!(
            "{name} {} ({:.0}%)",
            scenario.description,
            scenario.probability * 100.0
        ),
        EngineEvent::ConflictDetected {
            scenario_a,
            scenario_b,
        } => format!(
            "{name} {} <> {}",
            scenario_a.description, scenario_b.description
        ),
        EngineEvent::PreparationTriggered { preparation } => format!(
            "{name} [{}] {}{}",
            preparation.action.category,
            preparation.action.description,
            if preparation.auto_execute { " (auto)" } else { "" }
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::domain::models::{Scenario, Timeframe};

    #[test]
    fn test_describe_scenario_event() {
        console::set_colors_enabled(false);
        let now = Utc::now();
        let scenario = Scenario::builder(
            "daily:meal:dinner:2026-03-02",
            "dinner preparation expected",
            Timeframe::starting_at(now, chrono::Duration::hours(1)).unwrap(),
        )
        .probability(0.95)
        .build(now)
        .unwrap();

        let line = describe_event(&EngineEvent::ScenarioGenerated { scenario });
        assert_eq!(line, "scenarioGenerated dinner preparation expected (95%)");
    }

    #[test]
    fn test_stop_reason_label() {
        assert_eq!(stop_reason_label(&StopReason::TickLimit), "tick limit");
    }
}
