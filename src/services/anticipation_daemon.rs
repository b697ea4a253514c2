//! Anticipation background daemon.
//!
//! Drives [`Anticipator::tick`] on a fixed interval:
//! - pattern maintenance (eviction, throttled analysis, decay)
//! - scenario regeneration with preparation triggering

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::domain::models::DaemonConfig;
use crate::services::anticipator::{Anticipator, TickReport};

/// Configuration for the anticipation daemon.
#[derive(Debug, Clone)]
pub struct AnticipationDaemonConfig {
    /// Interval between ticks.
    pub tick_interval: Duration,
    /// Whether to tick immediately on startup.
    pub run_on_startup: bool,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
}

impl Default for AnticipationDaemonConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            run_on_startup: true,
            max_ticks: None,
        }
    }
}

impl From<&DaemonConfig> for AnticipationDaemonConfig {
    fn from(config: &DaemonConfig) -> Self {
        Self {
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
            ..Self::default()
        }
    }
}

/// Event emitted by the daemon loop.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    Started,
    TickCompleted {
        run_number: u64,
        published: usize,
        live_scenarios: usize,
        duration_ms: u64,
    },
    Stopped { reason: StopReason },
}

/// Reason the daemon stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Requested through the handle.
    Requested,
    /// Configured tick limit reached.
    TickLimit,
    /// Event receiver dropped.
    ChannelClosed,
}

/// Status of the daemon.
#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    pub running: bool,
    pub total_ticks: u64,
    pub events_published: u64,
    pub preparations_triggered: u64,
    pub last_tick: Option<Instant>,
}

/// Handle to control the daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    stop_flag: Arc<AtomicBool>,
    status: Arc<RwLock<DaemonStatus>>,
}

impl DaemonHandle {
    /// Request the daemon to stop after the current tick.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}

pub struct AnticipationDaemon {
    anticipator: Arc<Mutex<Anticipator>>,
    config: AnticipationDaemonConfig,
    status: Arc<RwLock<DaemonStatus>>,
    stop_flag: Arc<AtomicBool>,
}

impl AnticipationDaemon {
    pub fn new(anticipator: Arc<Mutex<Anticipator>>, config: AnticipationDaemonConfig) -> Self {
        Self {
            anticipator,
            config,
            status: Arc::new(RwLock::new(DaemonStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            stop_flag: self.stop_flag.clone(),
            status: self.status.clone(),
        }
    }

    pub fn config(&self) -> &AnticipationDaemonConfig {
        &self.config
    }

    /// Spawn the loop, returning a channel of daemon events.
    pub fn run(self) -> mpsc::Receiver<DaemonEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    /// Run the loop on the current task.
    pub async fn run_with_sender(self, tx: mpsc::Sender<DaemonEvent>) {
        self.run_loop(tx).await;
    }

    async fn run_loop(self, tx: mpsc::Sender<DaemonEvent>) {
        self.status.write().await.running = true;
        let _ = tx.send(DaemonEvent::Started).await;
        tracing::info!(interval_secs = self.config.tick_interval.as_secs(), "anticipation daemon started");

        let mut timer = interval(self.config.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.config.run_on_startup {
            // The first interval tick completes immediately
            timer.tick().await;
        }

        let reason = loop {
            timer.tick().await;
            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }

            let event = self.run_tick().await;
            if tx.send(event).await.is_err() {
                break StopReason::ChannelClosed;
            }

            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }
            let total = self.status.read().await.total_ticks;
            if self.config.max_ticks.is_some_and(|max| total >= max) {
                break StopReason::TickLimit;
            }
        };

        self.status.write().await.running = false;
        tracing::info!(reason = ?reason, "anticipation daemon stopped");
        let _ = tx.send(DaemonEvent::Stopped { reason }).await;
    }

    async fn run_tick(&self) -> DaemonEvent {
        let start = Instant::now();
        let (report, live_scenarios) = {
            let mut anticipator = self.anticipator.lock().await;
            let report = anticipator.tick();
            (report, anticipator.scenario_engine().len())
        };
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let run_number = self.record(&report).await;

        DaemonEvent::TickCompleted {
            run_number,
            published: report.published,
            live_scenarios,
            duration_ms,
        }
    }

    async fn record(&self, report: &TickReport) -> u64 {
        let mut status = self.status.write().await;
        status.total_ticks += 1;
        status.events_published += report.published as u64;
        status.preparations_triggered += report
            .regeneration
            .as_ref()
            .map_or(0, |r| r.triggered.len() as u64);
        status.last_tick = Some(Instant::now());
        status.total_ticks
    }

    /// Tick once without the loop.
    pub async fn run_once(&self) -> TickReport {
        let report = self.anticipator.lock().await.tick();
        self.record(&report).await;
        report
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}
