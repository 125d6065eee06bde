//! Supervisor - runs one execution unit per character
//!
//! Each unit is an independent tokio task that owns at most one
//! [`BotEngine`] run at a time and talks to the supervisor only through
//! channels. Unit events are folded into a status table and a capped log
//! stream by a single aggregator task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{BotConfig, ConfigError};
use crate::engine::BotEngine;
use crate::events::{EngineEvent, EventSink, UnitCommand, UnitEvent};
use crate::logs::{LogFilter, LogStream};
use crate::types::{BotStatus, LogEntry, Severity, StatusUpdate};

/// How long shutdown waits for units to finish their current action
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Errors from supervisor control calls
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("No bot initialized for {0}")]
    UnknownCharacter(String),

    #[error("Unit for {0} is no longer accepting commands")]
    UnitClosed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Aggregated state shared with the aggregator task
#[derive(Debug, Default)]
struct Aggregate {
    statuses: HashMap<String, BotStatus>,
    /// Live generation per character; anything else is a replaced unit
    generations: HashMap<String, u64>,
    logs: LogStream,
}

impl Aggregate {
    fn fold(&mut self, event: UnitEvent) {
        if self.generations.get(&event.character) != Some(&event.generation) {
            debug!(
                "Dropping event from replaced unit {} (generation {})",
                event.character, event.generation
            );
            return;
        }

        let name = event.character;
        match event.event {
            EngineEvent::Status(update) => {
                self.statuses.entry(name).or_default().apply(update);
            }
            EngineEvent::Log {
                message,
                severity,
                details,
            } => {
                match severity {
                    Severity::Warning => warn!(bot = %name, "{}", message),
                    Severity::Error => error!(bot = %name, "{}", message),
                    Severity::Info | Severity::Success => info!(bot = %name, "{}", message),
                }
                self.logs.push(&name, &message, severity, details);
                self.statuses.entry(name).or_default().apply(StatusUpdate {
                    last_action: Some(message),
                    ..Default::default()
                });
            }
            EngineEvent::Error { message, details } => {
                error!(bot = %name, "{}", message);
                self.logs.push(&name, &message, Severity::Error, details);
                self.statuses.entry(name).or_default().apply(StatusUpdate {
                    last_error: Some(Some(message)),
                    ..Default::default()
                });
            }
        }
    }
}

/// Supervisor-side handle of one unit
struct UnitHandle {
    commands: mpsc::UnboundedSender<UnitCommand>,
    task: JoinHandle<()>,
    config: Option<BotConfig>,
}

/// Owns every unit and the aggregated status/log state
pub struct Supervisor {
    units: HashMap<String, UnitHandle>,
    state: Arc<RwLock<Aggregate>>,
    events: mpsc::UnboundedSender<UnitEvent>,
    aggregator: JoinHandle<()>,
    next_generation: u64,
    shutdown_grace: Duration,
}

impl Supervisor {
    /// Create a supervisor; must be called inside a tokio runtime
    pub fn new(max_logs: usize) -> Self {
        let state = Arc::new(RwLock::new(Aggregate {
            logs: LogStream::new(max_logs),
            ..Default::default()
        }));
        let (events, mut rx) = mpsc::unbounded_channel::<UnitEvent>();

        let shared = Arc::clone(&state);
        let aggregator = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                shared.write().await.fold(event);
            }
        });

        Self {
            units: HashMap::new(),
            state,
            events,
            aggregator,
            next_generation: 1,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Create a fresh unit for `config.character_name`
    ///
    /// Any existing unit for that name is terminated and its status reset.
    pub async fn initialize(&mut self, config: BotConfig) {
        let name = config.character_name.clone();
        if let Some(old) = self.units.remove(&name) {
            info!("Replacing existing unit for {}", name);
            old.task.abort();
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        {
            let mut state = self.state.write().await;
            state.generations.insert(name.clone(), generation);
            state.statuses.insert(name.clone(), BotStatus::default());
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(&name, generation, self.events.clone());
        let task = tokio::spawn(unit_loop(rx, sink));

        debug!("Initialized unit for {} (generation {})", name, generation);
        self.units.insert(
            name,
            UnitHandle {
                commands,
                task,
                config: Some(config),
            },
        );
    }

    /// Send a run command to an initialized unit
    pub async fn start(&mut self, name: &str, config: BotConfig) -> Result<(), SupervisorError> {
        config.validate()?;
        let unit = self
            .units
            .get_mut(name)
            .ok_or_else(|| SupervisorError::UnknownCharacter(name.to_string()))?;

        unit.commands
            .send(UnitCommand::Config(config.clone()))
            .map_err(|_| SupervisorError::UnitClosed(name.to_string()))?;
        unit.config = Some(config);

        self.update_status(
            name,
            StatusUpdate {
                is_running: Some(true),
                last_error: Some(None),
                ..Default::default()
            },
        )
        .await;
        Ok(())
    }

    /// Request a cooperative stop
    ///
    /// `is_running` flips once the unit acknowledges, after its current
    /// action completes.
    pub fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        let unit = self
            .units
            .get(name)
            .ok_or_else(|| SupervisorError::UnknownCharacter(name.to_string()))?;
        unit.commands
            .send(UnitCommand::Stop)
            .map_err(|_| SupervisorError::UnitClosed(name.to_string()))?;
        info!("Stop requested for {}", name);
        Ok(())
    }

    pub fn stop_all(&self) {
        for name in self.units.keys() {
            if let Err(e) = self.stop(name) {
                warn!("Failed to stop {}: {}", name, e);
            }
        }
    }

    /// Last known status, or a zeroed default
    pub async fn get_status(&self, name: &str) -> BotStatus {
        self.state
            .read()
            .await
            .statuses
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Every tracked status, sorted by character name
    pub async fn statuses(&self) -> Vec<(String, BotStatus)> {
        let state = self.state.read().await;
        let mut all: Vec<_> = state
            .statuses
            .iter()
            .map(|(name, status)| (name.clone(), status.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Zero the counters of `name`; a running unit stays marked running
    pub async fn reset_status(&self, name: &str) {
        self.state
            .write()
            .await
            .statuses
            .entry(name.to_string())
            .or_default()
            .reset();
    }

    /// Config last sent to (or used to initialize) a unit
    pub fn config(&self, name: &str) -> Option<&BotConfig> {
        self.units.get(name).and_then(|u| u.config.as_ref())
    }

    pub fn characters(&self) -> Vec<String> {
        let mut names: Vec<_> = self.units.keys().cloned().collect();
        names.sort();
        names
    }

    /// Log entries matching `filter`, newest first
    pub async fn logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.state.read().await.logs.filtered(filter)
    }

    pub async fn recent_logs(&self, n: usize) -> Vec<LogEntry> {
        self.state.read().await.logs.recent(n)
    }

    pub async fn log_by_id(&self, id: Uuid) -> Option<LogEntry> {
        self.state.read().await.logs.by_id(id).cloned()
    }

    pub async fn log_bot_names(&self) -> Vec<String> {
        self.state.read().await.logs.bot_names()
    }

    pub async fn log_count(&self) -> usize {
        self.state.read().await.logs.len()
    }

    pub async fn clear_logs(&self, name: Option<&str>) {
        self.state.write().await.logs.clear(name);
    }

    pub async fn set_max_logs(&self, max: usize) {
        self.state.write().await.logs.set_max_len(max);
    }

    async fn update_status(&self, name: &str, update: StatusUpdate) {
        self.state
            .write()
            .await
            .statuses
            .entry(name.to_string())
            .or_default()
            .apply(update);
    }

    /// Stop and release every unit, then clear all aggregated state
    ///
    /// All units share one grace deadline; whatever is still running when it
    /// passes is aborted.
    pub async fn shutdown(mut self) {
        self.stop_all();

        let units: Vec<_> = self.units.drain().collect();
        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        for (name, unit) in units {
            // closing the command channel lets the unit exit after its run ends
            drop(unit.commands);
            let abort = unit.task.abort_handle();
            match tokio::time::timeout_at(deadline, unit.task).await {
                Ok(_) => debug!("Unit for {} finished", name),
                Err(_) => {
                    warn!("Unit for {} did not stop within grace period, aborting", name);
                    abort.abort();
                }
            }
        }

        let mut state = self.state.write().await;
        state.statuses.clear();
        state.generations.clear();
        state.logs.clear(None);
        info!("Supervisor shut down");
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        for unit in self.units.values() {
            unit.task.abort();
        }
        self.aggregator.abort();
    }
}

/// Body of one execution unit
///
/// Runs at most one engine at a time. A new `Config` stops the current run
/// cooperatively and starts the next one only after it has finished, so two
/// actions for the same character are never in flight together.
async fn unit_loop(mut commands: mpsc::UnboundedReceiver<UnitCommand>, sink: EventSink) {
    let mut pending: Option<BotConfig> = None;

    loop {
        let config = match pending.take() {
            Some(config) => config,
            None => match commands.recv().await {
                Some(UnitCommand::Config(config)) => config,
                Some(UnitCommand::Stop) => {
                    // nothing running; acknowledge right away
                    sink.status(StatusUpdate::running(false));
                    continue;
                }
                None => return,
            },
        };

        let engine = match BotEngine::new(config, sink.clone()) {
            Ok(engine) => engine,
            Err(e) => {
                sink.error(format!("Failed to create engine: {}", e), None);
                sink.status(StatusUpdate::running(false));
                continue;
            }
        };

        let stop = engine.stop_handle();
        let run = engine.run();
        tokio::pin!(run);

        let mut closed = false;
        loop {
            tokio::select! {
                totals = &mut run => {
                    debug!(
                        "{} run finished: {} actions, {} xp, {} gold",
                        sink.character(), totals.actions, totals.xp, totals.gold
                    );
                    break;
                }
                cmd = commands.recv(), if !closed => match cmd {
                    Some(UnitCommand::Stop) => {
                        sink.info("Stop requested, completing current action...");
                        stop.request_stop();
                    }
                    Some(UnitCommand::Config(next)) => {
                        stop.request_stop();
                        pending = Some(next);
                    }
                    None => {
                        stop.request_stop();
                        closed = true;
                    }
                },
            }
        }

        if closed {
            return;
        }
    }
}
