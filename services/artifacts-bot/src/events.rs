//! Messages exchanged between the supervisor and its execution units

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::BotConfig;
use crate::types::{Severity, StatusUpdate};

/// Supervisor → unit control messages
#[derive(Debug, Clone)]
pub enum UnitCommand {
    /// Start a run with this config, replacing any current run
    Config(BotConfig),
    /// Cooperative halt at the next iteration boundary
    Stop,
}

/// Unit → supervisor events
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Status(StatusUpdate),
    Log {
        message: String,
        severity: Severity,
        details: Option<serde_json::Value>,
    },
    Error {
        message: String,
        details: Option<serde_json::Value>,
    },
}

/// Event tagged with the emitting unit
#[derive(Debug, Clone)]
pub struct UnitEvent {
    pub character: String,
    /// Generation of the unit; events from replaced units are dropped
    pub generation: u64,
    pub event: EngineEvent,
}

/// Sending half handed to an engine and its API client
///
/// Sends never fail loudly: once the supervisor is gone there is nobody to
/// report to, and the engine keeps its own state regardless.
#[derive(Debug, Clone)]
pub struct EventSink {
    character: String,
    generation: u64,
    tx: mpsc::UnboundedSender<UnitEvent>,
}

impl EventSink {
    pub fn new(character: &str, generation: u64, tx: mpsc::UnboundedSender<UnitEvent>) -> Self {
        Self {
            character: character.to_string(),
            generation,
            tx,
        }
    }

    /// Sink whose events go to a fresh channel (handy for tests and one-off clients)
    pub fn channel(character: &str) -> (Self, mpsc::UnboundedReceiver<UnitEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(character, 0, tx), rx)
    }

    pub fn character(&self) -> &str {
        &self.character
    }

    fn send(&self, event: EngineEvent) {
        let tagged = UnitEvent {
            character: self.character.clone(),
            generation: self.generation,
            event,
        };
        if self.tx.send(tagged).is_err() {
            debug!("Event receiver for {} dropped", self.character);
        }
    }

    pub fn status(&self, update: StatusUpdate) {
        self.send(EngineEvent::Status(update));
    }

    pub fn log(&self, message: impl Into<String>, severity: Severity, details: Option<serde_json::Value>) {
        self.send(EngineEvent::Log {
            message: message.into(),
            severity,
            details,
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(message, Severity::Info, None);
    }

    pub fn error(&self, message: impl Into<String>, details: Option<serde_json::Value>) {
        self.send(EngineEvent::Error {
            message: message.into(),
            details,
        });
    }
}
