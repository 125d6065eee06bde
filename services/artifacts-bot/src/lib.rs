//! Artifacts Bot Library
//!
//! Per-character action engines for the Artifacts game API and the
//! supervisor that runs many of them side by side.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logs;
pub mod policy;
pub mod resources;
pub mod supervisor;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export main types for convenience
pub use client::GameApiClient;
pub use config::{ActionType, BotConfig, ConfigError, EngineSettings, RunnerConfig};
pub use engine::{BotEngine, RunTotals, StopHandle};
pub use error::ApiError;
pub use events::{EngineEvent, EventSink, UnitCommand, UnitEvent};
pub use logs::{LogFilter, LogStream};
pub use policy::{decide, Action};
pub use supervisor::{Supervisor, SupervisorError};
pub use types::{BotStatus, CharacterSnapshot, CooldownInfo, LogEntry, Position, Severity};
