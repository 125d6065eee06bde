//! Bot Configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resources::resource_position;

/// Default upstream API
pub const DEFAULT_BASE_URL: &str = "https://api.artifactsmmo.com";

/// Default cap of the aggregated log stream
pub const DEFAULT_MAX_LOGS: usize = 1000;

/// Default roster location under the home directory
const DEFAULT_CONFIG_DIR: &str = ".artifacts-bot";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config for '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// What the engine does once it is healthy and in position
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    #[default]
    Fight,
    Gather,
}

impl ActionType {
    /// Action endpoint segment for the primary action
    pub fn endpoint(&self) -> &'static str {
        match self {
            ActionType::Fight => "fight",
            ActionType::Gather => "gathering",
        }
    }
}

/// Per-character run configuration
///
/// Immutable for the lifetime of a run; changing it means restarting the engine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BotConfig {
    pub character_name: String,
    pub api_token: String,
    #[serde(default)]
    pub action_type: ActionType,
    /// Resource key, see [`crate::resources`]
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub settings: EngineSettings,
}

impl BotConfig {
    pub fn new(character_name: &str, api_token: &str, action_type: ActionType) -> Self {
        Self {
            character_name: character_name.to_string(),
            api_token: api_token.to_string(),
            action_type,
            resource: None,
            base_url: default_base_url(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Reject configs the engine cannot run
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            name: self.character_name.clone(),
            reason: reason.to_string(),
        };

        if self.character_name.trim().is_empty() {
            return Err(invalid("character name is empty"));
        }
        if self.api_token.trim().is_empty() {
            return Err(invalid("api token is empty"));
        }
        if self.action_type == ActionType::Gather {
            match self.resource.as_deref() {
                None => return Err(invalid("gather mode requires a resource")),
                Some(key) if resource_position(key).is_none() => {
                    return Err(invalid(&format!("unknown resource '{}'", key)));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Engine and client tunables
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct EngineSettings {
    /// Attempts allowed for transient failures before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between transient retries
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Added on top of every server-reported cooldown
    #[serde(default = "default_cooldown_buffer_ms")]
    pub cooldown_buffer_ms: u64,
    /// Inventory quantity that triggers a bank run
    #[serde(default = "default_inventory_limit")]
    pub inventory_limit: u64,
    /// Pause between consecutive bank deposits
    #[serde(default = "default_deposit_pause_ms")]
    pub deposit_pause_ms: u64,
    /// Back-off after a failed loop iteration
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    #[serde(default = "default_fight_rest_threshold_pct")]
    pub fight_rest_threshold_pct: f64,
    #[serde(default = "default_gather_rest_threshold_pct")]
    pub gather_rest_threshold_pct: f64,
    /// reqwest timeout per request, 0 disables it
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            cooldown_buffer_ms: default_cooldown_buffer_ms(),
            inventory_limit: default_inventory_limit(),
            deposit_pause_ms: default_deposit_pause_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            fight_rest_threshold_pct: default_fight_rest_threshold_pct(),
            gather_rest_threshold_pct: default_gather_rest_threshold_pct(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl EngineSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cooldown_buffer(&self) -> Duration {
        Duration::from_millis(self.cooldown_buffer_ms)
    }

    pub fn deposit_pause(&self) -> Duration {
        Duration::from_millis(self.deposit_pause_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// HP percentage under which the character rests
    pub fn rest_threshold(&self, action_type: ActionType) -> f64 {
        match action_type {
            ActionType::Fight => self.fight_rest_threshold_pct,
            ActionType::Gather => self.gather_rest_threshold_pct,
        }
    }
}

fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_max_retries() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 5000 }
fn default_cooldown_buffer_ms() -> u64 { 500 }
fn default_inventory_limit() -> u64 { 100 }
fn default_deposit_pause_ms() -> u64 { 500 }
fn default_error_backoff_ms() -> u64 { 5000 }
fn default_fight_rest_threshold_pct() -> f64 { 50.0 }
fn default_gather_rest_threshold_pct() -> f64 { 30.0 }
fn default_request_timeout_secs() -> u64 { 30 }

/// One roster entry of the runner config file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RosterEntry {
    pub character_name: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub resource: Option<String>,
}

/// Runner configuration loaded from the roster file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Token used by entries without their own
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_max_logs")]
    pub max_logs: usize,
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
    #[serde(default)]
    pub settings: EngineSettings,
    #[serde(default)]
    pub bots: Vec<RosterEntry>,
}

fn default_max_logs() -> usize { DEFAULT_MAX_LOGS }
fn default_status_interval_secs() -> u64 { 30 }

impl RunnerConfig {
    /// Roster path from `ARTIFACTS_ROSTER`, else `~/.artifacts-bot/roster.yaml`
    pub fn default_path() -> PathBuf {
        std::env::var("ARTIFACTS_ROSTER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("/root"))
                    .join(DEFAULT_CONFIG_DIR)
                    .join("roster.yaml")
            })
    }

    /// Parse a roster from YAML text
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a roster file and apply environment overrides
    ///
    /// Reads from environment:
    /// - `ARTIFACTS_TOKEN` - default token for entries without one
    /// - `ARTIFACTS_BASE_URL` - API base URL
    /// - `ARTIFACTS_MAX_LOGS` - log stream cap
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(path, &content)?;

        if let Ok(token) = std::env::var("ARTIFACTS_TOKEN") {
            config.api_token = Some(token);
        }
        if let Ok(url) = std::env::var("ARTIFACTS_BASE_URL") {
            config.base_url = Some(url);
        }
        if let Some(max) = std::env::var("ARTIFACTS_MAX_LOGS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_logs = max;
        }

        Ok(config)
    }

    /// Resolve every roster entry into a validated [`BotConfig`]
    pub fn bot_configs(&self) -> Result<Vec<BotConfig>, ConfigError> {
        self.bots
            .iter()
            .map(|entry| {
                let token = entry
                    .api_token
                    .clone()
                    .or_else(|| self.api_token.clone())
                    .unwrap_or_default();
                let config = BotConfig {
                    character_name: entry.character_name.clone(),
                    api_token: token,
                    action_type: entry.action_type,
                    resource: entry.resource.clone(),
                    base_url: self.base_url.clone().unwrap_or_else(default_base_url),
                    settings: self.settings,
                };
                config.validate()?;
                Ok(config)
            })
            .collect()
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.retry_delay(), Duration::from_millis(5000));
        assert_eq!(settings.cooldown_buffer(), Duration::from_millis(500));
        assert_eq!(settings.inventory_limit, 100);
        assert_eq!(settings.deposit_pause(), Duration::from_millis(500));
        assert_eq!(settings.rest_threshold(ActionType::Fight), 50.0);
        assert_eq!(settings.rest_threshold(ActionType::Gather), 30.0);
    }

    #[test]
    fn test_validate_gather_resource() {
        let ok = BotConfig::new("miner", "token", ActionType::Gather).with_resource("copper");
        assert!(ok.validate().is_ok());

        let missing = BotConfig::new("miner", "token", ActionType::Gather);
        assert!(missing.validate().is_err());

        let unknown = BotConfig::new("miner", "token", ActionType::Gather).with_resource("mithril");
        assert!(matches!(unknown.validate(), Err(ConfigError::Invalid { .. })));

        let no_token = BotConfig::new("fighter", " ", ActionType::Fight);
        assert!(no_token.validate().is_err());
    }

    #[test]
    fn test_roster_partial_settings_use_defaults() {
        let yaml = r#"
api_token: shared
settings:
  retry_delay_ms: 10
bots:
  - character_name: fighter
  - character_name: miner
    action_type: gather
    resource: iron
    api_token: own
"#;
        let config = RunnerConfig::from_yaml(Path::new("roster.yaml"), yaml).unwrap();
        assert_eq!(config.max_logs, DEFAULT_MAX_LOGS);
        assert_eq!(config.settings.retry_delay_ms, 10);
        assert_eq!(config.settings.max_retries, 3);

        let bots = config.bot_configs().unwrap();
        assert_eq!(bots.len(), 2);
        assert_eq!(bots[0].api_token, "shared");
        assert_eq!(bots[0].action_type, ActionType::Fight);
        assert_eq!(bots[0].base_url, DEFAULT_BASE_URL);
        assert_eq!(bots[1].api_token, "own");
        assert_eq!(bots[1].resource.as_deref(), Some("iron"));
    }

    #[test]
    fn test_load_roster_file() {
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let path = dir.path().join("roster.yaml");
        std::fs::write(
            &path,
            "status_interval_secs: 0\nbots:\n  - character_name: fighter\n    api_token: own\n",
        )
        .unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(config.bots.len(), 1);
        assert_eq!(config.status_interval(), Duration::from_secs(1));

        let missing = RunnerConfig::load(&dir.path().join("absent.yaml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        std::fs::write(&path, "bots: [").unwrap();
        assert!(matches!(RunnerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
