//! Bot Engine - one character's action loop
//!
//! Each iteration fetches a fresh character snapshot, asks the policy for the
//! next action, executes it through the API client and waits out whatever
//! cooldown the response carries. Failures are logged and backed off; only an
//! explicit stop request ends the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::GameApiClient;
use crate::config::{ActionType, BotConfig};
use crate::error::ApiError;
use crate::events::EventSink;
use crate::policy::{decide, Action};
use crate::resources::BANK_POSITION;
use crate::types::{ActionData, CharacterSnapshot, Position, Severity, StatusUpdate};

/// Engine lifecycle states, traced on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Running,
    Resting,
    Banking,
    Moving,
    Acting,
    WaitingCooldown,
    Stopped,
}

/// Cooperative stop flag shared with whoever controls the engine
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters accumulated over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub actions: u64,
    pub xp: u64,
    pub gold: u64,
}

/// Action loop for a single character
pub struct BotEngine {
    config: BotConfig,
    client: GameApiClient,
    events: EventSink,
    stop: StopHandle,
    state: EngineState,
    totals: RunTotals,
}

impl BotEngine {
    /// Create an engine whose client reports on the same event sink
    pub fn new(config: BotConfig, events: EventSink) -> anyhow::Result<Self> {
        let client = GameApiClient::new(&config)?.with_events(events.clone());
        Ok(Self {
            config,
            client,
            events,
            stop: StopHandle::default(),
            state: EngineState::Idle,
            totals: RunTotals::default(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn name(&self) -> &str {
        &self.config.character_name
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            debug!("{}: {:?} -> {:?}", self.config.character_name, self.state, next);
            self.state = next;
        }
    }

    /// Run until a stop is requested
    ///
    /// The stop flag is checked at the top of each iteration, so an action in
    /// flight always completes first.
    pub async fn run(mut self) -> RunTotals {
        info!("Starting bot for {}", self.name());
        self.events.info(format!("Starting bot for {}", self.name()));
        self.events.status(StatusUpdate {
            is_running: Some(true),
            last_error: Some(None),
            ..Default::default()
        });
        self.transition(EngineState::Running);

        while !self.stop.is_stop_requested() {
            if let Err(err) = self.run_iteration().await {
                self.report_failure(&err);
                tokio::time::sleep(self.config.settings.error_backoff()).await;
            }
            self.transition(EngineState::Running);
        }

        self.transition(EngineState::Stopped);
        info!("Bot stopped for {}", self.name());
        self.events.status(StatusUpdate::running(false));
        self.events.info(format!("Bot stopped for {}", self.name()));
        self.totals
    }

    fn report_failure(&self, err: &ApiError) {
        let kind = match err {
            ApiError::NotFound(_) => "not_found",
            ApiError::RetriesExhausted { .. } => "retries_exhausted",
            ApiError::CooldownActive { .. } => "cooldown",
            ApiError::AlreadySatisfied(_) => "already_satisfied",
            ApiError::Transient(_) => "transient",
            ApiError::Unknown { .. } => "upstream",
        };
        warn!("{} iteration failed: {}", self.name(), err);
        self.events.error(
            err.to_string(),
            Some(serde_json::json!({
                "kind": kind,
                "backoffMs": self.config.settings.error_backoff_ms,
            })),
        );
    }

    /// One decide-and-act pass
    async fn run_iteration(&mut self) -> Result<(), ApiError> {
        let character = self.client.character().await?;
        self.events.status(StatusUpdate {
            current_hp: Some(character.hp),
            max_hp: Some(character.max_hp),
            ..Default::default()
        });

        let action = decide(&character, &self.config);
        debug!("{} decided {:?}", self.name(), action);

        match action {
            Action::Rest => self.rest(&character).await,
            Action::MoveToBank => {
                self.transition(EngineState::Banking);
                self.events.info("Inventory full, depositing items...");
                self.move_to(BANK_POSITION, &character).await?;
                self.deposit_all(&character).await
            }
            Action::DepositAll => {
                self.transition(EngineState::Banking);
                self.events.info("Inventory full, depositing items...");
                self.deposit_all(&character).await
            }
            Action::MoveToResource(target) => self.move_to(target, &character).await,
            Action::PerformPrimary => self.perform_primary().await,
            Action::NoOp => {
                self.events.log(
                    format!("Nothing to do for resource {:?}", self.config.resource),
                    Severity::Warning,
                    None,
                );
                tokio::time::sleep(self.config.settings.error_backoff()).await;
                Ok(())
            }
        }
    }

    async fn rest(&mut self, character: &CharacterSnapshot) -> Result<(), ApiError> {
        self.transition(EngineState::Resting);
        let hp_percent = character.hp_percent();
        self.events.log(
            format!("Low HP ({:.1}%), resting...", hp_percent),
            Severity::Warning,
            Some(serde_json::json!({
                "currentHp": character.hp,
                "maxHp": character.max_hp,
                "hpPercent": hp_percent,
            })),
        );

        let data = self.client.rest().await?;
        let restored = data.hp_restored.unwrap_or(0);
        self.events.log(
            format!("Rested and recovered {} HP", restored),
            Severity::Success,
            Some(serde_json::json!({ "hpRestored": restored })),
        );
        self.wait_cooldown(&data).await;
        Ok(())
    }

    async fn move_to(&mut self, target: Position, character: &CharacterSnapshot) -> Result<(), ApiError> {
        if character.position() == target {
            return Ok(());
        }
        if self.state != EngineState::Banking {
            self.transition(EngineState::Moving);
        }

        let data = self.client.move_to(target).await?;
        self.events.log(
            format!("Moved to {}", target),
            Severity::Info,
            Some(serde_json::json!({
                "from": character.position(),
                "to": target,
            })),
        );
        self.wait_cooldown(&data).await;
        Ok(())
    }

    /// Deposit every non-empty slot, one call per slot, pausing between calls
    async fn deposit_all(&mut self, character: &CharacterSnapshot) -> Result<(), ApiError> {
        let pause = self.config.settings.deposit_pause();
        for (i, item) in character.deposit_items().into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(pause).await;
            }
            self.client.deposit(&item).await?;
            self.events.log(
                format!("Deposited {}x {}", item.quantity, item.code),
                Severity::Info,
                Some(serde_json::json!({ "item": item })),
            );
        }
        Ok(())
    }

    async fn perform_primary(&mut self) -> Result<(), ApiError> {
        self.transition(EngineState::Acting);
        let data = self
            .client
            .action::<serde_json::Value>(self.config.action_type.endpoint(), None)
            .await?;

        let xp = data.xp();
        let gold = data.gold();
        self.totals.actions += 1;
        self.totals.xp += xp;
        self.totals.gold += gold;

        self.events.status(StatusUpdate {
            actions_gained: 1,
            xp_gained: xp,
            gold_gained: gold,
            ..Default::default()
        });

        match self.config.action_type {
            ActionType::Fight => self.events.log(
                format!("Combat completed: +{}XP, +{} gold", xp, gold),
                Severity::Success,
                Some(serde_json::json!({
                    "type": "fight",
                    "xpGained": xp,
                    "goldGained": gold,
                    "totalXp": self.totals.xp,
                    "totalGold": self.totals.gold,
                    "totalActions": self.totals.actions,
                })),
            ),
            ActionType::Gather => self.events.log(
                format!(
                    "Gathered {}: +{}XP",
                    self.config.resource.as_deref().unwrap_or("resource"),
                    xp
                ),
                Severity::Success,
                Some(serde_json::json!({
                    "type": "gather",
                    "resource": self.config.resource,
                    "xpGained": xp,
                    "totalXp": self.totals.xp,
                    "totalActions": self.totals.actions,
                })),
            ),
        }

        self.wait_cooldown(&data).await;
        Ok(())
    }

    /// Sleep out the cooldown an action response reports, plus the buffer
    async fn wait_cooldown(&mut self, data: &ActionData) {
        let Some(cooldown) = data.cooldown() else {
            return;
        };
        let wait = cooldown.wait();
        if wait.is_zero() {
            return;
        }

        let previous = self.state;
        self.transition(EngineState::WaitingCooldown);
        self.events.log(
            format!("Waiting for cooldown: {:.1} seconds", wait.as_secs_f64()),
            Severity::Info,
            Some(serde_json::json!({ "waitMs": wait.as_millis() as u64 })),
        );
        tokio::time::sleep(wait + self.config.settings.cooldown_buffer()).await;
        self.transition(previous);
    }
}
