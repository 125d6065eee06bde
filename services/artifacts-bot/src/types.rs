//! Core types shared by the API client, policy, engine and supervisor
//!
//! These types mirror the contract of the upstream game API plus the
//! status/log records the supervisor aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// World coordinate of a map tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

/// One carried inventory slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    /// Item code, `None` (or empty) for an unused slot
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub quantity: u32,
}

impl InventorySlot {
    /// Item code of a slot that actually holds something
    pub fn item(&self) -> Option<&str> {
        match self.code.as_deref() {
            Some(code) if !code.is_empty() && self.quantity > 0 => Some(code),
            _ => None,
        }
    }
}

/// Character state as returned by `GET /my/characters`
///
/// A fresh snapshot is fetched every loop iteration; it is never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub inventory: Vec<InventorySlot>,
}

impl CharacterSnapshot {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// HP as a percentage of max HP (100 when max HP is unknown)
    pub fn hp_percent(&self) -> f64 {
        if self.max_hp <= 0 {
            return 100.0;
        }
        f64::from(self.hp) / f64::from(self.max_hp) * 100.0
    }

    /// Sum of quantities across every slot
    pub fn inventory_total(&self) -> u64 {
        self.inventory.iter().map(|s| u64::from(s.quantity)).sum()
    }

    /// Non-empty slots as `(code, quantity)` deposit items
    pub fn deposit_items(&self) -> Vec<ItemStack> {
        self.inventory
            .iter()
            .filter_map(|slot| {
                slot.item().map(|code| ItemStack {
                    code: code.to_string(),
                    quantity: slot.quantity,
                })
            })
            .collect()
    }
}

/// Request body for bank, crafting and recycling actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub code: String,
    pub quantity: u32,
}

/// Cooldown window attached to an action response
///
/// The absolute and relative forms are interchangeable; both resolve to a
/// concrete wait at the moment they are observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownInfo {
    ExpiresAt(DateTime<Utc>),
    Remaining(Duration),
}

impl CooldownInfo {
    /// Remaining wait measured against `now` (zero once expired)
    pub fn wait_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            CooldownInfo::ExpiresAt(expires_at) => {
                (*expires_at - now).to_std().unwrap_or(Duration::ZERO)
            }
            CooldownInfo::Remaining(remaining) => *remaining,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait_from(Utc::now())
    }
}

/// Raw cooldown block as sent by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CooldownData {
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remaining_seconds: Option<f64>,
    #[serde(default)]
    pub total_seconds: Option<f64>,
}

impl CooldownData {
    /// Prefer the absolute expiration, fall back to the relative seconds
    pub fn info(&self) -> Option<CooldownInfo> {
        if let Some(expiration) = self.expiration {
            return Some(CooldownInfo::ExpiresAt(expiration));
        }
        self.remaining_seconds
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| CooldownInfo::Remaining(Duration::from_secs_f64(secs)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FightData {
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub gold: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillData {
    #[serde(default)]
    pub xp: u64,
}

/// `data` block of a successful action response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionData {
    #[serde(default)]
    pub cooldown: Option<CooldownData>,
    #[serde(default)]
    pub fight: Option<FightData>,
    #[serde(default)]
    pub details: Option<SkillData>,
    #[serde(default)]
    pub hp_restored: Option<i64>,
    #[serde(default)]
    pub character: Option<CharacterSnapshot>,
}

impl ActionData {
    /// XP gained from a fight or a gather
    pub fn xp(&self) -> u64 {
        self.fight
            .as_ref()
            .map(|f| f.xp)
            .filter(|xp| *xp > 0)
            .or_else(|| self.details.as_ref().map(|d| d.xp))
            .unwrap_or(0)
    }

    pub fn gold(&self) -> u64 {
        self.fight.as_ref().map(|f| f.gold).unwrap_or(0)
    }

    pub fn cooldown(&self) -> Option<CooldownInfo> {
        self.cooldown.as_ref().and_then(CooldownData::info)
    }
}

/// Envelope `{ "data": ... }` used by every successful response
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Aggregated per-character status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub is_running: bool,
    pub last_action: String,
    pub total_actions: u64,
    pub total_xp: u64,
    pub total_gold: u64,
    pub current_hp: i32,
    pub max_hp: i32,
    pub last_error: Option<String>,
}

/// Partial status update merged into [`BotStatus`]
///
/// Plain fields are last-write-wins and `last_error: Some(None)` clears a
/// previous error. Counter fields are increments, so a reset on the
/// supervisor side is never overwritten by a running engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub is_running: Option<bool>,
    pub last_action: Option<String>,
    pub actions_gained: u64,
    pub xp_gained: u64,
    pub gold_gained: u64,
    pub current_hp: Option<i32>,
    pub max_hp: Option<i32>,
    pub last_error: Option<Option<String>>,
}

impl StatusUpdate {
    pub fn running(is_running: bool) -> Self {
        Self {
            is_running: Some(is_running),
            ..Default::default()
        }
    }
}

impl BotStatus {
    /// Zero the counters and clear the last action/error, keeping `is_running`
    pub fn reset(&mut self) {
        *self = BotStatus {
            is_running: self.is_running,
            ..Default::default()
        };
    }

    pub fn apply(&mut self, update: StatusUpdate) {
        if let Some(v) = update.is_running {
            self.is_running = v;
        }
        if let Some(v) = update.last_action {
            self.last_action = v;
        }
        self.total_actions = self.total_actions.saturating_add(update.actions_gained);
        self.total_xp = self.total_xp.saturating_add(update.xp_gained);
        self.total_gold = self.total_gold.saturating_add(update.gold_gained);
        if let Some(v) = update.current_hp {
            self.current_hp = v;
        }
        if let Some(v) = update.max_hp {
            self.max_hp = v;
        }
        if let Some(v) = update.last_error {
            self.last_error = v;
        }
    }
}

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// One entry of the aggregated log stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub bot_name: String,
    pub message: String,
    pub severity: Severity,
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(hp: i32, max_hp: i32) -> CharacterSnapshot {
        CharacterSnapshot {
            name: "hero".to_string(),
            hp,
            max_hp,
            x: 0,
            y: 0,
            inventory: vec![
                InventorySlot { code: Some("copper_ore".into()), quantity: 7 },
                InventorySlot { code: None, quantity: 0 },
                InventorySlot { code: Some(String::new()), quantity: 0 },
                InventorySlot { code: Some("ash_wood".into()), quantity: 3 },
            ],
        }
    }

    #[test]
    fn test_hp_percent_handles_zero_max() {
        assert_eq!(snapshot(40, 80).hp_percent(), 50.0);
        assert_eq!(snapshot(0, 0).hp_percent(), 100.0);
    }

    #[test]
    fn test_deposit_items_skip_empty_slots() {
        let character = snapshot(10, 10);
        assert_eq!(character.inventory_total(), 10);
        let items = character.deposit_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].code, "copper_ore");
        assert_eq!(items[1].quantity, 3);
    }

    #[test]
    fn test_cooldown_expiration_in_past_is_zero() {
        let now = Utc::now();
        let past = CooldownInfo::ExpiresAt(now - chrono::Duration::seconds(5));
        assert_eq!(past.wait_from(now), Duration::ZERO);

        let future = CooldownInfo::ExpiresAt(now + chrono::Duration::milliseconds(1500));
        assert_eq!(future.wait_from(now), Duration::from_millis(1500));
    }

    #[test]
    fn test_action_data_parses_fight_response() {
        let body = serde_json::json!({
            "data": {
                "cooldown": { "remaining_seconds": 12.5, "total_seconds": 25 },
                "fight": { "xp": 42, "gold": 7, "result": "win" },
                "character": {
                    "name": "hero", "hp": 80, "max_hp": 120, "x": 0, "y": 1,
                    "inventory": [{ "code": "feather", "quantity": 2, "slot": 1 }]
                }
            }
        });
        let parsed: DataEnvelope<ActionData> = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.data.xp(), 42);
        assert_eq!(parsed.data.gold(), 7);
        assert_eq!(
            parsed.data.cooldown(),
            Some(CooldownInfo::Remaining(Duration::from_millis(12_500)))
        );
    }

    #[test]
    fn test_status_update_merges_and_accumulates() {
        let mut status = BotStatus {
            last_error: Some("boom".into()),
            total_actions: 3,
            total_xp: 30,
            ..Default::default()
        };
        status.apply(StatusUpdate {
            actions_gained: 1,
            xp_gained: 12,
            gold_gained: 2,
            last_error: Some(None),
            ..Default::default()
        });
        assert_eq!(status.total_actions, 4);
        assert_eq!(status.total_xp, 42);
        assert_eq!(status.total_gold, 2);
        assert_eq!(status.last_error, None);
        assert!(!status.is_running);
    }

    #[test]
    fn test_reset_keeps_running_flag() {
        let mut status = BotStatus {
            is_running: true,
            last_action: "Combat completed: +5XP, +1 gold".into(),
            total_actions: 9,
            total_xp: 45,
            total_gold: 9,
            last_error: Some("boom".into()),
            ..Default::default()
        };
        status.reset();
        assert_eq!(
            status,
            BotStatus {
                is_running: true,
                ..Default::default()
            }
        );

        // later increments count from zero
        status.apply(StatusUpdate {
            actions_gained: 1,
            xp_gained: 5,
            gold_gained: 1,
            ..Default::default()
        });
        assert_eq!((status.total_actions, status.total_xp, status.total_gold), (1, 5, 1));
    }
}
