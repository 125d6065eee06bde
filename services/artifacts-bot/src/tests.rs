//! Cross-module tests for artifacts-bot

use crate::config::{ActionType, BotConfig, RunnerConfig};
use crate::events::{EngineEvent, EventSink};
use crate::policy::{decide, Action};
use crate::resources::{resource_position, BANK_POSITION};
use crate::types::{CharacterSnapshot, DataEnvelope, Severity};
use std::path::Path;

fn roster_character(json: serde_json::Value) -> CharacterSnapshot {
    let envelope: DataEnvelope<Vec<CharacterSnapshot>> = serde_json::from_value(json).unwrap();
    envelope.data.into_iter().next().unwrap()
}

#[test]
fn test_roster_snapshot_drives_policy() {
    // trimmed `GET /my/characters` payload with extra fields the API sends
    let character = roster_character(serde_json::json!({
        "data": [{
            "name": "Miner", "level": 4, "hp": 90, "max_hp": 120, "x": 0, "y": 0,
            "skin": "men1",
            "inventory": [
                { "slot": 1, "code": "copper_ore", "quantity": 60 },
                { "slot": 2, "code": "", "quantity": 0 }
            ]
        }]
    }));

    let config = BotConfig::new("Miner", "token", ActionType::Gather).with_resource("copper");
    let copper = resource_position("copper").unwrap();
    assert_eq!(decide(&character, &config), Action::MoveToResource(copper));

    let mut full = character.clone();
    full.inventory[0].quantity = 100;
    assert_eq!(decide(&full, &config), Action::MoveToBank);

    full.x = BANK_POSITION.x;
    full.y = BANK_POSITION.y;
    assert_eq!(decide(&full, &config), Action::DepositAll);
    assert_eq!(full.deposit_items().len(), 1);
}

#[test]
fn test_roster_file_configs_validate() {
    let yaml = r#"
api_token: shared
bots:
  - character_name: Miner
    action_type: gather
    resource: mithril
"#;
    let config = RunnerConfig::from_yaml(Path::new("roster.yaml"), yaml).unwrap();
    assert!(config.bot_configs().is_err());
}

#[tokio::test]
async fn test_event_sink_tags_events() {
    let (sink, mut rx) = EventSink::channel("Fighter");
    sink.log("Combat completed: +5XP, +1 gold", Severity::Success, None);
    sink.error("Character Fighter not found", None);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.character, "Fighter");
    assert!(matches!(
        first.event,
        EngineEvent::Log { severity: Severity::Success, .. }
    ));

    let second = rx.recv().await.unwrap();
    assert!(matches!(second.event, EngineEvent::Error { .. }));
}
