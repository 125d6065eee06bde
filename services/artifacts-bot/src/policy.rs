//! Next-action decision for one loop iteration
//!
//! Rules are evaluated in priority order and the first match wins:
//! rest when HP is low, bank when the inventory is full, walk to the
//! configured resource when gathering elsewhere, otherwise act.

use serde::Serialize;

use crate::config::{ActionType, BotConfig};
use crate::resources::{resource_position, BANK_POSITION};
use crate::types::{CharacterSnapshot, Position};

/// Action chosen for the current iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Rest,
    /// Inventory full and away from the bank; a deposit run follows the move
    MoveToBank,
    /// Inventory full and standing on the bank
    DepositAll,
    MoveToResource(Position),
    PerformPrimary,
    NoOp,
}

impl Action {
    /// Whether this action is part of a bank run
    pub fn is_banking(&self) -> bool {
        matches!(self, Action::MoveToBank | Action::DepositAll)
    }
}

/// Decide the next action for `character`
pub fn decide(character: &CharacterSnapshot, config: &BotConfig) -> Action {
    let settings = &config.settings;

    if character.hp_percent() < settings.rest_threshold(config.action_type) {
        return Action::Rest;
    }

    if character.inventory_total() >= settings.inventory_limit {
        return if character.position() == BANK_POSITION {
            Action::DepositAll
        } else {
            Action::MoveToBank
        };
    }

    if config.action_type == ActionType::Gather {
        if let Some(key) = config.resource.as_deref() {
            match resource_position(key) {
                Some(target) if target != character.position() => {
                    return Action::MoveToResource(target);
                }
                Some(_) => {}
                None => return Action::NoOp,
            }
        }
    }

    Action::PerformPrimary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InventorySlot;

    fn character(hp: i32, max_hp: i32, at: Position, quantities: &[u32]) -> CharacterSnapshot {
        CharacterSnapshot {
            name: "hero".to_string(),
            hp,
            max_hp,
            x: at.x,
            y: at.y,
            inventory: quantities
                .iter()
                .enumerate()
                .map(|(i, q)| InventorySlot {
                    code: Some(format!("item_{}", i)),
                    quantity: *q,
                })
                .collect(),
        }
    }

    fn fighter() -> BotConfig {
        BotConfig::new("hero", "token", ActionType::Fight)
    }

    fn miner() -> BotConfig {
        BotConfig::new("hero", "token", ActionType::Gather).with_resource("copper")
    }

    const COPPER: Position = Position::new(2, 0);
    const ELSEWHERE: Position = Position::new(9, 9);

    #[test]
    fn test_rest_thresholds_per_mode() {
        for hp in 0..=100 {
            let c = character(hp, 100, COPPER, &[]);
            assert_eq!(decide(&c, &fighter()) == Action::Rest, hp < 50, "fight hp={}", hp);
            assert_eq!(decide(&c, &miner()) == Action::Rest, hp < 30, "gather hp={}", hp);
        }
    }

    #[test]
    fn test_rest_beats_full_inventory_and_movement() {
        let c = character(10, 100, ELSEWHERE, &[60, 60]);
        assert_eq!(decide(&c, &fighter()), Action::Rest);
        assert_eq!(decide(&c, &miner()), Action::Rest);
    }

    #[test]
    fn test_banking_iff_inventory_reaches_limit() {
        for limit in [1u64, 10, 100, 250] {
            for total in [0u64, limit - 1, limit, limit + 7] {
                let quantities = [(total / 2) as u32, (total - total / 2) as u32];
                let c = character(100, 100, ELSEWHERE, &quantities);
                for base in [fighter(), miner()] {
                    let mut config = base;
                    config.settings.inventory_limit = limit;
                    assert_eq!(
                        decide(&c, &config).is_banking(),
                        total >= limit,
                        "limit={} total={} mode={:?}",
                        limit,
                        total,
                        config.action_type
                    );
                }
            }
        }
    }

    #[test]
    fn test_deposit_only_on_bank_tile() {
        let away = character(100, 100, ELSEWHERE, &[100]);
        assert_eq!(decide(&away, &fighter()), Action::MoveToBank);

        let on_bank = character(100, 100, BANK_POSITION, &[100]);
        assert_eq!(decide(&on_bank, &fighter()), Action::DepositAll);
    }

    #[test]
    fn test_gather_moves_to_resource_first() {
        let away = character(100, 100, ELSEWHERE, &[5]);
        assert_eq!(decide(&away, &miner()), Action::MoveToResource(COPPER));

        let there = character(100, 100, COPPER, &[5]);
        assert_eq!(decide(&there, &miner()), Action::PerformPrimary);
    }

    #[test]
    fn test_fighter_never_moves_to_resource() {
        let c = character(100, 100, ELSEWHERE, &[]);
        assert_eq!(decide(&c, &fighter().with_resource("copper")), Action::PerformPrimary);
    }

    #[test]
    fn test_unknown_resource_is_noop() {
        let c = character(100, 100, ELSEWHERE, &[]);
        let config = BotConfig::new("hero", "token", ActionType::Gather).with_resource("mithril");
        assert_eq!(decide(&c, &config), Action::NoOp);
    }
}
