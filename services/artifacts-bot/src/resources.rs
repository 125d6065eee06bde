//! Static world reference data: resource tiles and the bank

use crate::types::Position;

/// Bank tile used for deposits
pub const BANK_POSITION: Position = Position::new(4, 1);

/// Known gatherable resource keys
pub const RESOURCE_KEYS: &[&str] = &[
    "copper",
    "ash_tree",
    "sunflower",
    "gudgeon",
    "iron",
    "spruce_tree",
    "shrimp",
    "coal",
    "birch",
];

/// Look up the tile of a resource key
///
/// Returns `None` for keys outside the table.
pub fn resource_position(key: &str) -> Option<Position> {
    let pos = match key {
        "copper" => Position::new(2, 0),
        "ash_tree" => Position::new(-1, 0),
        "sunflower" => Position::new(2, 2),
        "gudgeon" => Position::new(4, 2),
        "iron" => Position::new(1, 7),
        "spruce_tree" => Position::new(2, 6),
        "shrimp" => Position::new(5, 2),
        "coal" => Position::new(1, 6),
        "birch" => Position::new(3, 5),
        _ => return None,
    };
    Some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_has_a_position() {
        for key in RESOURCE_KEYS {
            assert!(resource_position(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_resource_lookup() {
        assert_eq!(resource_position("copper"), Some(Position::new(2, 0)));
        assert_eq!(resource_position("ash_tree"), Some(Position::new(-1, 0)));
        assert_eq!(resource_position("mithril"), None);
    }
}
