//! Built-in games the referee can load by name.
//!
//! The library ships a small set of partially-observable games so that a
//! tournament can run out of the box and the referee itself can be tested
//! against real bot processes. They are deliberately tiny; the interesting
//! machinery lives in the referee, not here.

mod matching_pennies;
mod one_card_poker;
mod parity_race;

use std::sync::Arc;

use anyhow::bail;

pub use matching_pennies::MatchingPennies;
pub use one_card_poker::OneCardPoker;
pub use parity_race::ParityRace;

use crate::game::Game;

/// Look up a game by its registry name.
///
/// # Errors
///
/// Returns an error for names not in the registry.
pub fn load_game(name: &str) -> anyhow::Result<Arc<dyn Game>> {
    match name {
        "one_card_poker" => Ok(Arc::new(OneCardPoker)),
        "matching_pennies" => Ok(Arc::new(MatchingPennies)),
        "parity_race" => Ok(Arc::new(ParityRace::default())),
        _ => bail!("unknown game '{name}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_names() {
        for name in ["one_card_poker", "matching_pennies", "parity_race"] {
            let game = load_game(name).unwrap();
            assert_eq!(game.name(), name);
            assert_eq!(game.num_players(), 2);
        }
    }

    #[test]
    fn registry_rejects_unknown_names() {
        assert!(load_game("chess").is_err());
    }
}
