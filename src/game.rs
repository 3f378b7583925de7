//! Traits that a game must implement to be refereed.
//!
//! The referee never inspects game rules: it walks the state through the
//! [`State`] interface, asks [`Observer`]s to render per-player observation
//! tensors, and samples chance outcomes from the distribution the state
//! exposes. Games are loaded by name (see [`crate::games::load_game`]) and
//! handled as trait objects, since the executable bots on the other side of
//! the wire pick the game at runtime too.

use std::any::Any;
use std::sync::Arc;

/// An action identifier, as exchanged with the bots in decimal ASCII.
pub type Action = i64;

/// Placeholder for "no action submitted yet" inside the referee.
pub const INVALID_ACTION: Action = -1;

/// A game position, mutated in place as actions are applied.
pub trait State: Send {
    /// True once the match is decided; no further actions may be applied.
    fn is_terminal(&self) -> bool;

    /// True when the next move is drawn from a chance distribution instead
    /// of being chosen by a player. All players ponder on chance nodes.
    fn is_chance_node(&self) -> bool;

    /// True when every player submits an action for this turn at once.
    fn is_simultaneous_node(&self) -> bool;

    /// Whether `player` must submit an action this turn.
    fn is_player_acting(&self, player: usize) -> bool;

    /// The player to move. Only meaningful at sequential decision nodes.
    fn current_player(&self) -> usize;

    /// Actions `player` may legally submit this turn. Non-empty whenever
    /// `is_player_acting(player)` holds.
    fn legal_actions(&self, player: usize) -> Vec<Action>;

    /// The chance distribution at a chance node: `(action, probability)`
    /// pairs summing to one.
    fn chance_outcomes(&self) -> Vec<(Action, f64)>;

    /// Apply a single action (sequential decision or chance outcome).
    fn apply_action(&mut self, action: Action);

    /// Apply one action per player at a simultaneous node. `actions` is
    /// indexed by player and holds [`INVALID_ACTION`] for non-acting slots.
    fn apply_actions(&mut self, actions: &[Action]);

    /// Final (or running) per-player returns.
    fn returns(&self) -> Vec<f64>;

    /// Every action applied so far, chance outcomes included.
    fn history(&self) -> Vec<Action>;

    /// `history` annotated with the player who moved; `None` marks chance.
    fn full_history(&self) -> Vec<(Option<usize>, Action)>;

    /// Downcast hook for game-specific observers.
    fn as_any(&self) -> &dyn Any;
}

/// Which half of the information partition an observer renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverKind {
    /// Common knowledge across all players.
    Public,
    /// Information only the observed player holds.
    Private,
}

/// Renders a fixed-shape observation of a state, from one player's seat.
///
/// Observers are stateless after construction; the mutable scratch space
/// lives in [`Observation`].
pub trait Observer: Send + Sync {
    /// Serialize the observation of `state` for `player` into `out`.
    fn write_tensor(&self, state: &dyn State, player: usize, out: &mut Vec<u8>);
}

/// A reusable observation buffer bound to one observer.
pub struct Observation {
    observer: Arc<dyn Observer>,
    buf: Vec<u8>,
}

impl Observation {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Observation {
            observer,
            buf: Vec::new(),
        }
    }

    /// Refresh the buffer from the given state and player.
    pub fn set_from(&mut self, state: &dyn State, player: usize) {
        self.buf.clear();
        self.observer.write_tensor(state, player, &mut self.buf);
    }

    /// The compact byte encoding of the last observation set.
    pub fn compress(&self) -> &[u8] {
        &self.buf
    }
}

/// A game definition: a factory of initial states and observers.
pub trait Game: Send + Sync {
    /// Registry name, as sent to the bots during the handshake.
    fn name(&self) -> &str;

    /// Number of seats. The referee requires one bot per seat.
    fn num_players(&self) -> usize;

    /// A fresh state at the start of a match.
    fn new_initial_state(&self) -> Box<dyn State>;

    /// Build the public or private observer for this game.
    fn make_observer(&self, kind: ObserverKind) -> Arc<dyn Observer>;
}

/// Pick an outcome from a chance distribution using a uniform draw
/// `z ∈ [0, 1)`. Falls back to the last outcome if the probabilities
/// sum below one due to rounding.
pub fn sample_chance_outcome(outcomes: &[(Action, f64)], z: f64) -> (Action, f64) {
    let mut acc = 0.0;
    for &(action, prob) in outcomes {
        acc += prob;
        if z < acc {
            return (action, prob);
        }
    }
    *outcomes.last().expect("empty chance distribution")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_walks_the_cumulative_distribution() {
        let outcomes = vec![(7, 0.25), (8, 0.25), (9, 0.5)];
        assert_eq!(sample_chance_outcome(&outcomes, 0.0).0, 7);
        assert_eq!(sample_chance_outcome(&outcomes, 0.24).0, 7);
        assert_eq!(sample_chance_outcome(&outcomes, 0.25).0, 8);
        assert_eq!(sample_chance_outcome(&outcomes, 0.49).0, 8);
        assert_eq!(sample_chance_outcome(&outcomes, 0.5).0, 9);
        assert_eq!(sample_chance_outcome(&outcomes, 0.999).0, 9);
    }

    #[test]
    fn sampling_tolerates_rounding_shortfall() {
        let outcomes = vec![(1, 0.3333), (2, 0.3333), (3, 0.3333)];
        assert_eq!(sample_chance_outcome(&outcomes, 0.99999).0, 3);
    }
}
