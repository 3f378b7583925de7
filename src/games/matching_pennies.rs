//! Matching pennies: a single simultaneous turn.
//!
//! Both players secretly pick heads (0) or tails (1). Player 0 wins on a
//! match, player 1 on a mismatch.

use std::any::Any;
use std::sync::Arc;

use crate::game::{Action, Game, Observer, ObserverKind, State};

const HEADS: Action = 0;
const TAILS: Action = 1;

pub struct MatchingPennies;

impl Game for MatchingPennies {
    fn name(&self) -> &str {
        "matching_pennies"
    }

    fn num_players(&self) -> usize {
        2
    }

    fn new_initial_state(&self) -> Box<dyn State> {
        Box::new(MatchingPenniesState::default())
    }

    fn make_observer(&self, kind: ObserverKind) -> Arc<dyn Observer> {
        Arc::new(MatchingPenniesObserver { kind })
    }
}

#[derive(Default, Debug, Clone)]
pub struct MatchingPenniesState {
    picks: Option<(Action, Action)>,
}

impl State for MatchingPenniesState {
    fn is_terminal(&self) -> bool {
        self.picks.is_some()
    }

    fn is_chance_node(&self) -> bool {
        false
    }

    fn is_simultaneous_node(&self) -> bool {
        !self.is_terminal()
    }

    fn is_player_acting(&self, _player: usize) -> bool {
        !self.is_terminal()
    }

    fn current_player(&self) -> usize {
        0
    }

    fn legal_actions(&self, _player: usize) -> Vec<Action> {
        if self.is_terminal() {
            Vec::new()
        } else {
            vec![HEADS, TAILS]
        }
    }

    fn chance_outcomes(&self) -> Vec<(Action, f64)> {
        Vec::new()
    }

    fn apply_action(&mut self, _action: Action) {
        panic!("matching_pennies has no sequential nodes");
    }

    fn apply_actions(&mut self, actions: &[Action]) {
        assert!(!self.is_terminal(), "actions applied to a terminal state");
        self.picks = Some((actions[0], actions[1]));
    }

    fn returns(&self) -> Vec<f64> {
        match self.picks {
            Some((a, b)) if a == b => vec![1.0, -1.0],
            Some(_) => vec![-1.0, 1.0],
            None => vec![0.0, 0.0],
        }
    }

    fn history(&self) -> Vec<Action> {
        self.full_history().into_iter().map(|(_, a)| a).collect()
    }

    fn full_history(&self) -> Vec<(Option<usize>, Action)> {
        match self.picks {
            Some((a, b)) => vec![(Some(0), a), (Some(1), b)],
            None => Vec::new(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct MatchingPenniesObserver {
    kind: ObserverKind,
}

impl Observer for MatchingPenniesObserver {
    fn write_tensor(&self, state: &dyn State, player: usize, out: &mut Vec<u8>) {
        let state = state
            .as_any()
            .downcast_ref::<MatchingPenniesState>()
            .expect("observer used with a foreign state");
        match self.kind {
            ObserverKind::Public => out.push(u8::from(state.is_terminal())),
            ObserverKind::Private => out.push(player as u8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_simultaneous_turn_decides_the_match() {
        let game = MatchingPennies;
        let mut state = game.new_initial_state();
        assert!(state.is_simultaneous_node());
        assert!(state.is_player_acting(0) && state.is_player_acting(1));
        state.apply_actions(&[HEADS, HEADS]);
        assert!(state.is_terminal());
        assert_eq!(state.returns(), vec![1.0, -1.0]);
        assert_eq!(state.history(), vec![HEADS, HEADS]);
    }

    #[test]
    fn mismatch_pays_player_one() {
        let mut state = MatchingPenniesState::default();
        state.apply_actions(&[HEADS, TAILS]);
        assert_eq!(state.returns(), vec![-1.0, 1.0]);
    }
}
