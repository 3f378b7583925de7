//! A deterministic sequential filler game.
//!
//! Players alternate picking a digit in `{0, 1, 2}` for a fixed number of
//! plies; player 0 wins if the final sum is even. Useful as a predictable
//! fixture: no chance, no hidden information, known length.

use std::any::Any;
use std::sync::Arc;

use crate::game::{Action, Game, Observer, ObserverKind, State};

pub struct ParityRace {
    plies: usize,
}

impl Default for ParityRace {
    fn default() -> Self {
        ParityRace { plies: 4 }
    }
}

impl ParityRace {
    pub fn new(plies: usize) -> Self {
        assert!(plies >= 2, "a race needs at least one ply per player");
        ParityRace { plies }
    }
}

impl Game for ParityRace {
    fn name(&self) -> &str {
        "parity_race"
    }

    fn num_players(&self) -> usize {
        2
    }

    fn new_initial_state(&self) -> Box<dyn State> {
        Box::new(ParityRaceState {
            plies: self.plies,
            history: Vec::with_capacity(self.plies),
        })
    }

    fn make_observer(&self, kind: ObserverKind) -> Arc<dyn Observer> {
        Arc::new(ParityRaceObserver { kind })
    }
}

#[derive(Debug, Clone)]
pub struct ParityRaceState {
    plies: usize,
    history: Vec<Action>,
}

impl State for ParityRaceState {
    fn is_terminal(&self) -> bool {
        self.history.len() == self.plies
    }

    fn is_chance_node(&self) -> bool {
        false
    }

    fn is_simultaneous_node(&self) -> bool {
        false
    }

    fn is_player_acting(&self, player: usize) -> bool {
        !self.is_terminal() && player == self.current_player()
    }

    fn current_player(&self) -> usize {
        self.history.len() % 2
    }

    fn legal_actions(&self, player: usize) -> Vec<Action> {
        if self.is_player_acting(player) {
            vec![0, 1, 2]
        } else {
            Vec::new()
        }
    }

    fn chance_outcomes(&self) -> Vec<(Action, f64)> {
        Vec::new()
    }

    fn apply_action(&mut self, action: Action) {
        assert!(!self.is_terminal(), "action applied to a terminal state");
        self.history.push(action);
    }

    fn apply_actions(&mut self, _actions: &[Action]) {
        panic!("parity_race has no simultaneous nodes");
    }

    fn returns(&self) -> Vec<f64> {
        if !self.is_terminal() {
            return vec![0.0, 0.0];
        }
        let sum: Action = self.history.iter().sum();
        if sum % 2 == 0 {
            vec![1.0, -1.0]
        } else {
            vec![-1.0, 1.0]
        }
    }

    fn history(&self) -> Vec<Action> {
        self.history.clone()
    }

    fn full_history(&self) -> Vec<(Option<usize>, Action)> {
        self.history
            .iter()
            .enumerate()
            .map(|(i, a)| (Some(i % 2), *a))
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct ParityRaceObserver {
    kind: ObserverKind,
}

impl Observer for ParityRaceObserver {
    fn write_tensor(&self, state: &dyn State, player: usize, out: &mut Vec<u8>) {
        let state = state
            .as_any()
            .downcast_ref::<ParityRaceState>()
            .expect("observer used with a foreign state");
        match self.kind {
            ObserverKind::Public => {
                out.push(state.history.len() as u8);
                out.extend(state.history.iter().map(|a| *a as u8));
            }
            ObserverKind::Private => out.push(player as u8),
        }
    }
}
