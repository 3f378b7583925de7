//! A one-card poker reduction (Kuhn poker).
//!
//! Three cards, one dealt privately to each player by two opening chance
//! nodes, then a single round of betting: check/bet, then call/fold. Both
//! players ante one chip; a bet adds one more. Showdowns award the pot to
//! the higher card.

use std::any::Any;
use std::sync::Arc;

use crate::game::{Action, Game, Observer, ObserverKind, State};

const NUM_CARDS: u8 = 3;
const PASS: Action = 0;
const BET: Action = 1;

pub struct OneCardPoker;

impl Game for OneCardPoker {
    fn name(&self) -> &str {
        "one_card_poker"
    }

    fn num_players(&self) -> usize {
        2
    }

    fn new_initial_state(&self) -> Box<dyn State> {
        Box::new(OneCardPokerState::default())
    }

    fn make_observer(&self, kind: ObserverKind) -> Arc<dyn Observer> {
        Arc::new(OneCardPokerObserver { kind })
    }
}

#[derive(Default, Debug, Clone)]
pub struct OneCardPokerState {
    cards: [Option<u8>; 2],
    bets: Vec<Action>,
}

impl OneCardPokerState {
    fn cards_dealt(&self) -> bool {
        self.cards.iter().all(Option::is_some)
    }

    /// Showdown winner, assuming both cards are dealt.
    fn high_player(&self) -> usize {
        let c0 = self.cards[0].expect("card not dealt");
        let c1 = self.cards[1].expect("card not dealt");
        usize::from(c1 > c0)
    }
}

impl State for OneCardPokerState {
    fn is_terminal(&self) -> bool {
        match self.bets.as_slice() {
            [PASS, PASS] | [BET, _] => true,
            rest => rest.len() == 3,
        }
    }

    fn is_chance_node(&self) -> bool {
        !self.cards_dealt()
    }

    fn is_simultaneous_node(&self) -> bool {
        false
    }

    fn is_player_acting(&self, player: usize) -> bool {
        self.cards_dealt() && !self.is_terminal() && player == self.current_player()
    }

    fn current_player(&self) -> usize {
        self.bets.len() % 2
    }

    fn legal_actions(&self, player: usize) -> Vec<Action> {
        if self.is_player_acting(player) {
            vec![PASS, BET]
        } else {
            Vec::new()
        }
    }

    fn chance_outcomes(&self) -> Vec<(Action, f64)> {
        let remaining: Vec<u8> = (0..NUM_CARDS)
            .filter(|c| !self.cards.contains(&Some(*c)))
            .collect();
        let prob = 1.0 / remaining.len() as f64;
        remaining
            .into_iter()
            .map(|c| (Action::from(c), prob))
            .collect()
    }

    fn apply_action(&mut self, action: Action) {
        if let Some(slot) = self.cards.iter_mut().find(|c| c.is_none()) {
            *slot = Some(action as u8);
        } else {
            assert!(!self.is_terminal(), "action applied to a terminal state");
            self.bets.push(action);
        }
    }

    fn apply_actions(&mut self, _actions: &[Action]) {
        panic!("one_card_poker has no simultaneous nodes");
    }

    fn returns(&self) -> Vec<f64> {
        if !self.is_terminal() {
            return vec![0.0, 0.0];
        }
        let (winner, pot) = match self.bets.as_slice() {
            [PASS, PASS] => (self.high_player(), 1.0),
            [PASS, BET, PASS] => (1, 1.0),
            [PASS, BET, BET] => (self.high_player(), 2.0),
            [BET, PASS] => (0, 1.0),
            [BET, BET] => (self.high_player(), 2.0),
            seq => unreachable!("non-terminal betting sequence {seq:?}"),
        };
        let mut returns = vec![-pot; 2];
        returns[winner] = pot;
        returns
    }

    fn history(&self) -> Vec<Action> {
        self.full_history().into_iter().map(|(_, a)| a).collect()
    }

    fn full_history(&self) -> Vec<(Option<usize>, Action)> {
        let mut history = Vec::with_capacity(2 + self.bets.len());
        for card in self.cards.iter().flatten() {
            history.push((None, Action::from(*card)));
        }
        for (i, bet) in self.bets.iter().enumerate() {
            history.push((Some(i % 2), *bet));
        }
        history
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct OneCardPokerObserver {
    kind: ObserverKind,
}

impl Observer for OneCardPokerObserver {
    fn write_tensor(&self, state: &dyn State, player: usize, out: &mut Vec<u8>) {
        let state = state
            .as_any()
            .downcast_ref::<OneCardPokerState>()
            .expect("observer used with a foreign state");
        match self.kind {
            // Betting sequence so far, length-prefixed.
            ObserverKind::Public => {
                out.push(state.bets.len() as u8);
                out.extend(state.bets.iter().map(|b| *b as u8));
            }
            // The player's own card; 0xff before the deal.
            ObserverKind::Private => {
                out.push(player as u8);
                out.push(state.cards[player].unwrap_or(0xff));
            }
        }
    }
}
