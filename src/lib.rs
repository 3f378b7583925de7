//! # HIGC Referee
//!
//! A tournament referee for the Hidden Information Game Competition:
//! it coordinates matches between independent bot processes playing a
//! partially-observable game.
//!
//! Each bot is an external executable. The referee spawns it, ships
//! per-turn observations and legal actions over its standard input,
//! collects its reply from standard output within strict time limits,
//! detects misbehavior, restarts or disqualifies offenders, and
//! aggregates per-bot statistics.
//!
//! # Wire protocol
//!
//! Newline-terminated UTF-8 text on the bot's stdin/stdout:
//!
//! - Handshake, referee → bot: `<game_name>\n<player_index>\n`;
//!   bot → referee: `ready` within the ready timeout.
//! - Match start: the referee sends nothing; the bot emits `start`.
//! - Per turn, referee → bot: `<public_b64> <private_b64>` followed by
//!   the space-separated legal actions when (and only when) the bot is
//!   acting. Observation payloads are base64-encoded bytes produced by
//!   the game's public and private observers.
//! - Per turn, bot → referee: a decimal action if acting, the literal
//!   `ponder` otherwise. On chance nodes everyone ponders.
//! - Match end: referee sends `match over <score>`, bot acknowledges
//!   with `match over`. Tournament end: referee sends `tournament over`;
//!   the reply is not inspected.
//!
//! Anything the bot writes to stderr is forwarded to the referee's
//! stderr, prefixed with `Bot#<i>: `.
//!
//! # Misbehavior
//!
//! Wrong, illegal, late or missing replies are counted per bot and per
//! match (see [`results::BotErrors`]); the offending turn is played with
//! a random legal action instead, so a match always runs to its terminal
//! state. A bot that corrupts too many matches is disqualified and the
//! tournament ends immediately.
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use higc_referee::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = TournamentSettings::new()
//!         .with_timeout_act(Duration::from_millis(500))
//!         .with_max_invalid_behaviors(3);
//!     let mut referee = Referee::new(
//!         "one_card_poker",
//!         vec!["bots/alice".into(), "bots/bob".into()],
//!         42,
//!         settings,
//!     )?;
//!     let results = referee.play_tournament(10)?;
//!     results.write_verbose(&mut std::io::stdout())?;
//!     Ok(())
//! }
//! ```

pub use anyhow;

mod bot_process;
pub mod channel;
pub mod game;
pub mod games;
pub mod logger;
pub mod referee;
pub mod results;
pub mod settings;

/// Commonly used types for quick access.
pub mod prelude {
    pub use crate::game::{Action, Game, Observation, Observer, ObserverKind, State};
    pub use crate::games::load_game;
    pub use crate::referee::Referee;
    pub use crate::results::{BotErrors, MatchResult, TournamentResults};
    pub use crate::settings::TournamentSettings;
}
