//! End-to-end tournaments against real bot processes.
//!
//! Bot fixtures are small shell scripts materialized into a per-test temp
//! directory, plus the crate's own `random_bot` binary. Timeouts are kept
//! short but with enough slack for slow CI machines.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use higc_referee::prelude::*;

static DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A temp directory of bot scripts, removed on drop.
struct BotDir {
    path: PathBuf,
}

impl BotDir {
    fn new() -> BotDir {
        let path = std::env::temp_dir().join(format!(
            "higc-bots-{}-{}",
            std::process::id(),
            DIR_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        fs::create_dir_all(&path).unwrap();
        BotDir { path }
    }

    fn write_bot(&self, name: &str, script: &str) -> PathBuf {
        let path = self.path.join(name);
        fs::write(&path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }
}

impl Drop for BotDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Follows the protocol and always plays the first legal action.
const FIRST_ACTION_BOT: &str = r#"#!/bin/sh
set -f
read -r _game
read -r _index
echo ready
echo start
while read -r line; do
  case "$line" in
    "tournament over") exit 0 ;;
    "match over"*) echo "match over"; echo start ;;
    *)
      set -- $line
      if [ "$#" -gt 2 ]; then
        echo "$3"
      else
        echo ponder
      fi
      ;;
  esac
done
"#;

/// Answers the handshake with the wrong literal, then idles.
const BANANA_READY_BOT: &str = r#"#!/bin/sh
read -r _game
read -r _index
echo banana
cat >/dev/null
"#;

/// Correct protocol, but sleeps far past the act deadline before moving.
const SLEEPER_BOT: &str = r#"#!/bin/sh
set -f
read -r _game
read -r _index
echo ready
echo start
while read -r line; do
  case "$line" in
    "tournament over") exit 0 ;;
    "match over"*) echo "match over"; echo start ;;
    *)
      set -- $line
      if [ "$#" -gt 2 ]; then
        sleep 2
        echo "$3"
      else
        echo ponder
      fi
      ;;
  esac
done
"#;

/// Correct protocol, but every submitted action is out of the legal set.
const ILLEGAL_ACTION_BOT: &str = r#"#!/bin/sh
set -f
read -r _game
read -r _index
echo ready
echo start
while read -r line; do
  case "$line" in
    "tournament over") exit 0 ;;
    "match over"*) echo "match over"; echo start ;;
    *)
      set -- $line
      if [ "$#" -gt 2 ]; then
        echo 9999
      else
        echo ponder
      fi
      ;;
  esac
done
"#;

/// Emits `ponder` with a trailing space; the literal match is exact.
const TRAILING_PONDER_BOT: &str = r#"#!/bin/sh
set -f
read -r _game
read -r _index
echo ready
echo start
while read -r line; do
  case "$line" in
    "tournament over") exit 0 ;;
    "match over"*) echo "match over"; echo start ;;
    *)
      set -- $line
      if [ "$#" -gt 2 ]; then
        echo "$3"
      else
        echo "ponder "
      fi
      ;;
  esac
done
"#;

fn fast_settings() -> TournamentSettings {
    TournamentSettings::new()
        .with_timeout_ready(Duration::from_millis(500))
        .with_timeout_start(Duration::from_millis(500))
        .with_timeout_act(Duration::from_millis(1000))
        .with_timeout_ponder(Duration::from_millis(150))
        .with_timeout_match_over(Duration::from_millis(300))
        .with_time_tournament_over(Duration::from_millis(50))
        .with_max_invalid_behaviors(100)
}

#[test]
fn clean_sequential_match_records_no_errors() {
    let dir = BotDir::new();
    let bots = vec![
        dir.write_bot("alice", FIRST_ACTION_BOT),
        dir.write_bot("bob", FIRST_ACTION_BOT),
    ];

    let mut referee = Referee::new("parity_race", bots, 42, fast_settings()).unwrap();
    let results = referee.play_tournament(1).unwrap();

    assert_eq!(results.num_matches(), 1);
    assert_eq!(results.history_len_mean, 4.0);
    // Both bots picked 0 every ply: even sum, player 0 wins.
    assert_eq!(results.returns_mean, vec![1.0, -1.0]);
    for pl in 0..2 {
        assert_eq!(results.matches[0].errors[pl].total_errors(), 0);
        assert_eq!(results.corrupted_matches[pl], 0);
        assert!(!results.disqualified[pl]);
        assert_eq!(results.restarts[pl], 0);
    }
    assert!(results.matches[0].terminal.is_terminal());
}

#[test]
fn simultaneous_moves_are_applied_together() {
    let dir = BotDir::new();
    let bots = vec![
        dir.write_bot("alice", FIRST_ACTION_BOT),
        dir.write_bot("bob", FIRST_ACTION_BOT),
    ];

    let mut referee = Referee::new("matching_pennies", bots, 42, fast_settings()).unwrap();
    let results = referee.play_tournament(1).unwrap();

    assert_eq!(results.num_matches(), 1);
    let terminal = &results.matches[0].terminal;
    assert_eq!(terminal.history(), vec![0, 0]);
    // Matching picks pay player 0.
    assert_eq!(terminal.returns(), vec![1.0, -1.0]);
    for pl in 0..2 {
        assert_eq!(results.matches[0].errors[pl].total_errors(), 0);
    }
}

#[test]
fn failed_ready_aborts_the_whole_tournament() {
    let dir = BotDir::new();
    let bots = vec![
        dir.write_bot("alice", FIRST_ACTION_BOT),
        dir.write_bot("banana", BANANA_READY_BOT),
    ];

    let mut referee = Referee::new("one_card_poker", bots, 42, fast_settings()).unwrap();
    let results = referee.play_tournament(5).unwrap();

    assert_eq!(results.num_matches(), 0);
    assert_eq!(results.corrupted_matches[0], 0);
    assert_eq!(results.corrupted_matches[1], 5);
}

#[test]
fn sleeper_times_out_but_the_match_completes() {
    let dir = BotDir::new();
    let bots = vec![
        dir.write_bot("sleeper", SLEEPER_BOT),
        dir.write_bot("bob", FIRST_ACTION_BOT),
    ];

    let settings = fast_settings().with_timeout_act(Duration::from_millis(300));
    let mut referee = Referee::new("parity_race", bots, 42, settings).unwrap();
    let results = referee.play_tournament(1).unwrap();

    assert_eq!(results.num_matches(), 1);
    assert!(results.matches[0].terminal.is_terminal());
    // Two acting turns, both past the deadline.
    assert!(results.matches[0].errors[0].time_over >= 2);
    assert_eq!(results.matches[0].errors[1].illegal_actions, 0);
    assert_eq!(results.corrupted_matches[0], 1);
    assert_eq!(results.corrupted_matches[1], 0);
}

#[test]
fn repeat_offender_is_disqualified_and_the_tournament_ends() {
    let dir = BotDir::new();
    let bots = vec![
        dir.write_bot("offender", ILLEGAL_ACTION_BOT),
        dir.write_bot("bob", FIRST_ACTION_BOT),
    ];

    let settings = fast_settings()
        .with_max_invalid_behaviors(0)
        .with_disqualification_rate(0.5);
    let mut referee = Referee::new("parity_race", bots, 42, settings).unwrap();
    let results = referee.play_tournament(3).unwrap();

    // Threshold is floor(3 * 0.5) = 1: the second corrupted match ends it.
    assert_eq!(results.num_matches(), 2);
    assert_eq!(results.corrupted_matches[0], 2);
    assert!(results.disqualified[0]);
    assert!(!results.disqualified[1]);
    assert_eq!(results.restarts[0], 1);
    for result in &results.matches {
        assert!(result.errors[0].illegal_actions >= 1);
        assert_eq!(result.errors[0].protocol_error, 0);
        // Substituted actions kept the match legal to its end.
        assert!(result.terminal.is_terminal());
    }
}

#[test]
fn ponder_literal_match_is_exact() {
    let dir = BotDir::new();
    let bots = vec![
        dir.write_bot("sloppy", TRAILING_PONDER_BOT),
        dir.write_bot("bob", FIRST_ACTION_BOT),
    ];

    let mut referee = Referee::new("one_card_poker", bots, 42, fast_settings()).unwrap();
    let results = referee.play_tournament(1).unwrap();

    assert_eq!(results.num_matches(), 1);
    // At least the two opening chance nodes were pondering turns.
    assert!(results.matches[0].errors[0].ponder_error >= 2);
    assert_eq!(results.matches[0].errors[0].time_over, 0);
    assert_eq!(results.matches[0].errors[1].total_errors(), 0);
}

#[test]
fn same_seed_reproduces_the_tournament() {
    let run = || {
        let dir = BotDir::new();
        let bots = vec![
            dir.write_bot("alice", FIRST_ACTION_BOT),
            dir.write_bot("bob", FIRST_ACTION_BOT),
        ];
        let mut referee = Referee::new("one_card_poker", bots, 7, fast_settings()).unwrap();
        let results = referee.play_tournament(3).unwrap();
        let mut csv = Vec::new();
        results.write_csv(&mut csv, true).unwrap();
        String::from_utf8(csv).unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn random_bots_play_a_full_tournament() {
    let bot = PathBuf::from(env!("CARGO_BIN_EXE_random_bot"));
    let bots = vec![bot.clone(), bot];

    let mut referee = Referee::new("one_card_poker", bots, 1234, fast_settings()).unwrap();
    let results = referee.play_tournament(3).unwrap();

    assert_eq!(results.num_matches(), 3);
    for pl in 0..2 {
        assert_eq!(results.corrupted_matches[pl], 0);
        assert!(!results.disqualified[pl]);
    }
    // Zero-sum returns, match by match.
    for result in &results.matches {
        let returns = result.terminal.returns();
        assert_eq!(returns[0] + returns[1], 0.0);
    }

    let mut report = Vec::new();
    results.write_verbose(&mut report).unwrap();
    let report = String::from_utf8(report).unwrap();
    assert!(report.contains("In total played 3 matches."));
}
