//! The referee: drives matches between bot processes over the wire protocol.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use crate::bot_process::BotProcess;
use crate::channel::BotChannel;
use crate::game::{
    sample_chance_outcome, Action, Game, Observation, ObserverKind, State, INVALID_ACTION,
};
use crate::games;
use crate::results::{BotErrors, TournamentResults};
use crate::settings::TournamentSettings;

// Messages the bots must submit at the appropriate occasions.
const READY_MESSAGE: &str = "ready";
const START_MESSAGE: &str = "start";
const PONDER_MESSAGE: &str = "ponder";
const MATCH_OVER_MESSAGE: &str = "match over";
const TOURNAMENT_OVER_MESSAGE: &str = "tournament over";

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Coordinates one tournament between a fixed set of bot executables.
///
/// The referee spawns one child process per seat, ships observations and
/// legal actions over each bot's stdin, collects replies within the
/// configured deadlines, accounts for misbehavior, and restarts or
/// disqualifies offenders between matches.
pub struct Referee {
    game_name: String,
    game: std::sync::Arc<dyn Game>,
    executables: Vec<PathBuf>,
    rng: ChaCha8Rng,
    settings: TournamentSettings,
    public_observation: Observation,
    private_observation: Observation,
    errors: Vec<BotErrors>,
    channels: Vec<BotChannel>,
}

impl std::fmt::Debug for Referee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Referee")
            .field("game_name", &self.game_name)
            .field("executables", &self.executables)
            .field("settings", &self.settings)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl Referee {
    /// Load the game and validate the bot executables.
    ///
    /// # Errors
    ///
    /// Fails on an unknown game name, a seat-count mismatch, or a bot file
    /// that is missing or not executable.
    pub fn new(
        game_name: &str,
        executables: Vec<PathBuf>,
        seed: u64,
        settings: TournamentSettings,
    ) -> anyhow::Result<Referee> {
        let game = games::load_game(game_name)?;
        ensure!(!executables.is_empty(), "at least one bot executable is required");
        ensure!(
            executables.len() == game.num_players(),
            "game '{game_name}' seats {} players but {} executables were given",
            game.num_players(),
            executables.len()
        );
        // The handshake carries the seat as a single ASCII digit.
        ensure!(
            executables.len() <= 10,
            "the wire protocol supports at most 10 bots"
        );
        for executable in &executables {
            validate_executable(executable)?;
        }

        let num_bots = executables.len();
        let public_observation = Observation::new(game.make_observer(ObserverKind::Public));
        let private_observation = Observation::new(game.make_observer(ObserverKind::Private));

        Ok(Referee {
            game_name: game_name.to_owned(),
            game,
            executables,
            rng: ChaCha8Rng::seed_from_u64(seed),
            settings,
            public_observation,
            private_observation,
            errors: vec![BotErrors::default(); num_bots],
            channels: Vec::with_capacity(num_bots),
        })
    }

    pub fn num_bots(&self) -> usize {
        self.executables.len()
    }

    pub fn settings(&self) -> &TournamentSettings {
        &self.settings
    }

    /// Play `num_matches` matches and aggregate the results.
    ///
    /// If any bot fails the `ready` handshake, all of its prospective
    /// matches are marked corrupted and no match is played. A bot whose
    /// corrupted-match count crosses `floor(num_matches *
    /// disqualification_rate)` is disqualified and the tournament ends on
    /// the spot; other misbehaving bots are restarted between matches.
    pub fn play_tournament(&mut self, num_matches: usize) -> anyhow::Result<TournamentResults> {
        let mut results = TournamentResults::new(self.num_bots());

        let start_ok = self.start_players()?;
        let mut all_ok = true;
        for pl in 0..self.num_bots() {
            if !start_ok[pl] {
                all_ok = false;
                results.corrupted_matches[pl] = num_matches as u32;
            }
        }
        if !all_ok {
            warn!("could not start all bots correctly, cannot play the tournament");
            return Ok(results);
        }

        let corruption_threshold =
            (num_matches as f64 * self.settings.disqualification_rate) as u32;

        for match_index in 0..num_matches {
            info!(
                match_number = match_index + 1,
                num_matches, "playing match"
            );
            self.reset_error_tracking();
            let terminal = self.play_match();
            results.record_match(terminal, self.errors.clone());

            for pl in 0..self.num_bots() {
                if !self.corrupted_match_due(pl) {
                    continue;
                }
                warn!(bot = pl, match_number = match_index + 1, "bot corrupted this match");
                results.corrupted_matches[pl] += 1;

                if results.corrupted_matches[pl] > corruption_threshold {
                    warn!(bot = pl, "bot is disqualified");
                    results.disqualified[pl] = true;
                    self.tournament_over();
                    return Ok(results);
                }
                info!(bot = pl, "bot is going to restart");
                results.restarts[pl] += 1;
                self.restart_player(pl)?;
            }
        }

        info!("tournament is over");
        self.tournament_over();
        Ok(results)
    }

    /// Spawn every bot, send the handshake, and collect the `ready`
    /// responses. Blocks for the full `timeout_ready` window.
    fn start_players(&mut self) -> anyhow::Result<Vec<bool>> {
        info!("starting bots");
        self.channels.clear();
        for pl in 0..self.num_bots() {
            debug!(bot = pl, executable = %self.executables[pl].display(), "spawning");
            let channel = self.make_channel(pl)?;
            self.channels.push(channel);
        }
        for pl in 0..self.num_bots() {
            self.send_handshake(pl);
            self.channels[pl].start_read(self.settings.timeout_ready);
        }
        // Blocking sleep to give time to the bots.
        thread::sleep(self.settings.timeout_ready);
        Ok(self.check_responses(READY_MESSAGE))
    }

    /// Spawn a single bot and wait for its `ready`. The previous channel
    /// for that seat, if any, is shut down by the replacement.
    fn start_player(&mut self, pl: usize) -> anyhow::Result<bool> {
        info!(bot = pl, "starting single bot");
        let channel = self.make_channel(pl)?;
        self.channels[pl] = channel;
        self.send_handshake(pl);
        self.channels[pl].start_read(self.settings.timeout_ready);
        thread::sleep(self.settings.timeout_ready);
        Ok(self.check_response(READY_MESSAGE, pl))
    }

    /// Full process respawn for one seat: fresh child, fresh error slate,
    /// new handshake. A bot that fails to come back `ready` is not treated
    /// specially here; it will fail again in the next match and be
    /// re-counted through the normal corruption path.
    fn restart_player(&mut self, pl: usize) -> anyhow::Result<()> {
        self.errors[pl].reset();
        let _ = self.start_player(pl)?;
        Ok(())
    }

    fn make_channel(&self, pl: usize) -> anyhow::Result<BotChannel> {
        let process = BotProcess::spawn(&self.executables[pl])?;
        Ok(BotChannel::new(pl, process))
    }

    fn send_handshake(&mut self, pl: usize) {
        debug_assert!(pl < 10, "seat index not representable as one digit");
        let game_name = self.game_name.clone();
        self.channels[pl].send_line(&game_name);
        self.channels[pl].send_line(&pl.to_string());
    }

    /// Play one match to its terminal state.
    ///
    /// Per turn: observations go out in a freshly shuffled player order, so
    /// no bot systematically sees its observation first; every non-acting
    /// bot then gets the full ponder window; acting bots are awaited until
    /// the act deadline or until all of them responded, whichever is first.
    fn play_match(&mut self) -> Box<dyn State> {
        let num_bots = self.num_bots();
        let mut state = self.game.new_initial_state();
        let mut player_order: Vec<usize> = (0..num_bots).collect();
        let mut is_acting = vec![false; num_bots];

        // Check start of match message.
        for channel in &self.channels {
            channel.start_read(self.settings.timeout_start);
        }
        thread::sleep(self.settings.timeout_start);
        self.check_responses(START_MESSAGE);

        while !state.is_terminal() {
            trace!(history = ?state.history(), "turn");

            // Whether all bots only ponder (i.e. chance node).
            let only_ponder = state.is_chance_node();
            for pl in 0..num_bots {
                is_acting[pl] = state.is_player_acting(pl);
            }
            player_order.shuffle(&mut self.rng);

            for &pl in &player_order {
                self.send_observation(state.as_ref(), pl, is_acting[pl]);
            }

            let turn_start = Instant::now();
            for &pl in &player_order {
                self.channels[pl].start_read(if is_acting[pl] {
                    self.settings.timeout_act
                } else {
                    self.settings.timeout_ponder
                });
            }

            // Every ponderer gets the full window regardless of the
            // delivery permutation.
            thread::sleep(self.settings.timeout_ponder);
            for pl in 0..num_bots {
                if is_acting[pl] {
                    continue;
                }
                let response = self.channels[pl].response();
                if response != PONDER_MESSAGE {
                    debug!(bot = pl, %response, "bad ponder response");
                    self.errors[pl].ponder_error += 1;
                    if self.channels[pl].is_time_out() {
                        debug!(bot = pl, "ponder timed out");
                        self.errors[pl].time_over += 1;
                    }
                }
            }

            // Wait for the acting response(s); if they all arrive before
            // the time limit there is no need to wait it out.
            if !only_ponder {
                while turn_start.elapsed() < self.settings.timeout_act
                    && !self.all_acting_responded(&is_acting)
                {
                    thread::sleep(POLL_INTERVAL);
                }
                for channel in &self.channels {
                    channel.cancel_read_blocking();
                }
            }

            let bot_actions = self.collect_actions(state.as_ref(), &is_acting);
            trace!(?bot_actions, "bot actions");

            if state.is_chance_node() {
                let outcomes = state.chance_outcomes();
                let z: f64 = self.rng.random();
                let (chance_action, prob) = sample_chance_outcome(&outcomes, z);
                debug!(action = chance_action, prob, "chance outcome");
                state.apply_action(chance_action);
            } else if state.is_simultaneous_node() {
                state.apply_actions(&bot_actions);
            } else {
                state.apply_action(bot_actions[state.current_player()]);
            }
        }

        let returns = state.returns();
        info!(?returns, "match over");
        for pl in 0..num_bots {
            let score = returns[pl] as i64;
            self.channels[pl].send_line(&format!("{MATCH_OVER_MESSAGE} {score}"));
            self.channels[pl].start_read(self.settings.timeout_match_over);
        }
        for pl in 0..num_bots {
            debug!(bot = pl, errors = ?self.errors[pl], "match error tally");
        }
        thread::sleep(self.settings.timeout_match_over);
        self.check_responses(MATCH_OVER_MESSAGE);

        state
    }

    /// Refresh both observations for `pl` and ship the turn line:
    /// `<pub_b64> <priv_b64>[ <action>…]`, actions only when acting.
    fn send_observation(&mut self, state: &dyn State, pl: usize, acting: bool) {
        self.public_observation.set_from(state, pl);
        self.private_observation.set_from(state, pl);

        let mut line = String::new();
        BASE64.encode_string(self.public_observation.compress(), &mut line);
        line.push(' ');
        BASE64.encode_string(self.private_observation.compress(), &mut line);
        if acting {
            for action in state.legal_actions(pl) {
                line.push(' ');
                line.push_str(&action.to_string());
            }
        }
        self.channels[pl].send_line(&line);
    }

    fn all_acting_responded(&self, is_acting: &[bool]) -> bool {
        is_acting
            .iter()
            .enumerate()
            .all(|(pl, &acting)| !acting || self.channels[pl].has_read())
    }

    /// Parse every acting bot's response into an action, counting errors
    /// and substituting a random legal action where needed.
    fn collect_actions(&mut self, state: &dyn State, is_acting: &[bool]) -> Vec<Action> {
        let num_bots = self.num_bots();
        let mut bot_actions = vec![INVALID_ACTION; num_bots];
        for pl in 0..num_bots {
            if !is_acting[pl] {
                continue; // Ponders have been already processed.
            }
            let legal_actions = state.legal_actions(pl);
            let mut candidate = None;

            if self.channels[pl].is_time_out() {
                debug!(bot = pl, "act timed out");
                self.errors[pl].time_over += 1;
            } else if !self.channels[pl].has_read() {
                debug!(bot = pl, "act no response");
                self.errors[pl].protocol_error += 1;
            } else {
                let response = self.channels[pl].response();
                trace!(bot = pl, %response, "act response");
                match response.parse::<Action>() {
                    Err(_) => {
                        debug!(bot = pl, %response, "act invalid action");
                        self.errors[pl].protocol_error += 1;
                    }
                    Ok(action) if !legal_actions.contains(&action) => {
                        debug!(bot = pl, action, "act illegal action");
                        self.errors[pl].illegal_actions += 1;
                    }
                    Ok(action) => {
                        if self.errors[pl].total_errors() > self.settings.max_invalid_behaviors {
                            debug!(bot = pl, "act randomly (exceeded invalid behaviors)");
                        } else {
                            candidate = Some(action);
                        }
                    }
                }
            }

            bot_actions[pl] = candidate.unwrap_or_else(|| {
                *legal_actions
                    .choose(&mut self.rng)
                    .expect("acting player with no legal actions")
            });
        }
        bot_actions
    }

    /// Cancel every in-flight read and compare the responses.
    fn check_responses(&mut self, expected: &str) -> Vec<bool> {
        (0..self.num_bots())
            .map(|pl| self.check_response(expected, pl))
            .collect()
    }

    /// Cancel `pl`'s read cycle and compare its response to `expected`.
    /// A mismatch counts a protocol error (plus a time-over if the cycle
    /// also timed out) but is never fatal.
    fn check_response(&mut self, expected: &str, pl: usize) -> bool {
        self.channels[pl].cancel_read_blocking();
        let response = self.channels[pl].response();
        if response == expected {
            trace!(bot = pl, expected, "response ok");
            true
        } else {
            warn!(bot = pl, expected, %response, "unexpected response");
            self.errors[pl].protocol_error += 1;
            if self.channels[pl].is_time_out() {
                warn!(bot = pl, "also timed out");
                self.errors[pl].time_over += 1;
            }
            false
        }
    }

    /// Best-effort end-of-tournament notification; replies are ignored.
    fn tournament_over(&mut self) {
        for pl in 0..self.num_bots() {
            self.channels[pl].send_line(TOURNAMENT_OVER_MESSAGE);
        }
        thread::sleep(self.settings.time_tournament_over);
    }

    fn reset_error_tracking(&mut self) {
        for errors in &mut self.errors {
            errors.reset();
        }
    }

    /// Did the player corrupt the current match?
    fn corrupted_match_due(&self, pl: usize) -> bool {
        self.errors[pl].total_errors() > self.settings.max_invalid_behaviors
            || self.errors[pl].protocol_error > 0
    }
}

fn validate_executable(path: &Path) -> anyhow::Result<()> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("the bot file '{}' was not found", path.display()))?;
    ensure!(
        metadata.is_file(),
        "the bot file '{}' is not a regular file",
        path.display()
    );
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        ensure!(
            metadata.permissions().mode() & 0o111 != 0,
            "the bot file '{}' cannot be executed (missing +x flag?)",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_unknown_games() {
        let err = Referee::new(
            "no_such_game",
            vec![PathBuf::from("/bin/cat"), PathBuf::from("/bin/cat")],
            42,
            TournamentSettings::default(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn construction_rejects_missing_bot_files() {
        let err = Referee::new(
            "one_card_poker",
            vec![PathBuf::from("/bin/cat"), PathBuf::from("/no/such/bot")],
            42,
            TournamentSettings::default(),
        );
        assert!(err.unwrap_err().to_string().contains("was not found"));
    }

    #[test]
    fn construction_rejects_seat_count_mismatch() {
        let err = Referee::new(
            "one_card_poker",
            vec![PathBuf::from("/bin/cat")],
            42,
            TournamentSettings::default(),
        );
        assert!(err.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn construction_rejects_non_executable_files() {
        use std::io::Write as _;
        let path = std::env::temp_dir().join(format!("higc-noexec-{}", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "not a program").unwrap();
        drop(file);
        let mut perms = fs::metadata(&path).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o644);
        fs::set_permissions(&path, perms).unwrap();

        let err = Referee::new(
            "one_card_poker",
            vec![path.clone(), path.clone()],
            42,
            TournamentSettings::default(),
        );
        assert!(err.unwrap_err().to_string().contains("cannot be executed"));
        let _ = fs::remove_file(&path);
    }
}
