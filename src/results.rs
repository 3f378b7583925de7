//! Per-bot error accounting and tournament-level statistics.

use std::io::{self, Write};

use crate::game::State;

/// Counts how many errors a bot committed in the current match, by kind.
///
/// `time_over` is co-counted with whichever other category applies, so a
/// timed-out `ready` is one `protocol_error` plus one `time_over`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BotErrors {
    pub protocol_error: u32,
    pub illegal_actions: u32,
    pub ponder_error: u32,
    pub time_over: u32,
}

impl BotErrors {
    pub fn total_errors(&self) -> u32 {
        self.protocol_error + self.illegal_actions + self.ponder_error + self.time_over
    }

    pub fn reset(&mut self) {
        *self = BotErrors::default();
    }
}

/// The outcome of a single match: the terminal state plus what each bot
/// got wrong along the way.
pub struct MatchResult {
    pub terminal: Box<dyn State>,
    pub errors: Vec<BotErrors>,
}

/// Accumulated statistics over a tournament.
///
/// Per-bot means and variances of returns are maintained incrementally
/// with Welford's algorithm; `returns_agg` must be divided by the number
/// of matches to obtain the variance.
pub struct TournamentResults {
    pub num_bots: usize,
    pub matches: Vec<MatchResult>,
    pub returns_mean: Vec<f64>,
    pub returns_agg: Vec<f64>,
    /// Average number of moves (chance included) per match.
    pub history_len_mean: f64,
    /// Matches in which the bot crossed the invalid-behavior threshold or
    /// committed any protocol error.
    pub corrupted_matches: Vec<u32>,
    pub disqualified: Vec<bool>,
    pub restarts: Vec<u32>,
}

impl TournamentResults {
    pub fn new(num_bots: usize) -> Self {
        TournamentResults {
            num_bots,
            matches: Vec::new(),
            returns_mean: vec![0.0; num_bots],
            returns_agg: vec![0.0; num_bots],
            history_len_mean: 0.0,
            corrupted_matches: vec![0; num_bots],
            disqualified: vec![false; num_bots],
            restarts: vec![0; num_bots],
        }
    }

    pub fn num_matches(&self) -> usize {
        self.matches.len()
    }

    /// Fold one finished match into the running statistics.
    pub(crate) fn record_match(&mut self, terminal: Box<dyn State>, errors: Vec<BotErrors>) {
        let n = self.matches.len() as f64 + 1.0;
        let returns = terminal.returns();
        self.history_len_mean += (terminal.full_history().len() as f64 - self.history_len_mean) / n;
        for pl in 0..self.num_bots {
            let delta = returns[pl] - self.returns_mean[pl];
            self.returns_mean[pl] += delta / n;
            let delta2 = returns[pl] - self.returns_mean[pl];
            self.returns_agg[pl] += delta * delta2;
        }
        self.matches.push(MatchResult { terminal, errors });
    }

    /// Human-readable summary of the tournament.
    pub fn write_verbose(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "In total played {} matches.", self.num_matches())?;
        writeln!(
            out,
            "Average length of a match was {} actions.",
            self.history_len_mean
        )?;
        writeln!(out, "\nCorruption statistics:")?;
        for pl in 0..self.num_bots {
            writeln!(out, "Bot#{pl}: {}", self.corrupted_matches[pl])?;
        }
        writeln!(out, "\nReturns statistics:")?;
        for pl in 0..self.num_bots {
            let mean = self.returns_mean[pl];
            let var = self.returns_agg[pl] / self.num_matches() as f64;
            writeln!(out, "Bot#{pl} mean: {mean} var: {var}")?;
        }
        Ok(())
    }

    /// One row per match: the space-joined history, then per bot the
    /// returns and the four error counters.
    pub fn write_csv(&self, out: &mut dyn Write, print_header: bool) -> io::Result<()> {
        if print_header {
            write!(out, "history")?;
            for pl in 0..self.num_bots {
                write!(
                    out,
                    ",returns[{pl}],protocol_error[{pl}],illegal_actions[{pl}],\
                     ponder_error[{pl}],time_over[{pl}]"
                )?;
            }
            writeln!(out)?;
        }
        for result in &self.matches {
            let history = result
                .terminal
                .history()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            write!(out, "{history}")?;
            let returns = result.terminal.returns();
            for pl in 0..self.num_bots {
                let errors = &result.errors[pl];
                write!(
                    out,
                    ",{},{},{},{},{}",
                    returns[pl],
                    errors.protocol_error,
                    errors.illegal_actions,
                    errors.ponder_error,
                    errors.time_over
                )?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
