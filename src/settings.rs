//! Tournament configuration knobs.
//!
//! All timeouts bound a single protocol phase; see the crate documentation
//! for where each one applies. Settings can be built programmatically with
//! the `with_*` methods or read from environment variables using
//! [`TournamentSettings::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional; unset or unparsable variables keep the default.
//!
//! - `HIGC_TIMEOUT_READY_MS` — window for `ready` after spawn
//! - `HIGC_TIMEOUT_START_MS` — window for `start` at match begin
//! - `HIGC_TIMEOUT_ACT_MS` — window for an acting bot's action
//! - `HIGC_TIMEOUT_PONDER_MS` — window for a non-acting bot's `ponder`
//! - `HIGC_TIMEOUT_MATCH_OVER_MS` — window for the match-end acknowledgment
//! - `HIGC_TIME_TOURNAMENT_OVER_MS` — grace after `tournament over`
//! - `HIGC_MAX_INVALID_BEHAVIORS` — per-match error budget before a bot's
//!   actions are substituted
//! - `HIGC_DISQUALIFICATION_RATE` — fraction of matches a bot may corrupt

use std::env;
use std::time::Duration;

use tracing::warn;

/// Timing and tolerance configuration of a tournament.
#[derive(Debug, Clone)]
pub struct TournamentSettings {
    /// Window for a bot to emit `ready` after spawn.
    pub timeout_ready: Duration,
    /// Window for a bot to emit `start` at match begin.
    pub timeout_start: Duration,
    /// Window for an acting bot to emit its action.
    pub timeout_act: Duration,
    /// Window for a non-acting bot to emit `ponder`.
    pub timeout_ponder: Duration,
    /// Window for a bot to acknowledge the end of a match.
    pub timeout_match_over: Duration,
    /// Grace period after `tournament over` is sent; replies are ignored.
    pub time_tournament_over: Duration,
    /// Per-match error budget; above it the bot's actions are replaced by
    /// random legal ones for the rest of the match.
    pub max_invalid_behaviors: u32,
    /// Fraction of matches a bot may corrupt before disqualification.
    pub disqualification_rate: f64,
}

impl Default for TournamentSettings {
    fn default() -> Self {
        TournamentSettings {
            timeout_ready: Duration::from_millis(200),
            timeout_start: Duration::from_millis(100),
            timeout_act: Duration::from_millis(100),
            timeout_ponder: Duration::from_millis(50),
            timeout_match_over: Duration::from_millis(100),
            time_tournament_over: Duration::from_millis(100),
            max_invalid_behaviors: 1,
            disqualification_rate: 0.1,
        }
    }
}

impl TournamentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build settings from `HIGC_*` environment variables, falling back to
    /// the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        fn duration_ms(var: &str, default: Duration) -> Duration {
            match env::var(var) {
                Ok(val) => match val.parse::<u64>() {
                    Ok(ms) => Duration::from_millis(ms),
                    Err(_) => {
                        warn!(var, %val, "could not parse, keeping default");
                        default
                    }
                },
                Err(_) => default,
            }
        }

        let defaults = Self::default();
        let max_invalid_behaviors = env::var("HIGC_MAX_INVALID_BEHAVIORS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_invalid_behaviors);
        let disqualification_rate = env::var("HIGC_DISQUALIFICATION_RATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.disqualification_rate);

        TournamentSettings {
            timeout_ready: duration_ms("HIGC_TIMEOUT_READY_MS", defaults.timeout_ready),
            timeout_start: duration_ms("HIGC_TIMEOUT_START_MS", defaults.timeout_start),
            timeout_act: duration_ms("HIGC_TIMEOUT_ACT_MS", defaults.timeout_act),
            timeout_ponder: duration_ms("HIGC_TIMEOUT_PONDER_MS", defaults.timeout_ponder),
            timeout_match_over: duration_ms(
                "HIGC_TIMEOUT_MATCH_OVER_MS",
                defaults.timeout_match_over,
            ),
            time_tournament_over: duration_ms(
                "HIGC_TIME_TOURNAMENT_OVER_MS",
                defaults.time_tournament_over,
            ),
            max_invalid_behaviors,
            disqualification_rate,
        }
    }

    #[must_use]
    pub fn with_timeout_ready(mut self, value: Duration) -> Self {
        self.timeout_ready = value;
        self
    }

    #[must_use]
    pub fn with_timeout_start(mut self, value: Duration) -> Self {
        self.timeout_start = value;
        self
    }

    #[must_use]
    pub fn with_timeout_act(mut self, value: Duration) -> Self {
        self.timeout_act = value;
        self
    }

    #[must_use]
    pub fn with_timeout_ponder(mut self, value: Duration) -> Self {
        self.timeout_ponder = value;
        self
    }

    #[must_use]
    pub fn with_timeout_match_over(mut self, value: Duration) -> Self {
        self.timeout_match_over = value;
        self
    }

    #[must_use]
    pub fn with_time_tournament_over(mut self, value: Duration) -> Self {
        self.time_tournament_over = value;
        self
    }

    #[must_use]
    pub fn with_max_invalid_behaviors(mut self, value: u32) -> Self {
        self.max_invalid_behaviors = value;
        self
    }

    #[must_use]
    pub fn with_disqualification_rate(mut self, value: f64) -> Self {
        self.disqualification_rate = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = TournamentSettings::default();
        assert_eq!(settings.timeout_ready, Duration::from_millis(200));
        assert_eq!(settings.timeout_ponder, Duration::from_millis(50));
        assert_eq!(settings.max_invalid_behaviors, 1);
        assert!(settings.disqualification_rate > 0.0);
    }

    #[test]
    fn builder_overrides_single_fields() {
        let settings = TournamentSettings::new()
            .with_timeout_act(Duration::from_secs(5))
            .with_max_invalid_behaviors(3);
        assert_eq!(settings.timeout_act, Duration::from_secs(5));
        assert_eq!(settings.max_invalid_behaviors, 3);
        // Untouched fields keep their defaults.
        assert_eq!(settings.timeout_start, Duration::from_millis(100));
    }
}
