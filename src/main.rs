use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::Level;

use higc_referee::logger::init_logger;
use higc_referee::prelude::*;

/// Referee for the Hidden Information Game Competition.
///
/// Plays a tournament between bot executables over stdin/stdout, prints a
/// summary to stdout and, optionally, one CSV row per match to a file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Name of the game to play
    #[arg(long, default_value = "one_card_poker")]
    game: String,

    /// Comma-separated list of paths to bot executable files
    #[arg(long, value_delimiter = ',', required = true)]
    executables: Vec<PathBuf>,

    /// Number of matches to play
    #[arg(long, default_value_t = 1)]
    num_matches: usize,

    /// Seed of the referee
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Window for a bot to emit `ready` after spawn (ms)
    #[arg(long, default_value_t = 200)]
    timeout_ready_ms: u64,

    /// Window for a bot to emit `start` at match begin (ms)
    #[arg(long, default_value_t = 5000)]
    timeout_start_ms: u64,

    /// Window for an acting bot to emit its action (ms)
    #[arg(long, default_value_t = 5000)]
    timeout_act_ms: u64,

    /// Window for a non-acting bot to emit `ponder` (ms)
    #[arg(long, default_value_t = 200)]
    timeout_ponder_ms: u64,

    /// Window for a bot to acknowledge the match end (ms)
    #[arg(long, default_value_t = 1000)]
    timeout_match_over_ms: u64,

    /// Grace period after `tournament over` (ms)
    #[arg(long, default_value_t = 60000)]
    time_tournament_over_ms: u64,

    /// Per-match error budget before a bot's actions are substituted
    #[arg(long, default_value_t = 3)]
    max_invalid_behaviors: u32,

    /// Fraction of matches a bot may corrupt before disqualification
    #[arg(long, default_value_t = 0.1)]
    disqualification_rate: f64,

    /// Write one CSV row per match to this file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Prepend a header row to the CSV output
    #[arg(long, default_value_t = false)]
    csv_header: bool,

    /// Suppress referee progress on stderr
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if !cli.quiet {
        init_logger(Level::DEBUG);
    }

    let settings = TournamentSettings::new()
        .with_timeout_ready(Duration::from_millis(cli.timeout_ready_ms))
        .with_timeout_start(Duration::from_millis(cli.timeout_start_ms))
        .with_timeout_act(Duration::from_millis(cli.timeout_act_ms))
        .with_timeout_ponder(Duration::from_millis(cli.timeout_ponder_ms))
        .with_timeout_match_over(Duration::from_millis(cli.timeout_match_over_ms))
        .with_time_tournament_over(Duration::from_millis(cli.time_tournament_over_ms))
        .with_max_invalid_behaviors(cli.max_invalid_behaviors)
        .with_disqualification_rate(cli.disqualification_rate);

    let mut referee = Referee::new(&cli.game, cli.executables, cli.seed, settings)?;
    let results = referee.play_tournament(cli.num_matches)?;

    let mut stdout = io::stdout().lock();
    results.write_verbose(&mut stdout)?;
    stdout.flush()?;

    if let Some(path) = &cli.csv {
        let mut file = File::create(path)
            .with_context(|| format!("could not create CSV file '{}'", path.display()))?;
        results.write_csv(&mut file, cli.csv_header)?;
    }

    Ok(())
}
