//! Reference bot: follows the wire protocol and plays a uniformly random
//! legal action every time it must act.
//!
//! Observations are received but not interpreted; the legal-action list
//! appended to the turn line is all this bot needs. Anything printed to
//! stderr shows up in the referee's output for debugging.

use std::io::{self, BufRead, Write};

use rand::seq::IndexedRandom;

fn say(out: &mut impl Write, message: &str) {
    // Stdout is a pipe, so flush after every protocol line.
    writeln!(out, "{message}").expect("stdout closed");
    out.flush().expect("stdout closed");
}

fn main() {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines().map_while(Result::ok);
    let mut stdout = io::stdout();
    let mut rng = rand::rng();

    let game_name = lines.next().expect("missing game name");
    let play_as = lines.next().expect("missing player index");
    eprintln!("{game_name} {play_as}");

    say(&mut stdout, "ready");

    // Loop per match; ends when the referee says so.
    loop {
        say(&mut stdout, "start");

        loop {
            let Some(message) = lines.next() else {
                // Referee is gone.
                return;
            };

            if message == "tournament over" {
                return;
            }
            if message.starts_with("match over") {
                eprintln!("score: {}", message.rsplit(' ').next().unwrap_or(""));
                say(&mut stdout, "match over");
                break;
            }

            // `<public_b64> <private_b64>[ <action>…]`: an action list means
            // this bot is acting.
            let legal_actions: Vec<&str> = message.split(' ').skip(2).collect();
            if let Some(action) = legal_actions.choose(&mut rng) {
                say(&mut stdout, action);
            } else {
                say(&mut stdout, "ponder");
            }
        }
    }
}
