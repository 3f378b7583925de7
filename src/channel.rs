//! Deadline-bounded communication channel with one bot.
//!
//! Each channel runs two background tasks next to the referee:
//!
//! - a **stdout reader** that, once a read cycle is opened with
//!   [`BotChannel::start_read`], accumulates bytes until a full line, the
//!   deadline, a cancellation or shutdown, then parks again;
//! - a **stderr forwarder** that echoes everything the bot writes to its
//!   stderr onto the referee's stderr, prefixed with the bot index.
//!
//! The referee observes the cycle through single-word flags and never
//! touches the byte stream itself. [`BotChannel::cancel_read_blocking`]
//! is the only way to end a cycle from the outside: it raises the cancel
//! flag and then blocks on the read guard until the reader has parked, so
//! that `response`, `has_read` and `is_time_out` are stable afterwards.

use std::io::{self, Read, Write};
use std::process::ChildStderr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::bot_process::BotProcess;

/// Granularity of all reader-side polling.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct BotChannel {
    bot_index: usize,
    process: BotProcess,
    shared: Arc<ChannelShared>,
    stdout_reader: Option<JoinHandle<()>>,
    stderr_forwarder: Option<JoinHandle<()>>,
}

struct ChannelShared {
    shutdown: AtomicBool,
    wait_for_message: AtomicBool,
    cancel_read: AtomicBool,
    has_read: AtomicBool,
    time_out: AtomicBool,
    /// Held by the reader for the whole of a read cycle.
    read: Mutex<ReadState>,
}

#[derive(Default)]
struct ReadState {
    /// The most recent complete line, `\n` stripped.
    response: String,
    /// Partial-line bytes carried across polls and cycles.
    buf: Vec<u8>,
    time_limit: Duration,
}

impl BotChannel {
    pub(crate) fn new(bot_index: usize, mut process: BotProcess) -> BotChannel {
        let shared = Arc::new(ChannelShared {
            shutdown: AtomicBool::new(false),
            wait_for_message: AtomicBool::new(true),
            cancel_read: AtomicBool::new(false),
            has_read: AtomicBool::new(false),
            time_out: AtomicBool::new(false),
            read: Mutex::new(ReadState::default()),
        });

        let chunks = process.take_stdout();
        let reader_shared = Arc::clone(&shared);
        let stdout_reader = thread::Builder::new()
            .name(format!("bot{bot_index}-stdout"))
            .spawn(move || read_lines(reader_shared, chunks))
            .expect("could not spawn stdout reader thread");

        let stderr = process.take_stderr();
        let stderr_forwarder = thread::Builder::new()
            .name(format!("bot{bot_index}-stderr"))
            .spawn(move || forward_stderr(bot_index, stderr))
            .expect("could not spawn stderr forwarder thread");

        BotChannel {
            bot_index,
            process,
            shared,
            stdout_reader: Some(stdout_reader),
            stderr_forwarder: Some(stderr_forwarder),
        }
    }

    pub fn bot_index(&self) -> usize {
        self.bot_index
    }

    /// Write one protocol line to the bot's stdin.
    pub(crate) fn send_line(&mut self, line: &str) {
        self.process.write_line(line);
    }

    /// Open a read cycle bounded by `time_limit`.
    ///
    /// The previous cycle must have ended; if the reader has not parked
    /// yet (a just-expired uncancelled cycle), this waits it out at poll
    /// granularity before arming the new one.
    pub fn start_read(&self, time_limit: Duration) {
        while !self.shared.wait_for_message.load(Ordering::Acquire) {
            if self.shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
        {
            let mut state = self.shared.read.lock().expect("poisoned");
            state.response.clear();
            state.time_limit = time_limit;
        }
        self.shared.has_read.store(false, Ordering::Release);
        self.shared.time_out.store(false, Ordering::Release);
        self.shared.cancel_read.store(false, Ordering::Release);
        // Unparks the reader; must come last.
        self.shared.wait_for_message.store(false, Ordering::Release);
    }

    /// Abort the current read cycle and wait until the reader has parked.
    /// Idempotent; safe to call whether or not a cycle is running.
    pub fn cancel_read_blocking(&self) {
        self.shared.cancel_read.store(true, Ordering::Release);
        drop(self.shared.read.lock().expect("poisoned"));
    }

    /// Ask both background tasks to terminate.
    pub fn shut_down(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.cancel_read.store(true, Ordering::Release);
    }

    /// True iff a full line arrived during the current cycle.
    pub fn has_read(&self) -> bool {
        self.shared.has_read.load(Ordering::Acquire)
    }

    /// True iff the current cycle ended because its deadline elapsed.
    pub fn is_time_out(&self) -> bool {
        self.shared.time_out.load(Ordering::Acquire)
    }

    /// The last complete line received, or the empty string.
    pub fn response(&self) -> String {
        self.shared.read.lock().expect("poisoned").response.clone()
    }
}

impl Drop for BotChannel {
    fn drop(&mut self) {
        trace!(bot = self.bot_index, "shutting down channel");
        self.shut_down();
        // Kill the child first: the stderr forwarder only exits on EOF.
        self.process.terminate();
        if let Some(reader) = self.stdout_reader.take() {
            let _ = reader.join();
        }
        if let Some(forwarder) = self.stderr_forwarder.take() {
            let _ = forwarder.join();
        }
    }
}

/// Split the first `\n`-terminated line off `buf`. Only the terminator is
/// stripped; any `\r` stays in the line.
fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let rest = buf.split_off(pos + 1);
    let mut line = std::mem::replace(buf, rest);
    line.pop();
    Some(String::from_utf8_lossy(&line).into_owned())
}

fn drain_chunks(chunks: &Receiver<Vec<u8>>, buf: &mut Vec<u8>) {
    loop {
        match chunks.try_recv() {
            Ok(chunk) => buf.extend(chunk),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
        }
    }
}

/// Stdout reader task: park until a cycle is opened, then poll for a line
/// within the deadline, holding the read guard for the whole cycle.
fn read_lines(shared: Arc<ChannelShared>, chunks: Receiver<Vec<u8>>) {
    while !shared.shutdown.load(Ordering::Acquire) {
        // Park until the referee opens a read cycle.
        while shared.wait_for_message.load(Ordering::Acquire) {
            thread::sleep(POLL_INTERVAL);
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
        }

        let mut state = shared.read.lock().expect("poisoned");
        let started = Instant::now();
        loop {
            drain_chunks(&chunks, &mut state.buf);
            if let Some(line) = take_line(&mut state.buf) {
                state.response = line;
                shared.has_read.store(true, Ordering::Release);
                break;
            }
            if started.elapsed() > state.time_limit {
                shared.time_out.store(true, Ordering::Release);
                break;
            }
            if shared.cancel_read.load(Ordering::Acquire) {
                break;
            }
            thread::sleep(POLL_INTERVAL);
            if shared.shutdown.load(Ordering::Acquire) {
                shared.wait_for_message.store(true, Ordering::Release);
                return;
            }
        }
        // Republish the parked flag before releasing the guard, so that a
        // blocked cancel observes it once the lock is free.
        shared.wait_for_message.store(true, Ordering::Release);
        drop(state);
    }
}

/// Stderr forwarder task: echo the bot's stderr onto ours, in blocks,
/// holding the process-wide stderr lock so bots do not interleave.
fn forward_stderr(bot_index: usize, mut stderr: ChildStderr) {
    let mut buf = [0u8; 1024];
    loop {
        match stderr.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                let out = io::stderr();
                let mut lock = out.lock();
                let _ = write!(lock, "Bot#{bot_index}: ");
                let _ = lock.write_all(&buf[..n]);
                let _ = lock.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn cat_channel() -> BotChannel {
        let process = BotProcess::spawn(Path::new("/bin/cat")).unwrap();
        BotChannel::new(0, process)
    }

    fn wait_for_read(channel: &BotChannel, limit: Duration) {
        let deadline = Instant::now() + limit;
        while !channel.has_read() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
    }

    #[test]
    fn a_line_completes_the_cycle() {
        let mut channel = cat_channel();
        channel.send_line("hello");
        channel.start_read(Duration::from_secs(2));
        wait_for_read(&channel, Duration::from_secs(2));
        channel.cancel_read_blocking();
        assert!(channel.has_read());
        assert!(!channel.is_time_out());
        assert_eq!(channel.response(), "hello");
    }

    #[test]
    fn silence_times_the_cycle_out() {
        let channel = cat_channel();
        channel.start_read(Duration::from_millis(50));
        thread::sleep(Duration::from_millis(120));
        channel.cancel_read_blocking();
        assert!(!channel.has_read());
        assert!(channel.is_time_out());
        assert_eq!(channel.response(), "");
    }

    #[test]
    fn pending_lines_carry_over_to_the_next_cycle() {
        let mut channel = cat_channel();
        channel.send_line("first");
        channel.send_line("second");

        channel.start_read(Duration::from_secs(2));
        wait_for_read(&channel, Duration::from_secs(2));
        channel.cancel_read_blocking();
        assert_eq!(channel.response(), "first");

        channel.start_read(Duration::from_secs(2));
        wait_for_read(&channel, Duration::from_secs(2));
        channel.cancel_read_blocking();
        assert_eq!(channel.response(), "second");
    }

    #[test]
    fn cancel_without_a_cycle_is_harmless() {
        let channel = cat_channel();
        channel.cancel_read_blocking();
        channel.cancel_read_blocking();
        assert!(!channel.has_read());
    }

    #[test]
    fn start_read_resets_the_previous_response() {
        let mut channel = cat_channel();
        channel.send_line("stale");
        channel.start_read(Duration::from_secs(2));
        wait_for_read(&channel, Duration::from_secs(2));
        channel.cancel_read_blocking();
        assert_eq!(channel.response(), "stale");

        channel.start_read(Duration::from_millis(30));
        thread::sleep(Duration::from_millis(80));
        channel.cancel_read_blocking();
        assert!(!channel.has_read());
        assert_eq!(channel.response(), "");
        assert!(channel.is_time_out());
    }

    #[test]
    fn take_line_strips_only_the_terminator() {
        let mut buf = b"one\r\ntwo".to_vec();
        assert_eq!(take_line(&mut buf).as_deref(), Some("one\r"));
        assert_eq!(buf, b"two");
        assert_eq!(take_line(&mut buf), None);
    }
}
