//! Ownership of a single bot child process and its standard streams.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::trace;

/// How long a child gets to exit on its own after stdin is closed.
const EXIT_GRACE: Duration = Duration::from_millis(200);

/// A spawned bot executable with piped standard streams.
///
/// Stdout is drained by a pump thread into an in-memory channel so that the
/// read side never blocks: a read cycle polls [`BotProcess::try_read_chunk`]
/// and can be abandoned at any time. Stdin writes are best-effort; a bot
/// that stopped reading loses messages rather than stalling the referee.
pub(crate) struct BotProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout_pump: Option<JoinHandle<()>>,
    chunks: Option<Receiver<Vec<u8>>>,
    stderr: Option<ChildStderr>,
}

impl BotProcess {
    /// Spawn `executable` with fresh stdin/stdout/stderr pipes.
    ///
    /// The caller has already checked that the file exists and is
    /// executable; failures here are unexpected and fatal.
    pub fn spawn(executable: &Path) -> anyhow::Result<BotProcess> {
        let mut child = Command::new(executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("could not start bot '{}'", executable.display()))?;

        let stdin = child.stdin.take().context("bot child has no stdin")?;
        let stdout = child.stdout.take().context("bot child has no stdout")?;
        let stderr = child.stderr.take().context("bot child has no stderr")?;

        let (tx, rx) = mpsc::channel();
        let stdout_pump = thread::Builder::new()
            .name("bot-stdout-pump".to_owned())
            .spawn(move || pump_stdout(stdout, tx))
            .context("could not spawn stdout pump thread")?;

        Ok(BotProcess {
            child,
            stdin: Some(stdin),
            stdout_pump: Some(stdout_pump),
            chunks: Some(rx),
            stderr: Some(stderr),
        })
    }

    /// Hand the stdout byte stream to the channel's reader task. Single use.
    pub fn take_stdout(&mut self) -> Receiver<Vec<u8>> {
        self.chunks.take().expect("stdout receiver already taken")
    }

    /// Hand the stderr stream to the channel's forwarder task. Single use.
    pub fn take_stderr(&mut self) -> ChildStderr {
        self.stderr.take().expect("stderr handle already taken")
    }

    /// Write `line` plus a newline to the child's stdin, best-effort.
    ///
    /// `write_all` loops over partial writes; errors mean the bot closed
    /// its end and will be caught by the protocol timeouts instead.
    pub fn write_line(&mut self, line: &str) {
        let Some(stdin) = self.stdin.as_mut() else {
            return;
        };
        let mut payload = Vec::with_capacity(line.len() + 1);
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\n');
        if let Err(err) = stdin.write_all(&payload) {
            trace!(%err, "write to bot stdin failed");
        }
    }

    /// Close stdin, give the child a short grace period to exit, then kill
    /// and reap it. Idempotent.
    pub fn terminate(&mut self) {
        drop(self.stdin.take());
        let deadline = Instant::now() + EXIT_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = self.child.kill();
                        let _ = self.child.wait();
                        break;
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                Err(_) => break,
            }
        }
        // The pump sees EOF once the child (and any children of its own
        // holding the pipe) are gone.
        if let Some(pump) = self.stdout_pump.take() {
            let _ = pump.join();
        }
    }
}

impl Drop for BotProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn pump_stdout(mut stdout: ChildStdout, tx: Sender<Vec<u8>>) {
    let mut buf = [0u8; 1024];
    loop {
        match stdout.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc::TryRecvError;

    fn cat() -> PathBuf {
        PathBuf::from("/bin/cat")
    }

    #[test]
    fn echoes_lines_through_the_pump() {
        let mut process = BotProcess::spawn(&cat()).unwrap();
        let chunks = process.take_stdout();
        process.write_line("hello");

        let mut received = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while received != b"hello\n" && Instant::now() < deadline {
            match chunks.try_recv() {
                Ok(chunk) => received.extend(chunk),
                Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(1)),
                Err(TryRecvError::Disconnected) => break,
            }
        }
        assert_eq!(received, b"hello\n");
    }

    #[test]
    fn terminate_reaps_the_child() {
        let mut process = BotProcess::spawn(&cat()).unwrap();
        let _ = process.take_stdout();
        process.terminate();
        // A second terminate must be a no-op.
        process.terminate();
    }

    #[test]
    fn spawn_fails_for_missing_executable() {
        assert!(BotProcess::spawn(Path::new("/nonexistent/bot")).is_err());
    }
}
