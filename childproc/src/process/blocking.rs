//! Blocking launch returning a result record.
//!
//! The calling thread waits for the child. Two reader threads drain the
//! pipes while the caller polls for exit, so a chatty child cannot fill a
//! pipe and stall. After a limit kill the readers are given
//! [`DRAIN_WINDOW`] and then left behind, so a grandchild holding a pipe
//! does not hold the caller.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::command::{std_command, CommandLine};
use super::options::{ExecOptions, StdioConfig};
use super::signal;
use super::streaming::DRAIN_WINDOW;
use crate::error::{OutputStream, ProcessError};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Everything a blocking launch observed.
///
/// `error` is set for launch failures, timeouts, buffer overflows and I/O
/// errors. A non-zero `status` alone is not an error at this level.
#[derive(Debug, Default)]
pub struct SpawnSyncRecord {
    /// Process id, `None` if the launch failed.
    pub pid: Option<u32>,
    /// Exit code, `None` if the child never ran or was signalled.
    pub status: Option<i32>,
    /// Terminating signal name.
    pub signal: Option<String>,
    /// Captured stdout, decoded.
    pub stdout: String,
    /// Captured stderr, decoded.
    pub stderr: String,
    /// Whether the kill signal was delivered.
    pub killed: bool,
    /// Launch, limit or I/O error, if any.
    pub error: Option<ProcessError>,
}

impl SpawnSyncRecord {
    fn failed(error: ProcessError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct Captured {
    bytes: Mutex<Vec<u8>>,
    overflowed: AtomicBool,
}

struct Capture {
    shared: Arc<Captured>,
    stream: OutputStream,
    reader: Option<JoinHandle<io::Result<()>>>,
    bytes: Vec<u8>,
}

impl Capture {
    fn start<R>(source: Option<R>, stream: OutputStream, limit: Option<usize>) -> Self
    where
        R: Read + Send + 'static,
    {
        let shared = Arc::new(Captured::default());
        let reader = source.map(|source| {
            let shared = shared.clone();
            thread::spawn(move || read_capped(source, limit, &shared))
        });
        Self {
            shared,
            stream,
            reader,
            bytes: Vec::new(),
        }
    }

    fn overflowed(&self) -> bool {
        self.shared.overflowed.load(Ordering::SeqCst)
    }

    /// Collect what the reader captured. With `drain_until` set, a reader
    /// still blocked at the deadline is left behind.
    fn finish(&mut self, drain_until: Option<Instant>) -> io::Result<()> {
        let mut result = Ok(());
        if let Some(reader) = self.reader.take() {
            if let Some(deadline) = drain_until {
                while !reader.is_finished() && Instant::now() < deadline {
                    thread::sleep(POLL_INTERVAL);
                }
            }
            if drain_until.is_none() || reader.is_finished() {
                result = reader
                    .join()
                    .map_err(|_| io::Error::other(format!("{} reader panicked", self.stream)))
                    .and_then(|read| read);
            } else {
                debug!(stream = %self.stream, "stream still open after kill, leaving reader behind");
            }
        }
        self.bytes = std::mem::take(
            &mut *self
                .shared
                .bytes
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        result
    }
}

fn read_capped<R: Read>(mut source: R, limit: Option<usize>, shared: &Captured) -> io::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let mut captured = shared.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        captured.extend_from_slice(&buf[..n]);
        if let Some(limit) = limit {
            if captured.len() > limit {
                captured.truncate(limit);
                shared.overflowed.store(true, Ordering::SeqCst);
                return Ok(());
            }
        }
    }
}

/// Run `line` to completion on the calling thread.
///
/// `stdio` is used as given; resolve it with the options first so that
/// configured input gets a stdin pipe. `limit` caps each captured stream;
/// exceeding it kills the child with the configured kill signal.
pub fn run(
    line: &CommandLine,
    options: &ExecOptions,
    stdio: StdioConfig,
    limit: Option<usize>,
) -> SpawnSyncRecord {
    let kill_signal = options.kill_signal_name();
    if let Err(error) = signal::validate(kill_signal) {
        return SpawnSyncRecord::failed(error);
    }

    let mut cmd = match std_command(line, options, stdio) {
        Ok(cmd) => cmd,
        Err(error) => return SpawnSyncRecord::failed(error),
    };
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            return SpawnSyncRecord::failed(ProcessError::launch(
                &line.program,
                "spawnSync",
                source,
            ))
        }
    };
    let pid = child.id();
    debug!(program = %line.program, pid, "blocking process launched");

    // Dropping stdin after the write closes it. Not joined: a stalled write
    // must not outlive a kill.
    if let Some(mut stdin) = child.stdin.take() {
        let input = options.input.clone().unwrap_or_default();
        thread::spawn(move || {
            if let Err(e) = stdin.write_all(&input) {
                debug!(error = %e, "child closed stdin before input was written");
            }
        });
    }

    let mut stdout = Capture::start(child.stdout.take(), OutputStream::Stdout, limit);
    let mut stderr = Capture::start(child.stderr.take(), OutputStream::Stderr, limit);

    let deadline = options.timeout.map(|timeout| Instant::now() + timeout);
    let mut timed_out = false;
    let mut kill_sent = false;
    let mut killed = false;

    let waited = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) => {}
            Err(e) => break Err(e),
        }

        if !kill_sent {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                timed_out = true;
            }
            if timed_out || stdout.overflowed() || stderr.overflowed() {
                kill_sent = true;
                debug!(pid, signal = %kill_signal, timed_out, "limit reached, killing child");
                match signal::deliver_blocking(&mut child, kill_signal) {
                    Ok(()) => killed = true,
                    Err(e) => warn!(pid, error = %e, "failed to kill child"),
                }
            }
        }

        thread::sleep(POLL_INTERVAL);
    };

    let limited = kill_sent || stdout.overflowed() || stderr.overflowed();
    let drain_until = limited.then(|| Instant::now() + DRAIN_WINDOW);
    let stdout_read = stdout.finish(drain_until);
    let stderr_read = stderr.finish(drain_until);

    let encoding = options.encoding_or_default();
    let mut record = SpawnSyncRecord {
        pid: Some(pid),
        stdout: encoding.decode(&stdout.bytes),
        stderr: encoding.decode(&stderr.bytes),
        killed,
        ..SpawnSyncRecord::default()
    };

    let status = match waited {
        Ok(status) => status,
        Err(e) => {
            record.error = Some(ProcessError::Io(e));
            return record;
        }
    };
    record.status = status.code();
    record.signal = signal::describe(&status);

    record.error = if let Some(capture) = [&stdout, &stderr].into_iter().find(|c| c.overflowed()) {
        Some(ProcessError::MaxBufferExceeded {
            stream: capture.stream,
            limit: limit.unwrap_or_default(),
        })
    } else if timed_out {
        Some(ProcessError::TimedOut {
            timeout: options.timeout.unwrap_or_default(),
        })
    } else {
        stdout_read.and(stderr_read).err().map(ProcessError::Io)
    };

    debug!(pid, status = ?record.status, signal = ?record.signal, "blocking process exited");
    record
}
