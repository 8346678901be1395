//! Async launch with the child's streams handed back unread.
//!
//! A supervisor task owns the child: it waits for exit, applies the timeout
//! and delivers signals requested through the [`ChildHandle`]. Streams are
//! read through [`StreamReader`], which stops shortly after a limit kill so a
//! grandchild holding the pipes cannot stall the result.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::command::{tokio_command, CommandLine};
use super::handle::ChildHandle;
use super::options::{ExecOptions, StdioConfig};
use super::signal;
use crate::error::ProcessError;

/// How long readers keep draining after a limit-killed child is reaped.
pub const DRAIN_WINDOW: Duration = Duration::from_millis(100);

/// How a supervised child ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exit {
    /// Exit status, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Terminating signal name.
    pub signal: Option<String>,
    /// Whether the configured timeout fired.
    pub timed_out: bool,
    /// Whether any signal was delivered by us.
    pub killed: bool,
}

impl Exit {
    /// Error condition for an unsuccessful exit, `None` on exit code 0.
    pub fn condition(&self, timeout: Option<Duration>) -> Option<ProcessError> {
        if self.timed_out {
            return Some(ProcessError::TimedOut {
                timeout: timeout.unwrap_or_default(),
            });
        }
        match (self.code, &self.signal) {
            (Some(0), _) => None,
            (Some(code), _) => Some(ProcessError::NonZeroExit { code }),
            (None, Some(signal)) => Some(ProcessError::Signaled {
                signal: signal.clone(),
            }),
            (None, None) => Some(ProcessError::Signaled {
                signal: "unknown".to_owned(),
            }),
        }
    }
}

/// Pending exit of a supervised child.
#[derive(Debug)]
pub struct ExitFuture(JoinHandle<Result<Exit, ProcessError>>);

impl ExitFuture {
    /// Wait for the child to exit.
    pub async fn wait(self) -> Result<Exit, ProcessError> {
        match self.0.await {
            Ok(exit) => exit,
            Err(err) => Err(ProcessError::Io(io::Error::other(err))),
        }
    }
}

/// A running child whose output streams belong to the caller.
///
/// `stdout` and `stderr` are `None` when those streams are not piped.
#[derive(Debug)]
pub struct LiveChild {
    /// Control handle, shared with the supervisor.
    pub handle: ChildHandle,
    /// Piped stdout, unread.
    pub stdout: Option<ChildStdout>,
    /// Piped stderr, unread.
    pub stderr: Option<ChildStderr>,
    /// Resolves when the child has been reaped.
    pub exit: ExitFuture,
}

/// Reader over a child's output stream.
///
/// Reads until end of stream, unless the child was killed for a timeout or
/// buffer limit: then reading ends [`DRAIN_WINDOW`] after the child is
/// reaped, keeping whatever arrived in time.
#[derive(Debug)]
pub struct StreamReader<R> {
    source: R,
    handle: ChildHandle,
    drain_until: Option<Instant>,
}

impl<R: AsyncRead + Unpin> StreamReader<R> {
    pub fn new(source: R, handle: ChildHandle) -> Self {
        Self {
            source,
            handle,
            drain_until: None,
        }
    }

    /// Read the next chunk. `Ok(0)` marks the end of reading.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some(deadline) = self.drain_until {
                return tokio::time::timeout_at(deadline, self.source.read(buf))
                    .await
                    .unwrap_or(Ok(0));
            }
            tokio::select! {
                read = self.source.read(buf) => return read,
                () = self.handle.reading_stopped() => {
                    self.drain_until = Some(Instant::now() + DRAIN_WINDOW);
                }
            }
        }
    }
}

/// Launch `line` under supervision.
///
/// `stdio` is used as given; callers resolve it with the options first so
/// that configured input gets a stdin pipe. Must be called from within a
/// Tokio runtime. Input is written to stdin in the background, after which
/// stdin is closed.
pub fn launch(
    line: &CommandLine,
    options: &ExecOptions,
    stdio: StdioConfig,
) -> Result<LiveChild, ProcessError> {
    let kill_signal = options.kill_signal_name().to_owned();
    signal::validate(&kill_signal)?;

    let mut cmd = tokio_command(line, options, stdio)?;
    let mut child = cmd
        .spawn()
        .map_err(|source| ProcessError::launch(&line.program, "spawn", source))?;

    let pid = child.id();
    debug!(program = %line.program, pid = ?pid, "process launched");

    if let Some(mut stdin) = child.stdin.take() {
        if let Some(input) = options.input.clone() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(error = %e, "child closed stdin before input was written");
                }
            });
        }
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let handle = ChildHandle::new(pid, control_tx);

    let exit = tokio::spawn(supervise(
        child,
        handle.clone(),
        control_rx,
        options.timeout,
        kill_signal,
    ));

    Ok(LiveChild {
        handle,
        stdout,
        stderr,
        exit: ExitFuture(exit),
    })
}

async fn supervise(
    mut child: Child,
    handle: ChildHandle,
    mut control: mpsc::UnboundedReceiver<String>,
    timeout: Option<Duration>,
    kill_signal: String,
) -> Result<Exit, ProcessError> {
    let deadline = timeout.map(|duration| Instant::now() + duration);
    let mut timed_out = false;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            Some(name) = control.recv() => {
                match signal::deliver(&mut child, &name) {
                    Ok(()) => handle.mark_killed(),
                    Err(e) => warn!(pid = ?handle.pid(), signal = %name, error = %e, "failed to signal child"),
                }
            }
            () = expire(deadline), if !timed_out => {
                timed_out = true;
                handle.mark_limited();
                debug!(pid = ?handle.pid(), signal = %kill_signal, "timeout elapsed, killing child");
                match signal::deliver(&mut child, &kill_signal) {
                    Ok(()) => handle.mark_killed(),
                    Err(e) => warn!(pid = ?handle.pid(), error = %e, "failed to kill timed out child"),
                }
            }
        }
    };
    control.close();
    handle.mark_exited();
    if handle.limited() {
        handle.stop_reading();
    }

    let exit = Exit {
        code: status.code(),
        signal: signal::describe(&status),
        timed_out,
        killed: handle.killed(),
    };
    debug!(pid = ?handle.pid(), code = ?exit.code, signal = ?exit.signal, "process exited");
    Ok(exit)
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
