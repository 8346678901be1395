//! Control handle for a launched child.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::signal;
use crate::error::ProcessError;

#[derive(Debug)]
struct HandleState {
    pid: Option<u32>,
    killed: AtomicBool,
    exited: AtomicBool,
    limited: AtomicBool,
    control: Option<mpsc::UnboundedSender<String>>,
    stop_reading: watch::Sender<bool>,
}

impl HandleState {
    fn new(pid: Option<u32>, control: Option<mpsc::UnboundedSender<String>>) -> Self {
        Self {
            pid,
            killed: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            limited: AtomicBool::new(false),
            control,
            stop_reading: watch::channel(false).0,
        }
    }
}

/// Handle to a live (or failed-to-launch) child process.
///
/// Available as soon as an async operation returns, before its result
/// settles. Clones refer to the same child.
#[derive(Debug, Clone)]
pub struct ChildHandle {
    state: Arc<HandleState>,
}

impl ChildHandle {
    pub(crate) fn new(pid: Option<u32>, control: mpsc::UnboundedSender<String>) -> Self {
        Self {
            state: Arc::new(HandleState::new(pid, Some(control))),
        }
    }

    /// Handle for a child that never started.
    pub(crate) fn unlaunched() -> Self {
        Self {
            state: Arc::new(HandleState::new(None, None)),
        }
    }

    /// OS process id, `None` when the launch failed.
    pub fn pid(&self) -> Option<u32> {
        self.state.pid
    }

    /// Ask the supervisor to deliver `signal` to the child.
    ///
    /// `Ok(true)` means the request was queued, not that it was delivered: a
    /// child that exits at the same moment is reaped without it. Check
    /// [`killed`](Self::killed) for delivery. Returns `Ok(false)` when there
    /// is nothing to signal: the child never started or has already exited.
    pub fn kill(&self, signal: &str) -> Result<bool, ProcessError> {
        signal::validate(signal)?;

        let Some(ref control) = self.state.control else {
            return Ok(false);
        };
        if self.has_exited() {
            return Ok(false);
        }
        Ok(control.send(signal.to_owned()).is_ok())
    }

    /// Whether a signal was successfully delivered to the child.
    pub fn killed(&self) -> bool {
        self.state.killed.load(Ordering::SeqCst)
    }

    /// Whether the child has been reaped.
    pub fn has_exited(&self) -> bool {
        self.state.exited.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_killed(&self) {
        self.state.killed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_exited(&self) {
        self.state.exited.store(true, Ordering::SeqCst);
    }

    /// Kill because a timeout or buffer limit was hit.
    ///
    /// Once the child is reaped after such a kill, stream readers get a
    /// short window to drain and then stop, even if a grandchild still holds
    /// the pipes open.
    pub(crate) fn kill_for_limit(&self, signal: &str) -> Result<bool, ProcessError> {
        self.state.limited.store(true, Ordering::SeqCst);
        if self.has_exited() {
            self.stop_reading();
        }
        self.kill(signal)
    }

    pub(crate) fn mark_limited(&self) {
        self.state.limited.store(true, Ordering::SeqCst);
    }

    pub(crate) fn limited(&self) -> bool {
        self.state.limited.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_reading(&self) {
        self.state.stop_reading.send_replace(true);
    }

    /// Resolves once readers should stop waiting for end of stream.
    pub(crate) async fn reading_stopped(&self) {
        let mut stopped = self.state.stop_reading.subscribe();
        if stopped.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
