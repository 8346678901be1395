//! The pair returned by every async operation.

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use super::outcome::{Failure, Outcome};
use crate::process::ChildHandle;

type Settlement = Pin<Box<dyn Future<Output = Result<Outcome, Failure>> + Send + 'static>>;

/// A launched child: its handle right away, its result when it settles.
///
/// Awaiting a `Launch` directly is the same as calling [`Launch::wait`].
///
/// ```rust,no_run
/// use childproc::{spawn, ExecOptions};
///
/// #[tokio::main]
/// async fn main() {
///     let launch = spawn("sleep", ["30"], &ExecOptions::new());
///     let child = launch.child().clone();
///     let _ = child.kill("SIGINT");
///
///     let failure = launch.await.unwrap_err();
///     assert_eq!(failure.signal.as_deref(), Some("SIGINT"));
/// }
/// ```
pub struct Launch {
    child: ChildHandle,
    result: Settlement,
}

impl Launch {
    pub(crate) fn new<F>(child: ChildHandle, result: F) -> Self
    where
        F: Future<Output = Result<Outcome, Failure>> + Send + 'static,
    {
        Self {
            child,
            result: Box::pin(result),
        }
    }

    /// A launch that never started a process.
    pub(crate) fn failed(failure: Failure) -> Self {
        Self::new(ChildHandle::unlaunched(), async move { Err(failure) })
    }

    /// Handle to the child process.
    pub fn child(&self) -> &ChildHandle {
        &self.child
    }

    /// Wait for the result.
    pub async fn wait(self) -> Result<Outcome, Failure> {
        self.result.await
    }
}

impl IntoFuture for Launch {
    type Output = Result<Outcome, Failure>;
    type IntoFuture = Settlement;

    fn into_future(self) -> Self::IntoFuture {
        self.result
    }
}

impl std::fmt::Debug for Launch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launch")
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}
