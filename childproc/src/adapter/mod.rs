//! The six process operations (plus blocking variants) and their results.
//!
//! Every operation is a free function; none needs a shared instance. Async
//! operations return a [`Launch`] immediately, carrying the child's handle,
//! and settle into `Result<Outcome, Failure>`. Blocking operations return that
//! result directly.

mod blocking;
mod buffered;
mod launch;
mod outcome;
mod streaming;

use std::io;

pub use blocking::{exec_file_sync, exec_sync, spawn_sync};
pub use buffered::{exec, exec_file};
pub use launch::Launch;
pub use outcome::{Failure, Outcome};
pub use streaming::{fork, spawn};

use crate::error::ProcessError;

fn collect_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

/// The task settling a launch went away without a result.
fn dropped(cmd: String) -> Failure {
    Failure::new(
        ProcessError::Io(io::Error::other("process task was dropped before completion")),
        cmd,
    )
}
