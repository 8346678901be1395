//! Child processes behind async and blocking calls with one result shape.
//!
//! Four async operations and three blocking ones cover the common ways of
//! running a program:
//!
//! | async                  | blocking                    | output                 |
//! |------------------------|-----------------------------|------------------------|
//! | [`exec`]               | [`exec_sync`]               | buffered, via a shell  |
//! | [`exec_file`]          | [`exec_file_sync`]          | buffered, direct       |
//! | [`spawn`]              | [`spawn_sync`]              | accumulated from pipes |
//! | [`fork`]               |                             | module via interpreter |
//!
//! All of them settle into `Result<Outcome, Failure>`. The async ones return
//! a [`Launch`] right away so the child can be signaled before it finishes.
//!
//! ```rust,no_run
//! use childproc::{exec, ExecOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     match exec("echo test", &ExecOptions::new()).await {
//!         Ok(outcome) => print!("{}", outcome.stdout),
//!         Err(failure) => eprintln!("{failure} ({})", failure.stderr),
//!     }
//! }
//! ```

pub mod adapter;
pub mod error;
pub mod process;

pub use adapter::{
    exec, exec_file, exec_file_sync, exec_sync, fork, spawn, spawn_sync, Failure, Launch, Outcome,
};
pub use error::{OutputStream, ProcessError};
pub use process::{ChildHandle, Encoding, ExecOptions, Shell, StdioConfig, StdioMode};
