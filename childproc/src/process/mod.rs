//! The process launcher.
//!
//! Builds OS commands from options and runs them three ways: buffered
//! (output captured up to a limit, reported on completion), streaming
//! (streams handed back unread) and blocking (the calling thread waits).

pub mod blocking;
pub mod buffered;
pub mod command;
pub mod decode;
pub mod handle;
pub mod options;
pub mod signal;
pub mod streaming;

pub use blocking::{run as spawn_blocking, SpawnSyncRecord};
pub use buffered::{BufferedChild, Completion};
pub use command::CommandLine;
pub use decode::{Encoding, StreamDecoder};
pub use handle::ChildHandle;
pub use options::{
    ExecOptions, Shell, StdioConfig, StdioMode, DEFAULT_KILL_SIGNAL, DEFAULT_MAX_BUFFER,
};
pub use streaming::{Exit, ExitFuture, LiveChild};
