//! Error conditions reported by the launcher and carried by every failure.

use std::fmt;
use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which output stream a condition refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputStream {
    /// Stream name as used in messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a launched (or attempted) process did not succeed.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started at all.
    #[error("{syscall} {path} {}", errno_name(.source))]
    Launch {
        /// Program that was being started.
        path: String,
        /// Launch primitive that failed (`spawn` or `spawnSync`).
        syscall: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The process ran and exited with a non-zero status.
    #[error("exited with code {code}")]
    NonZeroExit {
        /// Exit status.
        code: i32,
    },

    /// The process was terminated by a signal.
    #[error("terminated by signal {signal}")]
    Signaled {
        /// Signal name, e.g. `SIGKILL`.
        signal: String,
    },

    /// The configured timeout elapsed and the process was killed.
    #[error("timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        /// Configured timeout.
        timeout: Duration,
    },

    /// An output stream grew past the configured buffer limit.
    #[error("{stream} exceeded max buffer of {limit} bytes")]
    MaxBufferExceeded {
        /// Stream that overflowed.
        stream: OutputStream,
        /// Limit in bytes.
        limit: usize,
    },

    /// An option or argument could not be used.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading output or waiting on the process failed after launch.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ProcessError {
    pub(crate) fn launch(path: &str, syscall: &'static str, source: io::Error) -> Self {
        Self::Launch {
            path: path.to_owned(),
            syscall,
            source,
        }
    }

    /// Symbolic error code in the style of `errno`.
    ///
    /// Launch failures report the OS error name (`ENOENT`, `EACCES`, ...),
    /// timeouts `ETIMEDOUT` and buffer overflows `ENOBUFS`. Exit and signal
    /// conditions have no symbolic code.
    pub fn code(&self) -> Option<String> {
        match self {
            Self::Launch { source, .. } => Some(errno_name(source)),
            Self::TimedOut { .. } => Some("ETIMEDOUT".to_owned()),
            Self::MaxBufferExceeded { .. } => Some("ENOBUFS".to_owned()),
            Self::Io(err) => err.raw_os_error().map(|_| errno_name(err)),
            Self::NonZeroExit { .. } | Self::Signaled { .. } | Self::InvalidArgument(_) => None,
        }
    }

    /// Whether the program could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Launch { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Name of the OS error behind `err`, e.g. `ENOENT`.
#[cfg(unix)]
pub fn errno_name(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(raw) => format!("{:?}", nix::errno::Errno::from_raw(raw)),
        None => kind_name(err.kind()),
    }
}

/// Name of the OS error behind `err`, e.g. `ENOENT`.
#[cfg(not(unix))]
pub fn errno_name(err: &io::Error) -> String {
    kind_name(err.kind())
}

fn kind_name(kind: io::ErrorKind) -> String {
    match kind {
        io::ErrorKind::NotFound => "ENOENT".to_owned(),
        io::ErrorKind::PermissionDenied => "EACCES".to_owned(),
        io::ErrorKind::BrokenPipe => "EPIPE".to_owned(),
        io::ErrorKind::TimedOut => "ETIMEDOUT".to_owned(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_message_names_errno() {
        let err = ProcessError::launch(
            "eco",
            "spawn",
            io::Error::from(io::ErrorKind::NotFound),
        );

        assert_eq!(err.to_string(), "spawn eco ENOENT");
        assert_eq!(err.code().as_deref(), Some("ENOENT"));
        assert!(err.is_not_found());
    }

    #[cfg(unix)]
    #[test]
    fn test_errno_name_from_raw_os_error() {
        let err = io::Error::from_raw_os_error(13);
        assert_eq!(errno_name(&err), "EACCES");
    }

    #[test]
    fn test_limit_conditions_have_codes() {
        let timed_out = ProcessError::TimedOut {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(timed_out.to_string(), "timed out after 250ms");
        assert_eq!(timed_out.code().as_deref(), Some("ETIMEDOUT"));

        let overflow = ProcessError::MaxBufferExceeded {
            stream: OutputStream::Stderr,
            limit: 16,
        };
        assert_eq!(overflow.to_string(), "stderr exceeded max buffer of 16 bytes");
        assert_eq!(overflow.code().as_deref(), Some("ENOBUFS"));
    }

    #[test]
    fn test_exit_conditions_have_no_code() {
        assert_eq!(ProcessError::NonZeroExit { code: 2 }.code(), None);
        assert!(!ProcessError::NonZeroExit { code: 2 }.is_not_found());
    }
}
