//! Normalized results shared by every operation.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::error::ProcessError;

/// Successful run of a child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// The invocation, space-joined.
    pub cmd: String,
    /// Captured standard output, decoded.
    pub stdout: String,
    /// Captured standard error, decoded.
    pub stderr: String,
    /// Exit status (0 for every outcome produced by this crate).
    pub code: Option<i32>,
    /// Terminating signal, if any.
    pub signal: Option<String>,
}

/// Unsuccessful run of a child process.
///
/// `code` is the numeric exit status when the child exited; the symbolic
/// error code of the condition is available through [`Failure::error_code`].
#[derive(Debug, Error)]
#[error("command failed: {cmd}: {error}")]
pub struct Failure {
    /// What went wrong.
    #[source]
    pub error: ProcessError,
    /// The invocation, space-joined.
    pub cmd: String,
    /// Standard output captured before the failure.
    pub stdout: String,
    /// Standard error captured before the failure.
    pub stderr: String,
    /// Exit status, if the child exited.
    pub code: Option<i32>,
    /// Terminating signal, if any.
    pub signal: Option<String>,
    /// Whether this crate (or the caller, through the handle) signaled the child.
    pub killed: bool,
}

impl Failure {
    /// Failure with no output or status attached.
    pub fn new(error: ProcessError, cmd: impl Into<String>) -> Self {
        Self {
            error,
            cmd: cmd.into(),
            stdout: String::new(),
            stderr: String::new(),
            code: None,
            signal: None,
            killed: false,
        }
    }

    /// Symbolic code of the condition, e.g. `ENOENT` or `ETIMEDOUT`.
    pub fn error_code(&self) -> Option<String> {
        self.error.code()
    }

    /// Whether the program could not be found.
    pub fn is_not_found(&self) -> bool {
        self.error.is_not_found()
    }
}

impl Serialize for Failure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Failure", 8)?;
        state.serialize_field("message", &self.error.to_string())?;
        state.serialize_field("error_code", &self.error_code())?;
        state.serialize_field("cmd", &self.cmd)?;
        state.serialize_field("stdout", &self.stdout)?;
        state.serialize_field("stderr", &self.stderr)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("signal", &self.signal)?;
        state.serialize_field("killed", &self.killed)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_failure_display_and_source() {
        let failure = Failure::new(ProcessError::NonZeroExit { code: 3 }, "make all");

        assert_eq!(failure.to_string(), "command failed: make all: exited with code 3");
        let source = std::error::Error::source(&failure).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("exited with code 3"));
    }

    #[test]
    fn test_failure_serializes_flat() {
        let mut failure = Failure::new(
            ProcessError::launch("eco", "spawn", io::Error::from(io::ErrorKind::NotFound)),
            "eco test",
        );
        failure.stderr = String::new();

        let json = serde_json::to_value(&failure).unwrap();

        assert_eq!(json["message"], "spawn eco ENOENT");
        assert_eq!(json["error_code"], "ENOENT");
        assert_eq!(json["cmd"], "eco test");
        assert_eq!(json["code"], serde_json::Value::Null);
        assert_eq!(json["killed"], false);
    }

    #[test]
    fn test_outcome_round_trips_through_json() {
        let outcome = Outcome {
            cmd: "echo test".to_owned(),
            stdout: "test\n".to_owned(),
            stderr: String::new(),
            code: Some(0),
            signal: None,
        };

        let json = serde_json::to_string(&outcome).unwrap();
        let back: Outcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
