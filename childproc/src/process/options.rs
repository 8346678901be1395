//! Launch configuration shared by every operation.
//!
//! Options are forwarded to the launcher as given. Apart from the encoding
//! default, nothing here is interpreted by the adapter layer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::decode::Encoding;

/// Default per-stream capture limit for buffered launches, in bytes.
pub const DEFAULT_MAX_BUFFER: usize = 200 * 1024;

/// Signal sent when a timeout or buffer limit kills the child.
pub const DEFAULT_KILL_SIGNAL: &str = "SIGTERM";

/// How one standard stream of the child is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StdioMode {
    /// Connect a pipe to the parent.
    Pipe,
    /// Share the parent's stream.
    Inherit,
    /// Connect to the null device.
    Ignore,
}

impl StdioMode {
    pub(crate) fn to_std(self) -> std::process::Stdio {
        match self {
            Self::Pipe => std::process::Stdio::piped(),
            Self::Inherit => std::process::Stdio::inherit(),
            Self::Ignore => std::process::Stdio::null(),
        }
    }
}

/// Wiring of stdin, stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioConfig {
    pub stdin: StdioMode,
    pub stdout: StdioMode,
    pub stderr: StdioMode,
}

impl StdioConfig {
    /// Same mode for all three streams.
    pub const fn all(mode: StdioMode) -> Self {
        Self {
            stdin: mode,
            stdout: mode,
            stderr: mode,
        }
    }

    /// Inherit all three streams from the parent.
    pub const fn inherit() -> Self {
        Self::all(StdioMode::Inherit)
    }

    /// Pipe stdout and stderr, no stdin.
    pub const fn piped() -> Self {
        Self {
            stdin: StdioMode::Ignore,
            stdout: StdioMode::Pipe,
            stderr: StdioMode::Pipe,
        }
    }
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self::piped()
    }
}

/// Shell selection for a launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Shell {
    /// Execute the program directly.
    #[default]
    None,
    /// `/bin/sh -c` on Unix, `cmd.exe /d /s /c` on Windows.
    Default,
    /// A specific shell that understands `-c`.
    Path(PathBuf),
}

/// Configuration options for launching a process.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory for the process.
    pub cwd: Option<PathBuf>,

    /// Environment variables to set (merged with current env).
    pub env: HashMap<String, String>,

    /// Environment variables to remove.
    pub env_remove: Vec<String>,

    /// Whether to clear the environment before adding env vars.
    pub env_clear: bool,

    /// Text encoding for captured output (UTF-8 when unset).
    pub encoding: Option<Encoding>,

    /// Kill the process once this much time has passed.
    pub timeout: Option<Duration>,

    /// Per-stream capture limit in bytes for buffered and blocking launches.
    pub max_buffer: Option<usize>,

    /// Signal used for timeout and buffer-limit kills.
    pub kill_signal: Option<String>,

    /// User identity of the process (Unix).
    pub uid: Option<u32>,

    /// Group identity of the process (Unix).
    pub gid: Option<u32>,

    /// Stream wiring. Each operation has its own default.
    pub stdio: Option<StdioConfig>,

    /// Shell selection.
    pub shell: Shell,

    /// Start the process in its own process group (Unix).
    pub detached: bool,

    /// Bytes written to stdin before it is closed.
    pub input: Option<Vec<u8>>,

    /// Interpreter used by `fork` (defaults to the current executable).
    pub exec_path: Option<PathBuf>,

    /// Arguments passed to the `fork` interpreter before the module path.
    pub exec_argv: Vec<String>,

    /// Pipe stdout/stderr of a forked child instead of inheriting them.
    pub silent: bool,
}

impl ExecOptions {
    /// Options with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Remove an environment variable.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Clear the environment before setting variables.
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// Set the output encoding.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set a timeout for the process.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the per-stream capture limit.
    pub fn max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer = Some(bytes);
        self
    }

    /// Set the signal used for limit kills, e.g. `SIGKILL`.
    pub fn kill_signal(mut self, signal: impl Into<String>) -> Self {
        self.kill_signal = Some(signal.into());
        self
    }

    /// Run as the given user id.
    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Run as the given group id.
    pub fn gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    /// Set the stream wiring.
    pub fn stdio(mut self, stdio: StdioConfig) -> Self {
        self.stdio = Some(stdio);
        self
    }

    /// Run through the platform's default shell.
    pub fn shell(mut self) -> Self {
        self.shell = Shell::Default;
        self
    }

    /// Run through a specific shell.
    pub fn shell_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.shell = Shell::Path(path.into());
        self
    }

    /// Start in a new process group.
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    /// Feed bytes to the child's stdin.
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set the interpreter used by `fork`.
    pub fn exec_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exec_path = Some(path.into());
        self
    }

    /// Add an interpreter argument for `fork`.
    pub fn exec_arg(mut self, arg: impl Into<String>) -> Self {
        self.exec_argv.push(arg.into());
        self
    }

    /// Pipe a forked child's output instead of inheriting it.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub(crate) fn encoding_or_default(&self) -> Encoding {
        self.encoding.unwrap_or_default()
    }

    pub(crate) fn max_buffer_or_default(&self) -> usize {
        self.max_buffer.unwrap_or(DEFAULT_MAX_BUFFER)
    }

    pub(crate) fn kill_signal_name(&self) -> &str {
        self.kill_signal.as_deref().unwrap_or(DEFAULT_KILL_SIGNAL)
    }

    /// Stdio wiring with stdin forced to a pipe when input is configured.
    pub(crate) fn stdio_or(&self, fallback: StdioConfig) -> StdioConfig {
        let mut stdio = self.stdio.unwrap_or(fallback);
        if self.input.is_some() {
            stdio.stdin = StdioMode::Pipe;
        }
        stdio
    }
}
