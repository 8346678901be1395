//! CLI argument definitions.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use childproc::{Encoding, ExecOptions, StdioConfig, StdioMode};

/// childproc - run a child process and report its outcome
#[derive(Parser, Debug)]
#[command(name = "childproc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print the outcome or failure as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available operations
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command line through a shell, buffering output
    Exec {
        /// Command line, shell syntax allowed
        command: String,

        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Run an executable directly, buffering output
    ExecFile {
        /// Path or name of the executable
        file: String,

        /// Arguments for the executable
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Run a module through an interpreter
    Fork {
        /// Module path handed to the interpreter
        module: String,

        /// Arguments for the module
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// Interpreter (defaults to this executable)
        #[arg(long)]
        exec_path: Option<PathBuf>,

        /// Argument for the interpreter, before the module path (repeatable)
        #[arg(long = "exec-arg")]
        exec_argv: Vec<String>,

        /// Capture the module's output instead of inheriting it
        #[arg(long)]
        silent: bool,

        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Launch a command and accumulate its streams
    Spawn {
        /// Command to launch
        command: String,

        /// Arguments for the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Blocking `exec`
    ExecSync {
        /// Command line, shell syntax allowed
        command: String,

        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Blocking `exec-file`
    ExecFileSync {
        /// Path or name of the executable
        file: String,

        /// Arguments for the executable
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Blocking `spawn`
    SpawnSync {
        /// Command to launch
        command: String,

        /// Arguments for the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        #[command(flatten)]
        launch: LaunchArgs,
    },
}

/// Options shared by every operation
#[derive(Args, Debug, Clone, Default)]
pub struct LaunchArgs {
    /// Working directory for the child
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Environment variable for the child, KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Start from an empty environment
    #[arg(long)]
    pub env_clear: bool,

    /// Kill the child after this many milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Per-stream capture limit in bytes
    #[arg(long)]
    pub max_buffer: Option<usize>,

    /// Signal used for timeout and buffer kills
    #[arg(long)]
    pub kill_signal: Option<String>,

    /// Run through the default shell
    #[arg(long, conflicts_with = "shell_path")]
    pub shell: bool,

    /// Run through this shell
    #[arg(long)]
    pub shell_path: Option<PathBuf>,

    /// Wiring for all three standard streams
    #[arg(long, value_enum)]
    pub stdio: Option<StdioMode>,

    /// Output encoding
    #[arg(long, value_enum)]
    pub encoding: Option<Encoding>,

    /// Run as this user id
    #[arg(long)]
    pub uid: Option<u32>,

    /// Run as this group id
    #[arg(long)]
    pub gid: Option<u32>,

    /// Start the child in its own process group
    #[arg(long)]
    pub detached: bool,

    /// Text written to the child's stdin
    #[arg(long)]
    pub input: Option<String>,
}

impl LaunchArgs {
    /// Map the flags onto launch options.
    pub fn to_options(&self) -> ExecOptions {
        let mut options = ExecOptions::new().envs(self.env.iter().cloned());

        options.cwd.clone_from(&self.cwd);
        options.env_clear = self.env_clear;
        options.timeout = self.timeout.map(Duration::from_millis);
        options.max_buffer = self.max_buffer;
        options.kill_signal.clone_from(&self.kill_signal);
        options.stdio = self.stdio.map(StdioConfig::all);
        options.encoding = self.encoding;
        options.uid = self.uid;
        options.gid = self.gid;
        options.detached = self.detached;
        options.input = self.input.clone().map(String::into_bytes);

        if let Some(ref path) = self.shell_path {
            options = options.shell_path(path);
        } else if self.shell {
            options = options.shell();
        }
        options
    }
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
