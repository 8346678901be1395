//! Turning a program, its arguments and options into an OS command.

use std::path::Path;

use super::options::{ExecOptions, Shell, StdioConfig};
use crate::error::ProcessError;

/// What actually gets executed for an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program handed to the OS (the shell when one is used).
    pub program: String,
    /// Arguments handed to the OS.
    pub args: Vec<String>,
    /// The invocation as the caller wrote it, space-joined.
    pub display: String,
}

impl CommandLine {
    /// Resolve `program` and `args`, wrapping them in a shell when asked.
    ///
    /// With a shell, program and arguments are joined with spaces into one
    /// command string, so shell syntax in either is interpreted.
    pub fn resolve(program: &str, args: &[String], shell: &Shell) -> Result<Self, ProcessError> {
        if program.trim().is_empty() {
            return Err(ProcessError::InvalidArgument(
                "command must not be empty".to_owned(),
            ));
        }
        if let Some(bad) = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .find(|part| part.contains('\0'))
        {
            return Err(ProcessError::InvalidArgument(format!(
                "argument contains a NUL byte: {bad:?}"
            )));
        }

        let display = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let (program, args) = match shell {
            Shell::None => (program.to_owned(), args.to_vec()),
            Shell::Default => default_shell(display.clone()),
            Shell::Path(path) => shell_at(path, display.clone()),
        };

        Ok(Self {
            program,
            args,
            display,
        })
    }
}

#[cfg(windows)]
fn default_shell(line: String) -> (String, Vec<String>) {
    let comspec = std::env::var("ComSpec").unwrap_or_else(|_| "cmd.exe".to_owned());
    (comspec, vec!["/d".into(), "/s".into(), "/c".into(), line])
}

#[cfg(not(windows))]
fn default_shell(line: String) -> (String, Vec<String>) {
    ("/bin/sh".to_owned(), vec!["-c".to_owned(), line])
}

fn shell_at(path: &Path, line: String) -> (String, Vec<String>) {
    let is_cmd = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case("cmd.exe") || name.eq_ignore_ascii_case("cmd"));
    let args = if is_cmd {
        vec!["/d".into(), "/s".into(), "/c".into(), line]
    } else {
        vec!["-c".to_owned(), line]
    };
    (path.display().to_string(), args)
}

/// Build a blocking command with cwd, environment, stdio and identity applied.
pub fn std_command(
    line: &CommandLine,
    options: &ExecOptions,
    stdio: StdioConfig,
) -> Result<std::process::Command, ProcessError> {
    let mut cmd = std::process::Command::new(&line.program);

    cmd.args(&line.args);

    if let Some(ref dir) = options.cwd {
        cmd.current_dir(dir);
    }

    if options.env_clear {
        cmd.env_clear();
    }

    for key in &options.env_remove {
        cmd.env_remove(key);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(stdio.stdin.to_std());
    cmd.stdout(stdio.stdout.to_std());
    cmd.stderr(stdio.stderr.to_std());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;

        if let Some(uid) = options.uid {
            cmd.uid(uid);
        }
        if let Some(gid) = options.gid {
            cmd.gid(gid);
        }
        if options.detached {
            cmd.process_group(0);
        }
    }

    #[cfg(not(unix))]
    {
        if options.uid.is_some() || options.gid.is_some() {
            return Err(ProcessError::InvalidArgument(
                "uid and gid are only supported on Unix".to_owned(),
            ));
        }
    }

    Ok(cmd)
}

/// Async counterpart of [`std_command`].
pub fn tokio_command(
    line: &CommandLine,
    options: &ExecOptions,
    stdio: StdioConfig,
) -> Result<tokio::process::Command, ProcessError> {
    std_command(line, options, stdio).map(tokio::process::Command::from)
}
