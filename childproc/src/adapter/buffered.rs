//! `exec` and `exec_file`: output buffered by the launcher.

use crate::process::buffered::{self, BufferedChild, Completion};
use crate::process::{CommandLine, ExecOptions, Shell};

use super::launch::Launch;
use super::outcome::{Failure, Outcome};
use super::{collect_args, dropped};

/// Run a command line through a shell, buffering its output.
///
/// Uses the configured shell, or the platform default when none is set.
/// Non-zero exit, timeouts and buffer overflows settle as a [`Failure`].
/// Must be called from within a Tokio runtime.
pub fn exec(command: &str, options: &ExecOptions) -> Launch {
    let shell = match options.shell {
        Shell::None => Shell::Default,
        ref configured => configured.clone(),
    };
    run(CommandLine::resolve(command, &[], &shell), command, options)
}

/// Run an executable with arguments, buffering its output.
///
/// No shell is involved unless one is configured.
/// Must be called from within a Tokio runtime.
pub fn exec_file<I, S>(file: &str, args: I, options: &ExecOptions) -> Launch
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = collect_args(args);
    run(CommandLine::resolve(file, &args, &options.shell), file, options)
}

fn run(
    line: Result<CommandLine, crate::error::ProcessError>,
    fallback_cmd: &str,
    options: &ExecOptions,
) -> Launch {
    let line = match line {
        Ok(line) => line,
        Err(error) => return Launch::failed(Failure::new(error, fallback_cmd)),
    };

    let BufferedChild { handle, completion } = buffered::launch(&line, options);
    let cmd = line.display;

    Launch::new(handle, async move {
        match completion.await {
            Ok(completion) => settle(completion, cmd),
            Err(_) => Err(dropped(cmd)),
        }
    })
}

fn settle(completion: Completion, cmd: String) -> Result<Outcome, Failure> {
    let Completion {
        error,
        stdout,
        stderr,
        code,
        signal,
        killed,
    } = completion;

    match error {
        Some(error) => Err(Failure {
            error,
            cmd,
            stdout,
            stderr,
            code,
            signal,
            killed,
        }),
        None => Ok(Outcome {
            cmd,
            stdout,
            stderr,
            code,
            signal,
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::{OutputStream, ProcessError};
    use regex::Regex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_exec_echo() {
        let outcome = exec("echo test", &ExecOptions::new().shell()).await.unwrap();

        assert!(Regex::new(r"^test[\r\n]+$").unwrap().is_match(&outcome.stdout));
        assert_eq!(outcome.code, Some(0));
        assert_eq!(outcome.cmd, "echo test");
    }

    #[tokio::test]
    async fn test_exec_unknown_command() {
        let failure = exec("eco test", &ExecOptions::new()).await.unwrap_err();

        assert!(!failure.killed);
        assert_eq!(failure.signal, None);
        assert!(failure.code.is_some_and(|code| code != 0));
        assert!(matches!(failure.error, ProcessError::NonZeroExit { .. }));
        assert!(failure.stderr.contains("eco"));
        assert_eq!(failure.cmd, "eco test");
    }

    #[tokio::test]
    async fn test_exec_file_echo_through_shell() {
        let outcome = exec_file("echo", ["test"], &ExecOptions::new().shell())
            .await
            .unwrap();

        assert!(Regex::new(r"^test[\r\n]+$").unwrap().is_match(&outcome.stdout));
    }

    #[tokio::test]
    async fn test_exec_file_not_found() {
        let failure = exec_file("eco", ["test"], &ExecOptions::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error_code().as_deref(), Some("ENOENT"));
        assert!(matches!(
            failure.error,
            ProcessError::Launch { ref path, syscall: "spawn", .. } if path == "eco"
        ));
        assert_eq!(failure.cmd, "eco test");
        assert_eq!(failure.stderr, "");
    }

    #[tokio::test]
    async fn test_handle_available_before_completion() {
        let launch = exec("exec sleep 10", &ExecOptions::new());

        assert!(launch.child().pid().is_some());
        assert!(launch.child().kill("SIGKILL").unwrap());

        let failure = launch.await.unwrap_err();
        assert!(failure.killed);
        assert_eq!(failure.signal.as_deref(), Some("SIGKILL"));
        assert!(matches!(failure.error, ProcessError::Signaled { .. }));
    }

    #[tokio::test]
    async fn test_exec_timeout() {
        let failure = exec(
            "exec sleep 10",
            &ExecOptions::new().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

        assert!(failure.killed);
        assert_eq!(failure.error_code().as_deref(), Some("ETIMEDOUT"));
    }

    #[tokio::test]
    async fn test_exec_timeout_with_lingering_grandchild() {
        let started = std::time::Instant::now();
        let failure = exec(
            "sleep 3; echo late",
            &ExecOptions::new().timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(failure.error, ProcessError::TimedOut { .. }));
        assert!(failure.killed);
    }

    #[tokio::test]
    async fn test_exec_max_buffer() {
        let failure = exec("printf abcdefgh", &ExecOptions::new().max_buffer(3))
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            ProcessError::MaxBufferExceeded {
                stream: OutputStream::Stdout,
                limit: 3
            }
        ));
        assert_eq!(failure.stdout, "abc");
    }

    #[tokio::test]
    async fn test_exec_cwd_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExecOptions::new()
            .cwd(dir.path())
            .env("CHILDPROC_GREETING", "hello");

        let outcome = exec("pwd; echo $CHILDPROC_GREETING", &options).await.unwrap();

        let mut lines = outcome.stdout.lines();
        let name = dir.path().file_name().unwrap().to_str().unwrap();
        assert!(lines.next().unwrap().ends_with(name));
        assert_eq!(lines.next(), Some("hello"));
    }

    #[tokio::test]
    async fn test_exec_custom_shell_path() {
        let outcome = exec("echo $0", &ExecOptions::new().shell_path("/bin/sh"))
            .await
            .unwrap();

        assert_eq!(outcome.stdout.trim(), "/bin/sh");
    }

    #[tokio::test]
    async fn test_exec_empty_command_fails_without_launch() {
        let launch = exec("", &ExecOptions::new());

        assert_eq!(launch.child().pid(), None);
        let failure = launch.await.unwrap_err();
        assert!(matches!(failure.error, ProcessError::InvalidArgument(_)));
    }
}
