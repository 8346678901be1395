//! `spawn` and `fork`: output accumulated here, chunk by chunk.

use std::io;

use tokio::io::AsyncRead;

use crate::error::ProcessError;
use crate::process::streaming::{self, LiveChild, StreamReader};
use crate::process::ChildHandle;
use crate::process::{CommandLine, Encoding, ExecOptions, StdioConfig};

use super::launch::Launch;
use super::outcome::{Failure, Outcome};
use super::{collect_args, dropped};

/// Launch a command and accumulate whatever it writes to piped streams.
///
/// Exit code 0 settles as an [`Outcome`]; a non-zero code, a terminating
/// signal, a timeout or a launch error settles as a [`Failure`]. Streams
/// that are not piped are left alone. Must be called from within a Tokio
/// runtime.
pub fn spawn<I, S>(command: &str, args: I, options: &ExecOptions) -> Launch
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = collect_args(args);
    let stdio = options.stdio_or(StdioConfig::default());
    run(command, &args, options, stdio)
}

/// Run `module_path` through an interpreter.
///
/// Executes `exec_path exec_argv... module_path args...`, where `exec_path`
/// defaults to the current executable. Stdio is inherited unless `silent`
/// is set (then stdout and stderr are piped) or stdio is configured
/// explicitly. Must be called from within a Tokio runtime.
pub fn fork<I, S>(module_path: &str, args: I, options: &ExecOptions) -> Launch
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let exec_path = match options.exec_path {
        Some(ref path) => path.clone(),
        None => match std::env::current_exe() {
            Ok(path) => path,
            Err(e) => return Launch::failed(Failure::new(ProcessError::Io(e), module_path)),
        },
    };

    let mut argv = options.exec_argv.clone();
    argv.push(module_path.to_owned());
    argv.extend(collect_args(args));

    let fallback = if options.silent {
        StdioConfig::piped()
    } else {
        StdioConfig::inherit()
    };
    let stdio = options.stdio_or(fallback);

    run(&exec_path.to_string_lossy(), &argv, options, stdio)
}

fn run(program: &str, args: &[String], options: &ExecOptions, stdio: StdioConfig) -> Launch {
    let line = match CommandLine::resolve(program, args, &options.shell) {
        Ok(line) => line,
        Err(error) => return Launch::failed(Failure::new(error, program)),
    };
    let cmd = line.display.clone();

    let live = match streaming::launch(&line, options, stdio) {
        Ok(live) => live,
        Err(error) => return Launch::failed(Failure::new(error, cmd)),
    };
    let handle = live.handle.clone();

    // Read eagerly so the child never blocks on a full pipe.
    let settlement = tokio::spawn(collect(
        live,
        options.encoding_or_default(),
        options.timeout,
        cmd.clone(),
    ));

    Launch::new(handle, async move {
        settlement.await.unwrap_or_else(|_| Err(dropped(cmd)))
    })
}

/// Decoded text of a stream, plus the read error that ended it early.
async fn accumulate<R>(
    source: Option<R>,
    handle: ChildHandle,
    encoding: Encoding,
) -> (String, Option<io::Error>)
where
    R: AsyncRead + Unpin,
{
    let Some(source) = source else {
        return (String::new(), None);
    };

    let mut reader = StreamReader::new(source, handle);
    let mut decoder = encoding.decoder();
    let mut text = String::new();
    let mut buf = [0u8; 8192];
    let error = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break None,
            Ok(n) => text.push_str(&decoder.push(&buf[..n])),
            Err(e) => break Some(e),
        }
    };
    text.push_str(&decoder.finish());
    (text, error)
}

/// Settle once the child has exited and both streams have ended.
async fn collect(
    live: LiveChild,
    encoding: Encoding,
    timeout: Option<std::time::Duration>,
    cmd: String,
) -> Result<Outcome, Failure> {
    let LiveChild {
        handle,
        stdout,
        stderr,
        exit,
    } = live;

    let ((stdout, stdout_error), (stderr, stderr_error), exit) = tokio::join!(
        accumulate(stdout, handle.clone(), encoding),
        accumulate(stderr, handle.clone(), encoding),
        exit.wait(),
    );

    let exit = match exit {
        Ok(exit) => exit,
        Err(error) => {
            return Err(Failure {
                stdout,
                stderr,
                killed: handle.killed(),
                ..Failure::new(error, cmd)
            })
        }
    };

    let read_error = stdout_error.or(stderr_error);
    let condition = exit
        .condition(timeout)
        .or_else(|| read_error.map(ProcessError::Io));

    match condition {
        None => Ok(Outcome {
            cmd,
            stdout,
            stderr,
            code: exit.code,
            signal: exit.signal,
        }),
        Some(error) => Err(Failure {
            error,
            cmd,
            stdout,
            stderr,
            code: exit.code,
            signal: exit.signal,
            killed: exit.killed,
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::adapter::spawn_sync;
    use crate::process::StdioMode;
    use regex::Regex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_echo() {
        let outcome = spawn("echo", ["test"], &ExecOptions::new().shell())
            .await
            .unwrap();

        assert_eq!(outcome.code, Some(0));
        assert_eq!(outcome.signal, None);
        assert!(Regex::new(r"^test[\r\n]+$").unwrap().is_match(&outcome.stdout));
    }

    #[tokio::test]
    async fn test_spawn_not_found() {
        let launch = spawn("eco", ["test"], &ExecOptions::new());
        assert_eq!(launch.child().pid(), None);

        let failure = launch.await.unwrap_err();

        assert_eq!(failure.error_code().as_deref(), Some("ENOENT"));
        assert!(failure.is_not_found());
        assert!(matches!(
            failure.error,
            ProcessError::Launch { ref path, syscall: "spawn", .. } if path == "eco"
        ));
        assert_eq!(failure.stderr, "");
        assert_eq!(failure.code, None);
    }

    #[tokio::test]
    async fn test_spawn_inherit_does_not_fail() {
        let outcome = spawn(
            "echo",
            ["test"],
            &ExecOptions::new().stdio(StdioConfig::inherit()).shell(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stdout, "");
        assert_eq!(outcome.code, Some(0));
    }

    #[tokio::test]
    async fn test_spawn_non_zero_exit() {
        let failure = spawn("sh", ["-c", "echo partial; echo broken >&2; exit 3"], &ExecOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ProcessError::NonZeroExit { code: 3 }));
        assert_eq!(failure.code, Some(3));
        assert_eq!(failure.stderr, "broken\n");
        assert_eq!(failure.stdout, "partial\n");
        assert!(!failure.killed);
    }

    #[tokio::test]
    async fn test_spawn_concatenates_chunks_in_order() {
        let outcome = spawn(
            "sh",
            ["-c", "printf one; sleep 0.05; printf two; sleep 0.05; printf three"],
            &ExecOptions::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stdout, "onetwothree");
    }

    #[tokio::test]
    async fn test_spawn_keeps_stderr_on_success() {
        let outcome = spawn("sh", ["-c", "echo warn >&2"], &ExecOptions::new())
            .await
            .unwrap();

        assert_eq!(outcome.stderr, "warn\n");
    }

    #[tokio::test]
    async fn test_spawn_kill_through_handle() {
        let launch = spawn("sleep", ["10"], &ExecOptions::new());
        let child = launch.child().clone();

        assert!(child.kill("SIGINT").unwrap());
        let failure = launch.await.unwrap_err();

        assert!(failure.killed);
        assert!(child.killed());
        assert!(child.has_exited());
        assert_eq!(failure.code, None);
        assert_eq!(failure.signal.as_deref(), Some("SIGINT"));
    }

    #[tokio::test]
    async fn test_spawn_timeout() {
        let failure = spawn(
            "sleep",
            ["10"],
            &ExecOptions::new().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

        assert!(matches!(failure.error, ProcessError::TimedOut { timeout } if timeout == Duration::from_millis(100)));
        assert!(failure.killed);
        assert_eq!(failure.signal.as_deref(), Some("SIGTERM"));
    }

    #[tokio::test]
    async fn test_spawn_timeout_settles_while_grandchild_holds_pipes() {
        let started = std::time::Instant::now();
        let failure = spawn(
            "sh",
            ["-c", "echo early; sleep 3; echo late"],
            &ExecOptions::new().timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(failure.error_code().as_deref(), Some("ETIMEDOUT"));
        assert_eq!(failure.stdout, "early\n");
    }

    #[tokio::test]
    async fn test_accumulate_keeps_text_read_before_an_error() {
        let source = failing_after(b"kept", io::ErrorKind::BrokenPipe);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = ChildHandle::new(Some(1), tx);

        let (text, error) = accumulate(Some(source), handle, Encoding::Utf8).await;

        assert_eq!(text, "kept");
        assert_eq!(error.map(|e| e.kind()), Some(io::ErrorKind::BrokenPipe));
    }

    /// Yields `data` once, then fails with `kind`.
    fn failing_after(data: &'static [u8], kind: io::ErrorKind) -> impl AsyncRead + Unpin {
        use tokio::io::AsyncReadExt;
        data.chain(FailingReader(kind))
    }

    struct FailingReader(io::ErrorKind);

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Err(self.0.into()))
        }
    }

    #[tokio::test]
    async fn test_spawn_with_input() {
        let outcome = spawn("cat", Vec::<String>::new(), &ExecOptions::new().input("round trip"))
            .await
            .unwrap();

        assert_eq!(outcome.stdout, "round trip");
    }

    #[tokio::test]
    async fn test_spawn_only_stdout_piped() {
        let stdio = StdioConfig {
            stdin: StdioMode::Ignore,
            stdout: StdioMode::Pipe,
            stderr: StdioMode::Ignore,
        };
        let outcome = spawn("sh", ["-c", "echo visible; echo hidden >&2"], &ExecOptions::new().stdio(stdio))
            .await
            .unwrap();

        assert_eq!(outcome.stdout, "visible\n");
        assert_eq!(outcome.stderr, "");
    }

    #[tokio::test]
    async fn test_spawn_and_spawn_sync_agree() {
        let options = ExecOptions::new();

        let async_outcome = spawn("echo", ["test"], &options).await.unwrap();
        let sync_outcome = spawn_sync("echo", ["test"], &options).unwrap();
        assert_eq!(async_outcome.stdout, sync_outcome.stdout);
        assert_eq!(async_outcome.code, sync_outcome.code);

        let async_failure = spawn("sh", ["-c", "exit 2"], &options).await.unwrap_err();
        let sync_failure = spawn_sync("sh", ["-c", "exit 2"], &options).unwrap_err();
        assert_eq!(async_failure.code, sync_failure.code);
    }

    #[tokio::test]
    async fn test_fork_runs_module_through_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("child.sh");
        std::fs::write(&module, "echo \"forked $1\"\necho \"on stderr\" >&2\n").unwrap();

        let options = ExecOptions::new().exec_path("/bin/sh").silent();
        let outcome = fork(module.to_str().unwrap(), ["arg"], &options).await.unwrap();

        assert_eq!(outcome.stdout, "forked arg\n");
        assert_eq!(outcome.stderr, "on stderr\n");
    }

    #[tokio::test]
    async fn test_fork_inherits_stdio_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("quiet.sh");
        std::fs::write(&module, "exit 0\n").unwrap();

        let options = ExecOptions::new().exec_path("/bin/sh").exec_arg("-e");
        let outcome = fork(module.to_str().unwrap(), Vec::<String>::new(), &options)
            .await
            .unwrap();

        assert_eq!(outcome.stdout, "");
        assert_eq!(outcome.cmd, format!("/bin/sh -e {}", module.display()));
    }

    #[tokio::test]
    async fn test_fork_failing_module() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("fail.sh");
        std::fs::write(&module, "echo bad >&2\nexit 9\n").unwrap();

        let options = ExecOptions::new().exec_path("/bin/sh").silent();
        let failure = fork(module.to_str().unwrap(), Vec::<String>::new(), &options)
            .await
            .unwrap_err();

        assert_eq!(failure.code, Some(9));
        assert_eq!(failure.stderr, "bad\n");
    }
}
