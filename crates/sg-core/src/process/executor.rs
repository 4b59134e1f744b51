use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::security::input::ValidatedHostname;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{program} exited with status {code}: {diagnostic}")]
    NonZeroExit {
        program: &'static str,
        code: i32,
        diagnostic: String,
    },
    #[error("{program} was terminated by a signal: {diagnostic}")]
    Terminated {
        program: &'static str,
        diagnostic: String,
    },
    #[error("{program} did not finish within {timeout:?}")]
    TimedOut {
        program: &'static str,
        timeout: Duration,
    },
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ExecutionError {
    /// Exit status of the program, when it exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Captured stderr for failures that produced any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { diagnostic, .. } | Self::Terminated { diagnostic, .. } => {
                Some(diagnostic.as_str())
            }
            _ => None,
        }
    }
}

/// Captured stdout on success, or why the invocation failed.
pub type CommandResult = Result<String, ExecutionError>;

/// A fixed program plus an ordered argument vector.
///
/// The program name is a `&'static str` and each argument is a
/// [`ValidatedHostname`], so neither half can be assembled from raw request
/// data. There is no code path that joins them into a single string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: &'static str,
    args: Vec<ValidatedHostname>,
}

impl Invocation {
    pub fn new(program: &'static str, args: &[ValidatedHostname]) -> Self {
        Self {
            program,
            args: args.to_vec(),
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    pub fn args(&self) -> &[ValidatedHostname] {
        &self.args
    }

    /// Argument tokens exactly as they are handed to the program.
    pub fn argv(&self) -> Vec<&str> {
        self.args.iter().map(ValidatedHostname::as_str).collect()
    }
}

/// Something that can carry out an [`Invocation`].
///
/// Dropping the returned future abandons the invocation. Implementations
/// that start a process must stop it when that happens.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, invocation: &Invocation) -> impl Future<Output = CommandResult> + Send;
}

/// Run `program` with `args` on `executor`.
pub async fn run<E: CommandExecutor>(
    executor: &E,
    program: &'static str,
    args: &[ValidatedHostname],
) -> CommandResult {
    let invocation = Invocation::new(program, args);
    executor.execute(&invocation).await
}

/// Spawns programs directly with `tokio::process::Command`.
///
/// Each argument is passed with `.arg()`, never through `sh -c`, so `;`, `|`,
/// `$()` and friends have no meaning even if they somehow got past
/// validation. The child is killed when the execution future is dropped,
/// which is also how an expired timeout stops it.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    timeout: Option<Duration>,
    search_path: Option<OsString>,
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    /// Resolve programs against `path` instead of the inherited `PATH`.
    /// The child sees the same value.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(invocation.program());
        for arg in invocation.args() {
            cmd.arg(arg.as_str());
        }
        if let Some(path) = &self.search_path {
            cmd.env("PATH", path);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl CommandExecutor for SystemExecutor {
    async fn execute(&self, invocation: &Invocation) -> CommandResult {
        let program = invocation.program();
        debug!(program, argv = ?invocation.argv(), "Spawning");

        // The deadline covers the whole wait, including pipe EOF, so a
        // descendant holding stdout cannot keep the caller past it.
        let output = self.command(invocation).output();
        let output = match self.timeout {
            None => output.await,
            Some(timeout) => match tokio::time::timeout(timeout, output).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(program, ?timeout, "Deadline expired, killing child");
                    return Err(ExecutionError::TimedOut { program, timeout });
                }
            },
        };

        match output {
            Ok(output) => finish(program, &output),
            Err(source) => Err(ExecutionError::Spawn { program, source }),
        }
    }
}

fn finish(program: &'static str, output: &Output) -> CommandResult {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }
    let diagnostic = String::from_utf8_lossy(&output.stderr).into_owned();
    match output.status.code() {
        Some(code) => {
            debug!(program, code, "Program exited with failure");
            Err(ExecutionError::NonZeroExit {
                program,
                code,
                diagnostic,
            })
        }
        None => Err(ExecutionError::Terminated {
            program,
            diagnostic,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::field::UntrustedField;
    use crate::security::input::validate_hostname;
    use std::sync::Mutex;
    use std::time::Instant;

    fn host(s: &str) -> ValidatedHostname {
        validate_hostname(Some(&UntrustedField::new(s))).unwrap()
    }

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<Invocation>>,
    }

    impl CommandExecutor for RecordingExecutor {
        async fn execute(&self, invocation: &Invocation) -> CommandResult {
            self.calls.lock().unwrap().push(invocation.clone());
            Ok(format!("ran {}", invocation.program()))
        }
    }

    /// Writes an executable `sh` script named `name` into `dir`.
    #[cfg(unix)]
    fn script(dir: &std::path::Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    fn search_path(dir: &std::path::Path) -> String {
        format!("{}:/usr/bin:/bin", dir.display())
    }

    #[tokio::test]
    async fn test_invocation_keeps_one_token_per_argument() {
        let recorder = RecordingExecutor::default();
        let out = run(&recorder, "nslookup", &[host("example.com")]).await.unwrap();
        assert_eq!(out, "ran nslookup");

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program(), "nslookup");
        assert_eq!(calls[0].argv(), vec!["example.com"]);
    }

    #[test]
    fn test_execution_error_accessors() {
        let err = ExecutionError::NonZeroExit {
            program: "nslookup",
            code: 1,
            diagnostic: "server can't find x: NXDOMAIN".into(),
        };
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.diagnostic(), Some("server can't find x: NXDOMAIN"));
        assert!(err.to_string().contains("NXDOMAIN"));

        let timed_out = ExecutionError::TimedOut {
            program: "nslookup",
            timeout: Duration::from_secs(1),
        };
        assert_eq!(timed_out.exit_code(), None);
        assert_eq!(timed_out.diagnostic(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_executor_captures_stdout() {
        let exec = SystemExecutor::new();
        let out = run(&exec, "echo", &[host("a.b"), host("c-d")]).await.unwrap();
        assert_eq!(out, "a.b c-d\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_executor_with_timeout_captures_stdout() {
        let exec = SystemExecutor::with_timeout(Duration::from_secs(5));
        let out = run(&exec, "echo", &[host("example.com")]).await.unwrap();
        assert_eq!(out, "example.com\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_executor_non_zero_exit() {
        let err = run(&SystemExecutor::new(), "false", &[]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::NonZeroExit { code: 1, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_executor_captures_stderr() {
        let err = run(&SystemExecutor::new(), "ls", &[host("no-such-file.invalid")])
            .await
            .unwrap_err();
        let diagnostic = err.diagnostic().unwrap();
        assert!(diagnostic.contains("no-such-file.invalid"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_executor_kills_on_timeout() {
        let exec = SystemExecutor::with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = run(&exec, "sleep", &[host("5")]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::TimedOut { program: "sleep", .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_holds_when_descendant_keeps_stdout_open() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), "nslookup", "echo hi\nsleep 3 &\nexit 0");

        let exec = SystemExecutor::with_timeout(Duration::from_millis(300))
            .with_search_path(search_path(dir.path()));
        let started = Instant::now();
        let err = run(&exec, "nslookup", &[host("example.com")]).await.unwrap_err();

        assert!(matches!(err, ExecutionError::TimedOut { program: "nslookup", .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_execution_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        script(
            dir.path(),
            "nslookup",
            &format!("sleep 1\ntouch '{}'", marker.display()),
        );

        let exec = SystemExecutor::new().with_search_path(search_path(dir.path()));
        let abandoned = tokio::time::timeout(
            Duration::from_millis(200),
            run(&exec, "nslookup", &[host("example.com")]),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = run(&SystemExecutor::new(), "definitely-not-a-real-program-sg", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
    }
}
