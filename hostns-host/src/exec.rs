//! Command execution backends

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hostns_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Builder;
use tracing::{debug, warn};

/// Trait for command execution backends
///
/// This allows for different implementations:
/// - [`Executor`] - Spawns real processes
/// - [`MockExecutor`] - Testing without spawning anything
///
/// Calls are made from inside namespace workers, so execution is blocking and
/// the spawned process inherits the namespaces of the calling thread.
///
/// # Thread Safety
/// One executor is shared by every in-flight join, so implementations must be
/// `Send + Sync`.
pub trait CommandExecutor: Send + Sync {
    /// Run `binary` with `args` and extra `KEY=VALUE` environment entries
    ///
    /// A zero `timeout` waits until the command exits.
    ///
    /// # Errors
    /// Returns [`Error::Execution`] when the command cannot be spawned or exits
    /// unsuccessfully, and [`Error::Timeout`] when it outlives `timeout`.
    fn execute(
        &self,
        envs: &[String],
        binary: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<String>;

    /// Run a command, streaming `stdin` into it through a pipe
    ///
    /// # Errors
    /// Same as [`CommandExecutor::execute`].
    fn execute_with_stdin_pipe(
        &self,
        envs: &[String],
        binary: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> Result<String>;

    /// Run a command with `stdin` as its standard input
    ///
    /// # Errors
    /// Same as [`CommandExecutor::execute`].
    fn execute_with_stdin(
        &self,
        binary: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> Result<String> {
        self.execute_with_stdin_pipe(&[], binary, args, stdin, timeout)
    }
}

/// Executor that spawns real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor;

impl Executor {
    /// Create a new executor
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn run(
        binary: &str,
        args: &[String],
        envs: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<String> {
        let mut command = Command::new(binary);
        command
            .args(args)
            .envs(parse_envs(envs)?)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        debug!(binary, ?args, ?timeout, "Executing command");

        // Callers run on namespace workers or blocking threads, outside async context
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let output = runtime.block_on(async {
            let mut child = command.spawn().map_err(|e| Error::Execution {
                binary: binary.to_string(),
                exit_code: None,
                message: format!("{}: {e}", describe(binary, args)),
            })?;

            let pipe = child.stdin.take();
            let writer = async move {
                if let (Some(mut pipe), Some(input)) = (pipe, stdin) {
                    if let Err(e) = pipe.write_all(input.as_bytes()).await {
                        debug!(error = %e, "Failed to write command stdin");
                    }
                }
            };
            let finished = async {
                let ((), output) = tokio::join!(writer, child.wait_with_output());
                output
            };

            let output = if timeout.is_zero() {
                finished.await
            } else if let Ok(output) = tokio::time::timeout(timeout, finished).await {
                output
            } else {
                warn!(binary, ?timeout, "Command timed out, killed");
                return Err(Error::Timeout {
                    operation: format!("executing {}", describe(binary, args)),
                    timeout,
                });
            };

            output.map_err(|e| Error::Execution {
                binary: binary.to_string(),
                exit_code: None,
                message: format!("{}: wait failed: {e}", describe(binary, args)),
            })
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::Execution {
            binary: binary.to_string(),
            exit_code: output.status.code(),
            message: format!(
                "{}, output {stdout:?}, stderr {stderr:?}: {}",
                describe(binary, args),
                output.status
            ),
        })
    }
}

impl CommandExecutor for Executor {
    fn execute(
        &self,
        envs: &[String],
        binary: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<String> {
        Self::run(binary, args, envs, None, timeout)
    }

    fn execute_with_stdin_pipe(
        &self,
        envs: &[String],
        binary: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> Result<String> {
        Self::run(binary, args, envs, Some(stdin), timeout)
    }
}

fn describe(binary: &str, args: &[String]) -> String {
    if args.is_empty() {
        binary.to_string()
    } else {
        format!("{binary} {}", args.join(" "))
    }
}

/// Split `KEY=VALUE` entries
fn parse_envs(envs: &[String]) -> Result<Vec<(&str, &str)>> {
    envs.iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key, value)),
            _ => Err(Error::InvalidConfig {
                message: format!("environment entry must be KEY=VALUE: {entry:?}"),
            }),
        })
        .collect()
}

/// A command recorded by [`MockExecutor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    /// Extra environment entries
    pub envs: Vec<String>,
    /// Binary name
    pub binary: String,
    /// Arguments
    pub args: Vec<String>,
    /// Standard input, if any
    pub stdin: Option<String>,
    /// Timeout passed by the caller
    pub timeout: Duration,
}

/// Mock executor for testing (doesn't spawn processes)
///
/// # Example
/// ```
/// use std::time::Duration;
/// use hostns_host::{CommandExecutor, MockExecutor};
///
/// let executor = MockExecutor::new();
///
/// let output = executor
///     .execute(&[], "cryptsetup", &["status".to_string()], Duration::ZERO)
///     .unwrap();
///
/// assert_eq!(output, "output");
/// assert_eq!(executor.last_call().unwrap().binary, "cryptsetup");
/// ```
#[derive(Clone)]
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    calls: Vec<ExecCall>,
    output: String,
    failure: Option<(Option<i32>, String)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            output: "output".to_string(),
            failure: None,
        }
    }
}

impl MockExecutor {
    /// Create a mock that answers every command with `"output"`
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Answer every command with `output`
    #[must_use]
    pub fn with_output(self, output: impl Into<String>) -> Self {
        self.state().output = output.into();
        self
    }

    /// Fail every command with an [`Error::Execution`]
    #[must_use]
    pub fn with_failure(self, exit_code: Option<i32>, message: impl Into<String>) -> Self {
        self.state().failure = Some((exit_code, message.into()));
        self
    }

    /// Commands recorded so far
    #[must_use]
    pub fn calls(&self) -> Vec<ExecCall> {
        self.state().calls.clone()
    }

    /// Get the number of commands executed (for testing)
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Most recent command
    #[must_use]
    pub fn last_call(&self) -> Option<ExecCall> {
        self.state().calls.last().cloned()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: ExecCall) -> Result<String> {
        let mut state = self.state();

        tracing::debug!(
            binary = %call.binary,
            args = ?call.args,
            "Mock: Executed command"
        );

        let binary = call.binary.clone();
        state.calls.push(call);

        match &state.failure {
            Some((exit_code, message)) => Err(Error::Execution {
                binary,
                exit_code: *exit_code,
                message: message.clone(),
            }),
            None => Ok(state.output.clone()),
        }
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockExecutor").finish_non_exhaustive()
    }
}

impl CommandExecutor for MockExecutor {
    fn execute(
        &self,
        envs: &[String],
        binary: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<String> {
        self.record(ExecCall {
            envs: envs.to_vec(),
            binary: binary.to_string(),
            args: args.to_vec(),
            stdin: None,
            timeout,
        })
    }

    fn execute_with_stdin_pipe(
        &self,
        envs: &[String],
        binary: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> Result<String> {
        self.record(ExecCall {
            envs: envs.to_vec(),
            binary: binary.to_string(),
            args: args.to_vec(),
            stdin: Some(stdin.to_string()),
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_execute_echo() {
        let output = Executor::new()
            .execute(&[], "echo", &strings(&["hello"]), Duration::ZERO)
            .unwrap();

        assert_eq!(output, "hello\n");
    }

    #[test]
    fn test_execute_failure() {
        let err = Executor::new()
            .execute(&[], "ls", &strings(&["/not-exist"]), Duration::ZERO)
            .unwrap_err();

        assert!(err.to_string().starts_with("failed to execute"));
        assert!(matches!(err, Error::Execution { exit_code: Some(code), .. } if code != 0));
    }

    #[test]
    fn test_execute_missing_binary() {
        let err = Executor::new()
            .execute(&[], "/bin/nonexistent-binary", &[], Duration::ZERO)
            .unwrap_err();

        assert!(matches!(err, Error::Execution { exit_code: None, .. }));
    }

    #[test]
    fn test_execute_within_timeout() {
        let output = Executor::new()
            .execute(&[], "sleep", &strings(&["1"]), Duration::from_secs(5))
            .unwrap();

        assert!(output.is_empty());
    }

    #[test]
    fn test_execute_timeout() {
        let start = Instant::now();
        let err = Executor::new()
            .execute(&[], "sleep", &strings(&["5"]), Duration::from_nanos(1))
            .unwrap_err();

        assert!(err.to_string().starts_with("timeout executing"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_execute_timeout_with_inherited_stdout() {
        let start = Instant::now();
        let err = Executor::new()
            .execute(
                &[],
                "sh",
                &strings(&["-c", "sleep 5 & echo started"]),
                Duration::from_secs(1),
            )
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().starts_with("timeout executing sh -c"));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_execute_large_output() {
        let output = Executor::new()
            .execute(
                &[],
                "sh",
                &strings(&["-c", "head -c 1000000 /dev/zero | tr '\\0' a"]),
                Duration::from_secs(10),
            )
            .unwrap();

        assert_eq!(output.len(), 1_000_000);
        assert!(output.bytes().all(|b| b == b'a'));
    }

    #[test]
    fn test_execute_with_envs() {
        let output = Executor::new()
            .execute(&strings(&["K1=V1", "K2=V2"]), "env", &[], Duration::ZERO)
            .unwrap();

        assert!(output.contains("K1=V1\n"));
        assert!(output.contains("K2=V2\n"));
    }

    #[test]
    fn test_execute_invalid_env() {
        let err = Executor::new()
            .execute(&strings(&["NOVALUE"]), "env", &[], Duration::ZERO)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_execute_with_stdin() {
        let output = Executor::new()
            .execute_with_stdin(
                "bash",
                &strings(&["-c", "read input; echo ${input}"]),
                "foo",
                Duration::from_secs(10),
            )
            .unwrap();

        assert_eq!(output, "foo\n");
    }

    #[test]
    fn test_execute_with_stdin_pipe() {
        let output = Executor::new()
            .execute_with_stdin_pipe(
                &[],
                "wc",
                &strings(&["-c"]),
                "count me",
                Duration::from_secs(10),
            )
            .unwrap();

        assert_eq!(output.trim(), "8");
    }

    #[test]
    fn test_execute_with_stdin_pipe_timeout() {
        let result = Executor::new().execute_with_stdin_pipe(
            &[],
            "sleep",
            &strings(&["1"]),
            "ignore me",
            Duration::from_nanos(1),
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_mock_executor_records_calls() {
        let executor = MockExecutor::new();

        executor
            .execute(&[], "binary", &strings(&["arg1", "arg2"]), Duration::ZERO)
            .unwrap();
        executor
            .execute_with_stdin_pipe(&[], "binary", &[], "secret", Duration::ZERO)
            .unwrap();

        assert_eq!(executor.call_count(), 2);
        let calls = executor.calls();
        assert_eq!(calls[0].args, strings(&["arg1", "arg2"]));
        assert_eq!(calls[1].stdin.as_deref(), Some("secret"));
    }

    #[test]
    fn test_mock_executor_failure() {
        let executor = MockExecutor::new().with_failure(Some(1), "not a LUKS device");

        let err = executor
            .execute(&[], "cryptsetup", &[], Duration::ZERO)
            .unwrap_err();

        assert!(matches!(err, Error::Execution { exit_code: Some(1), .. }));
        assert_eq!(executor.call_count(), 1);
    }
}
