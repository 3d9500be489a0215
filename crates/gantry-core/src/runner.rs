//! External process execution for lifecycle steps.
//!
//! Every tool gantry touches — linters, test runners, build commands, git,
//! the changelog editor — goes through [`run`], so dry-run and
//! strict-failure semantics stay uniform across the whole workflow.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Exit code carried by synthetic dry-run results.
///
/// Non-zero so a rehearsed invocation can never be mistaken for a real
/// success when only the raw code is inspected.
pub const DRY_RUN_EXIT_CODE: i32 = 2;

/// Errors from command execution.
#[derive(Error, Debug)]
pub enum RunError {
    /// The argument vector was empty.
    #[error("empty command line")]
    EmptyCommand,

    /// The process could not be spawned at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// The command line that could not be spawned.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A strict invocation exited with a non-zero status.
    #[error("command `{command}` failed{}", fmt_code(*code))]
    Failed {
        /// The command line that failed.
        command: String,
        /// The exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured stderr (empty when output was not captured).
        stderr: String,
    },
}

fn fmt_code(code: Option<i32>) -> String {
    code.map_or_else(String::new, |c| format!(" with exit code {c}"))
}

/// Result alias for runner operations.
pub type RunResult<T> = Result<T, RunError>;

/// Options for a single invocation.
///
/// Enumerated explicitly — there is no open-ended passthrough to the
/// underlying process API.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Substitute a no-op for the real process.
    pub dry_run: bool,
    /// Treat a non-zero exit as [`RunError::Failed`].
    pub strict: bool,
    /// Capture stdout/stderr instead of inheriting the terminal.
    pub capture: bool,
    /// Working directory for the child process.
    pub cwd: Option<Utf8PathBuf>,
    /// Route through `sh -c` (discouraged; logs a warning).
    pub shell: bool,
}

impl RunOptions {
    /// Default options: real execution, non-strict, inherited stdio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set dry-run mode.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Treat a non-zero exit status as an error.
    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Capture stdout and stderr.
    #[must_use]
    pub const fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Run the child in the given working directory.
    #[must_use]
    pub fn cwd<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Route the command through `sh -c`.
    #[must_use]
    pub const fn shell(mut self) -> Self {
        self.shell = true;
        self
    }
}

/// The observed result of one command invocation.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Rendered command line, for messages.
    pub command: String,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Captured stdout (empty unless capture was requested).
    pub stdout: String,
    /// Captured stderr (empty unless capture was requested).
    pub stderr: String,
    /// Whether a process actually ran (`false` under dry-run).
    pub executed: bool,
}

impl Execution {
    /// True iff a process ran and exited zero.
    pub const fn success(&self) -> bool {
        self.executed && matches!(self.code, Some(0))
    }
}

/// Run a command.
///
/// The first argument names the executable. Lookup failures are logged but
/// execution is still attempted, so the caller sees the real spawn error.
/// Under `dry_run` no process is spawned and a synthetic result comes back —
/// never an error, even when `strict` is set.
pub fn run(argv: &[String], options: &RunOptions) -> RunResult<Execution> {
    let Some(program) = argv.first() else {
        return Err(RunError::EmptyCommand);
    };
    let rendered = argv.join(" ");

    if options.shell {
        warn!(command = %rendered, "shell interpretation requested; quoting and injection hazards apply");
    }

    debug!(command = %rendered, dry_run = options.dry_run, "executing");

    if which::which(program).is_err() {
        warn!(%program, "executable not found on PATH");
    }

    if options.dry_run {
        return Ok(Execution {
            command: rendered,
            code: Some(DRY_RUN_EXIT_CODE),
            stdout: String::new(),
            stderr: String::new(),
            executed: false,
        });
    }

    let mut cmd = if options.shell {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", &rendered]);
        cmd
    } else {
        let mut cmd = Command::new(program);
        cmd.args(&argv[1..]);
        cmd
    };

    if let Some(ref dir) = options.cwd {
        cmd.current_dir(dir.as_std_path());
    }

    let execution = if options.capture {
        let output = cmd.output().map_err(|source| RunError::Spawn {
            command: rendered.clone(),
            source,
        })?;
        Execution {
            command: rendered,
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            executed: true,
        }
    } else {
        let status = cmd.status().map_err(|source| RunError::Spawn {
            command: rendered.clone(),
            source,
        })?;
        Execution {
            command: rendered,
            code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
            executed: true,
        }
    };

    if options.strict && !execution.success() {
        return Err(RunError::Failed {
            command: execution.command,
            code: execution.code,
            stderr: execution.stderr.trim().to_string(),
        });
    }

    Ok(execution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_command_line_is_an_error() {
        let result = run(&[], &RunOptions::new());
        assert!(matches!(result, Err(RunError::EmptyCommand)));
    }

    #[test]
    fn dry_run_spawns_nothing() {
        // Spawning this would fail; dry-run must succeed anyway.
        let result = run(
            &argv(&["definitely-not-a-real-binary"]),
            &RunOptions::new().strict().dry_run(true),
        )
        .unwrap();
        assert!(!result.executed);
        assert_eq!(result.code, Some(DRY_RUN_EXIT_CODE));
        assert!(!result.success());
    }

    #[test]
    fn missing_binary_spawn_error() {
        let result = run(&argv(&["definitely-not-a-real-binary"]), &RunOptions::new());
        assert!(matches!(result, Err(RunError::Spawn { .. })));
    }

    #[test]
    fn captures_stdout() {
        let result = run(&argv(&["echo", "hello"]), &RunOptions::new().capture()).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn strict_propagates_nonzero_exit() {
        let result = run(&argv(&["false"]), &RunOptions::new().strict().capture());
        match result {
            Err(RunError::Failed { command, code, .. }) => {
                assert_eq!(command, "false");
                assert_eq!(code, Some(1));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_strict_reports_failure_in_result() {
        let result = run(&argv(&["false"]), &RunOptions::new().capture()).unwrap();
        assert!(result.executed);
        assert!(!result.success());
        assert_eq!(result.code, Some(1));
    }

    #[test]
    fn cwd_is_honored() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("marker.txt"), "x").unwrap();
        let dir = camino::Utf8Path::from_path(tmp.path()).unwrap();

        let result = run(&argv(&["ls"]), &RunOptions::new().capture().cwd(dir)).unwrap();
        assert!(result.stdout.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn shell_mode_interprets_the_command_line() {
        let result = run(
            &argv(&["echo", "one;", "echo", "two"]),
            &RunOptions::new().capture().shell(),
        )
        .unwrap();
        assert!(result.stdout.contains("two"));
    }
}
