/// Runs one benchmark executable and turns its output into a ParsedRun.
///
/// The executable is invoked as `<executable> <input_file>...` without a
/// shell, and the harness blocks until it exits. There is no timeout: a hung
/// benchmark hangs the harness.
///
/// What gets recorded is what the executable reports about itself. A run
/// configuration loaded from file is only compared against that report.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use super::parser::ResultParser;
use super::{ParsedRun, RunConfiguration};
use crate::config::ExitPolicy;
use crate::errors::BenchError;

/// Captured output of a finished benchmark process.
#[derive(Debug)]
pub struct RunOutput {
    pub stdout: String,
    pub status: ExitStatus,
}

/// Spawn `executable` with `input_files` as positional arguments and wait for it.
pub async fn execute(executable: &Path, input_files: &[PathBuf]) -> Result<RunOutput, BenchError> {
    tracing::info!(
        executable = %executable.display(),
        inputs = ?input_files,
        "Running command"
    );

    let output = Command::new(executable)
        .args(input_files)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .await
        .map_err(|e| {
            BenchError::Process(format!(
                "Failed to run '{}': {}",
                executable.display(),
                e
            ))
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    tracing::debug!(bytes = stdout.len(), status = %output.status, "Benchmark process finished");

    Ok(RunOutput {
        stdout,
        status: output.status,
    })
}

/// Executes benchmarks and parses their output with a shared parser.
pub struct BenchmarkExecutor {
    parser: ResultParser,
    exit_policy: ExitPolicy,
    requested: Option<RunConfiguration>,
}

impl BenchmarkExecutor {
    pub fn new(exit_policy: ExitPolicy) -> Result<Self, BenchError> {
        Ok(BenchmarkExecutor {
            parser: ResultParser::new()?,
            exit_policy,
            requested: None,
        })
    }

    /// Attach the configuration the harness intended to run with.
    pub fn with_requested(mut self, requested: RunConfiguration) -> Self {
        tracing::debug!(requested = ?requested, "Loaded run configuration");
        self.requested = Some(requested);
        self
    }

    /// Run one benchmark over `input_files` and recover what it reported.
    pub async fn run(&self, executable: &Path, input_files: &[PathBuf]) -> Result<ParsedRun, BenchError> {
        let output = execute(executable, input_files).await?;

        if !output.status.success() {
            match self.exit_policy {
                ExitPolicy::Fail => {
                    return Err(BenchError::ProcessExit {
                        executable: executable.display().to_string(),
                        status: output.status.to_string(),
                    });
                }
                ExitPolicy::Ignore => {
                    tracing::warn!(
                        executable = %executable.display(),
                        status = %output.status,
                        "Benchmark exited unsuccessfully, recording its output anyway"
                    );
                }
            }
        }

        let mut run = self.parser.parse(&output.stdout);

        if run.config.input_file.is_empty() {
            run.config.input_file = input_files
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" ");
        }

        if let Some(requested) = &self.requested {
            let mut reported = run.config.clone();
            reported.input_file = requested.input_file.clone();
            if reported != *requested {
                tracing::info!(
                    executable = %executable.display(),
                    "Benchmark reported a configuration different from the requested one; recording the reported values"
                );
            }
        }

        Ok(run)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn write_log(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), "run.log", "hello\nworld\n");

        let output = execute(Path::new("cat"), &[log]).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_execute_missing_executable() {
        let err = execute(Path::new("/nonexistent/benchmark"), &[]).await.unwrap_err();
        assert!(matches!(err, BenchError::Process(_)));
    }

    #[tokio::test]
    async fn test_run_fills_input_file_when_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), "100_10_1", "[t] [b] [info] size: 5\n");

        let executor = BenchmarkExecutor::new(ExitPolicy::Ignore).unwrap();
        let run = executor.run(Path::new("cat"), &[log.clone()]).await.unwrap();
        assert_eq!(run.result.size, 5);
        assert_eq!(run.config.input_file, log.display().to_string());
    }

    #[tokio::test]
    async fn test_reported_configuration_wins_over_requested() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), "run.log", "[t] [b] [info] num_threads: 4\n");

        let requested = RunConfiguration {
            num_threads: 32,
            ..RunConfiguration::default()
        };
        let executor = BenchmarkExecutor::new(ExitPolicy::Ignore)
            .unwrap()
            .with_requested(requested);
        let run = executor.run(Path::new("cat"), &[log]).await.unwrap();
        assert_eq!(run.config.num_threads, 4);
        assert_eq!(run.result.threads, 4);
    }

    #[tokio::test]
    async fn test_exit_policy() {
        let permissive = BenchmarkExecutor::new(ExitPolicy::Ignore).unwrap();
        let run = permissive.run(Path::new("false"), &[]).await.unwrap();
        assert_eq!(run.result.size, 0);

        let strict = BenchmarkExecutor::new(ExitPolicy::Fail).unwrap();
        let err = strict.run(Path::new("false"), &[]).await.unwrap_err();
        assert!(matches!(err, BenchError::ProcessExit { .. }));
    }
}
