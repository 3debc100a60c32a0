//! Subprocess boundary for simulator invocation
//!
//! Each test case owns a generated run script that invokes the simulator
//! binary with its config and trace, redirecting combined output into the
//! case's dump directory. [`Runner`] is the seam at that boundary: the real
//! [`ScriptRunner`] launches the script, while [`MockRunner`] fabricates the
//! dump directory contents so collection can be tested without a simulator.

use std::fs;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

use crate::error::{MedirError, Result};
use crate::testcase::DUMP_DIR;

/// Executes one test case's run script
pub trait Runner: Send + Sync {
    /// Run the script synchronously; `name` identifies the test case in
    /// failure reports
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::ExecutionFailed`] on launch failure, non-zero
    /// exit, or timeout.
    fn run_script(&self, name: &str, script: &Path) -> Result<()>;
}

/// Real runner: marks the script executable and runs it to completion
///
/// A hung simulator otherwise blocks its worker slot forever, so an optional
/// deadline kills the subprocess and reports the timeout as an execution
/// failure.
#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    timeout: Option<Duration>,
}

impl ScriptRunner {
    /// Runner without a deadline
    #[must_use]
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Set a hard deadline after which the subprocess is killed
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Runner for ScriptRunner {
    fn run_script(&self, name: &str, script: &Path) -> Result<()> {
        make_executable(script)?;

        let mut child = Command::new(script)
            .spawn()
            .map_err(|e| MedirError::ExecutionFailed {
                name: name.to_string(),
                reason: format!("failed to launch {}: {e}", script.display()),
            })?;

        let status = match self.timeout {
            None => child.wait().map_err(|e| MedirError::ExecutionFailed {
                name: name.to_string(),
                reason: format!("failed to wait for run script: {e}"),
            })?,
            Some(limit) => wait_with_deadline(&mut child, limit, name)?,
        };

        if !status.success() {
            return Err(MedirError::ExecutionFailed {
                name: name.to_string(),
                reason: format!("run script exited with {status}"),
            });
        }
        Ok(())
    }
}

fn make_executable(script: &Path) -> Result<()> {
    let io_err = |e: std::io::Error| MedirError::IoError {
        message: format!("failed to mark {} executable: {e}", script.display()),
    };
    let metadata = fs::metadata(script).map_err(io_err)?;
    let mut perms = metadata.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
    }
    fs::set_permissions(script, perms).map_err(io_err)
}

/// Poll for exit until `limit` elapses, then kill and report the timeout
fn wait_with_deadline(child: &mut Child, limit: Duration, name: &str) -> Result<ExitStatus> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() >= limit {
                    // Best effort: the child may exit on its own between the
                    // poll and the kill.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(MedirError::ExecutionFailed {
                        name: name.to_string(),
                        reason: format!("timed out after {}s and was killed", limit.as_secs()),
                    });
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(MedirError::ExecutionFailed {
                    name: name.to_string(),
                    reason: format!("failed to poll run script: {e}"),
                })
            }
        }
    }
}

/// Fake runner for tests: writes canned simulator output instead of running
/// anything
///
/// On `run_script` it populates the script's dump directory with the
/// configured stdout text and stat files, exactly as a real run would leave
/// them for `collect_result`.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    stdout: String,
    stat_files: Vec<(String, String)>,
    fail_with: Option<String>,
}

impl MockRunner {
    /// Runner producing the given stdout capture
    #[must_use]
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stat_files: Vec::new(),
            fail_with: None,
        }
    }

    /// Add a stat file (`name` must carry the real stat-file prefix to be
    /// picked up by collection)
    #[must_use]
    pub fn with_stat_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.stat_files.push((name.into(), content.into()));
        self
    }

    /// Make every run fail with the given reason
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stat_files: Vec::new(),
            fail_with: Some(reason.into()),
        }
    }
}

impl Runner for MockRunner {
    fn run_script(&self, name: &str, script: &Path) -> Result<()> {
        if let Some(reason) = &self.fail_with {
            return Err(MedirError::ExecutionFailed {
                name: name.to_string(),
                reason: reason.clone(),
            });
        }

        let dump = script
            .parent()
            .ok_or_else(|| MedirError::IoError {
                message: format!("run script {} has no parent dir", script.display()),
            })?
            .join(DUMP_DIR);
        let io_err = |e: std::io::Error| MedirError::IoError {
            message: format!("mock runner failed to write dump: {e}"),
        };
        fs::create_dir_all(&dump).map_err(io_err)?;
        fs::write(dump.join("stdout"), &self.stdout).map_err(io_err)?;
        for (file_name, content) in &self.stat_files {
            fs::write(dump.join(file_name), content).map_err(io_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
        let script = dir.join("run.sh");
        fs::write(&script, body).expect("write script");
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_script_runner_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "#!/bin/bash\nexit 0\n");
        ScriptRunner::new()
            .run_script("ok-case", &script)
            .expect("run");
    }

    #[cfg(unix)]
    #[test]
    fn test_script_runner_nonzero_exit_is_tagged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "#!/bin/bash\nexit 3\n");
        let err = ScriptRunner::new()
            .run_script("bad-case", &script)
            .expect_err("must fail");
        match err {
            MedirError::ExecutionFailed { name, reason } => {
                assert_eq!(name, "bad-case");
                assert!(reason.contains("exit"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_script_runner_timeout_kills_child() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "#!/bin/bash\nsleep 30\n");
        let start = Instant::now();
        let err = ScriptRunner::new()
            .with_timeout(Duration::from_millis(200))
            .run_script("slow-case", &script)
            .expect_err("must time out");
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_script_runner_launch_failure() {
        let err = ScriptRunner::new()
            .run_script("ghost", Path::new("/nonexistent/run.sh"))
            .expect_err("must fail");
        assert!(matches!(err, MedirError::IoError { .. }));
    }

    #[test]
    fn test_mock_runner_writes_dump() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("run.sh");
        let runner = MockRunner::new("Total clock: 10\n")
            .with_stat_file("stats_dram.txt", "cnt.reads: 4\n");
        runner.run_script("mock", &script).expect("run");

        let dump = dir.path().join(DUMP_DIR);
        assert_eq!(
            fs::read_to_string(dump.join("stdout")).expect("stdout"),
            "Total clock: 10\n"
        );
        assert_eq!(
            fs::read_to_string(dump.join("stats_dram.txt")).expect("stat"),
            "cnt.reads: 4\n"
        );
    }

    #[test]
    fn test_mock_runner_failing() {
        let runner = MockRunner::failing("simulated crash");
        let err = runner
            .run_script("doomed", Path::new("/tmp/run.sh"))
            .expect_err("must fail");
        assert!(matches!(err, MedirError::ExecutionFailed { .. }));
    }
}
