//! Harness and suite configuration
//!
//! Two YAML documents drive a run, mirroring the suite layout on disk:
//!
//! - `basedata.yml` at the suite root ([`HarnessConfig`]): output root,
//!   worker budget, simulator binary/config paths, and the list of suites.
//! - `metadata.yml` in each suite directory ([`SuiteMetadata`]): naming,
//!   output locations, and the suite's input table.
//!
//! Each job copies the simulator config next to its output and appends any
//! `override_config` sections, so a job's exact simulator configuration is
//! preserved alongside its results.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{MedirError, Result};
use crate::scheduler::FailurePolicy;

/// Paths of the external simulator
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    /// Trace-driven simulator binary invoked by every run script
    pub dramtrace_bin: PathBuf,
    /// Simulator config file copied into each job's output tree
    pub config_file: PathBuf,
}

/// Top-level harness configuration (`basedata.yml`)
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    /// Output root; each job writes under `<out_path>/<job_id>/`
    pub out_path: PathBuf,
    /// Worker budget: the exact number of concurrent simulator subprocesses
    pub thread: usize,
    /// External simulator paths
    pub vans: SimulatorConfig,
    /// Suite names to run, resolved against the suite root directory
    pub tests: Vec<String>,
    /// Kill a simulator subprocess after this many seconds (no limit when
    /// absent)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Abort the whole batch on the first per-case failure (default), or
    /// proceed with partial results when `false`
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
    /// Seed for trace randomness; fresh entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_fail_fast() -> bool {
    true
}

impl HarnessConfig {
    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] when unreadable and
    /// [`MedirError::InvalidConfiguration`] when malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| MedirError::IoError {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            MedirError::InvalidConfiguration(format!("bad config {}: {e}", path.display()))
        })
    }

    /// Failure policy implied by `fail_fast`
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Skip
        }
    }
}

/// Input table of one suite (`metadata.yml` `input:` section)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuiteInput {
    /// Access patterns to expand, e.g. `[read, write]`
    #[serde(default)]
    pub pattern: Vec<String>,
    /// Trace footprints in bytes, one test case per entry
    #[serde(default)]
    pub access_size: Vec<u64>,
    /// Pointer-chasing repeat budget: `repeat = repeat_max_size / size`
    #[serde(default)]
    pub repeat_max_size: Option<u64>,
    /// Reuse cached traces across jobs
    #[serde(default = "default_cache_trace")]
    pub cache_trace: bool,
    /// Idle cycles between sequential accesses (0 = none)
    #[serde(default)]
    pub idle_clk: u64,
    /// Overwrite iteration count
    #[serde(default)]
    pub iter: Option<u64>,
}

fn default_cache_trace() -> bool {
    true
}

/// Per-suite configuration (`metadata.yml`)
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteMetadata {
    /// Display name used in test case names
    pub name: String,
    /// One-line description for reports
    #[serde(default)]
    pub description: String,
    /// Suite output directory under the job root (pattern-suffixed per
    /// pattern)
    pub out_path: String,
    /// Result table filename under the job root
    pub result_file: String,
    /// Sections appended to the copied simulator config
    #[serde(default)]
    pub override_config: Option<IndexMap<String, IndexMap<String, serde_yaml::Value>>>,
    /// Suite input table
    pub input: SuiteInput,
}

impl SuiteMetadata {
    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] when unreadable and
    /// [`MedirError::InvalidConfiguration`] when malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| MedirError::IoError {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            MedirError::InvalidConfiguration(format!("bad metadata {}: {e}", path.display()))
        })
    }

    /// Copy the simulator config into `dest_dir` and append any
    /// `override_config` sections as `[section]` / `key = value` lines
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] on copy or append failure.
    pub fn copy_config(&self, source: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| MedirError::IoError {
            message: format!("simulator config {} has no file name", source.display()),
        })?;
        let dest = dest_dir.join(file_name);
        fs::copy(source, &dest).map_err(|e| MedirError::IoError {
            message: format!(
                "failed to copy simulator config {} to {}: {e}",
                source.display(),
                dest.display()
            ),
        })?;

        if let Some(overrides) = &self.override_config {
            let mut file = fs::OpenOptions::new()
                .append(true)
                .open(&dest)
                .map_err(|e| MedirError::IoError {
                    message: format!("failed to open {} for append: {e}", dest.display()),
                })?;
            for (section, entries) in overrides {
                writeln!(file, "[{section}]").map_err(|e| MedirError::IoError {
                    message: format!("failed to append overrides: {e}"),
                })?;
                for (key, value) in entries {
                    let rendered = yaml_scalar(value);
                    writeln!(file, "{key} = {rendered}").map_err(|e| MedirError::IoError {
                        message: format!("failed to append overrides: {e}"),
                    })?;
                }
            }
        }
        Ok(dest)
    }
}

/// Render a YAML scalar the way it appears in a simulator config line
fn yaml_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Default job identifier: local wall-clock `%Y%m%d-%H%M%S`
#[must_use]
pub fn default_job_id() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASEDATA: &str = "\
out_path: /tmp/medir-out
thread: 4
vans:
  dramtrace_bin: /opt/vans/dramtrace
  config_file: /opt/vans/vans.cfg
tests:
  - bandwidth
  - ptr_chasing
timeout_secs: 900
";

    const METADATA: &str = "\
name: Pointer chasing
description: Load-to-use latency under no parallelism
out_path: ptr_chasing
result_file: ptr_chasing_result.csv
override_config:
  dram:
    tCL: 22
input:
  pattern: [read, write]
  access_size: [4096, 8192]
  repeat_max_size: 16384
  cache_trace: true
";

    #[test]
    fn test_harness_config_parse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("basedata.yml");
        fs::write(&path, BASEDATA).expect("write");

        let config = HarnessConfig::load(&path).expect("load");
        assert_eq!(config.thread, 4);
        assert_eq!(config.tests, vec!["bandwidth", "ptr_chasing"]);
        assert_eq!(config.timeout_secs, Some(900));
        assert!(config.fail_fast, "fail_fast defaults on");
        assert_eq!(config.failure_policy(), FailurePolicy::Abort);
    }

    #[test]
    fn test_suite_metadata_parse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metadata.yml");
        fs::write(&path, METADATA).expect("write");

        let meta = SuiteMetadata::load(&path).expect("load");
        assert_eq!(meta.name, "Pointer chasing");
        assert_eq!(meta.input.pattern, vec!["read", "write"]);
        assert_eq!(meta.input.access_size, vec![4096, 8192]);
        assert_eq!(meta.input.repeat_max_size, Some(16384));
        assert!(meta.input.cache_trace);
        assert_eq!(meta.input.idle_clk, 0);
    }

    #[test]
    fn test_copy_config_appends_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("vans.cfg");
        fs::write(&source, "[basic]\nfrequency = 1200\n").expect("write cfg");
        let meta_path = dir.path().join("metadata.yml");
        fs::write(&meta_path, METADATA).expect("write meta");
        let meta = SuiteMetadata::load(&meta_path).expect("load");

        let dest = meta.copy_config(&source, dir.path()).expect("copy");
        let content = fs::read_to_string(dest).expect("read");
        assert!(content.starts_with("[basic]\nfrequency = 1200\n"));
        assert!(content.contains("[dram]\ntCL = 22\n"));
    }

    #[test]
    fn test_load_rejects_malformed_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("basedata.yml");
        fs::write(&path, "out_path: [unterminated").expect("write");
        assert!(HarnessConfig::load(&path).is_err());
    }

    #[test]
    fn test_default_job_id_shape() {
        let id = default_job_id();
        assert_eq!(id.len(), 15);
        assert_eq!(&id[8..9], "-");
    }
}
