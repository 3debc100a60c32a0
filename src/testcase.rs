//! A single runnable benchmark instance
//!
//! Each test case owns a directory containing its run script, trace, and the
//! `vans_dump/` capture the simulator leaves behind. Execution delegates to a
//! [`Runner`]; collection parses the dump into one [`RawResult`] row:
//!
//! 1. every `stats_*` file is read as a flat YAML key→number map, with
//!    values **summed** across files sharing a key (simulators may emit
//!    stats in several partial files);
//! 2. the captured stdout must contain the four mandatory clock/latency
//!    lines, plus an optional wall-clock simulation time;
//! 3. the spec's public fields are appended; `name`, `path` and the script
//!    name never reach the tabular output.

use std::path::{Path, PathBuf};
use std::time::Instant;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::aggregate::{RawResult, StatValue};
use crate::error::{MedirError, Result};
use crate::runner::Runner;

/// Directory under the test case path holding stdout and stat files
pub const DUMP_DIR: &str = "vans_dump";

/// Stat files are recognized by this name prefix
pub const STAT_FILE_PREFIX: &str = "stats_";

/// Public description of one benchmark instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseSpec {
    /// Human-readable name used in logs and failure reports
    pub name: String,
    /// Short identifier grouping rows of one family in the result table
    pub job_id: String,
    /// Footprint of the generated trace in bytes
    pub access_size: u64,
    /// Test case root directory
    pub path: PathBuf,
    /// Number of trace repeat rounds
    pub repeat_count: u64,
    /// Run script filename inside `path`
    pub run_script: String,
}

/// A runnable benchmark instance
#[derive(Debug, Clone)]
pub struct TestCase {
    spec: TestCaseSpec,
}

impl TestCase {
    /// Test case from its spec
    #[must_use]
    pub fn new(spec: TestCaseSpec) -> Self {
        Self { spec }
    }

    /// The case's public description
    #[must_use]
    pub fn spec(&self) -> &TestCaseSpec {
        &self.spec
    }

    /// Dump directory of this case
    #[must_use]
    pub fn dump_dir(&self) -> PathBuf {
        self.spec.path.join(DUMP_DIR)
    }

    /// Execute the run script synchronously via `runner`
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::ExecutionFailed`] tagged with this case's name.
    pub fn execute(&self, runner: &dyn Runner) -> Result<()> {
        tracing::info!("[START] {}", self.spec.name);
        let start = Instant::now();
        let script = self.spec.path.join(&self.spec.run_script);
        runner.run_script(&self.spec.name, &script)?;
        tracing::info!(
            "[ END ] {} {:.3} sec",
            self.spec.name,
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Parse this case's dump directory into one result row
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::IoError`] when the dump directory is missing,
    /// [`MedirError::MissingStat`] when a mandatory stdout field is absent,
    /// and [`MedirError::ParseFailure`] on malformed stat content.
    pub fn collect_result(&self) -> Result<RawResult> {
        let dump = self.dump_dir();
        if !dump.is_dir() {
            return Err(MedirError::IoError {
                message: format!("dump directory {} does not exist", dump.display()),
            });
        }

        let mut result = RawResult::new();
        self.collect_stat_files(&dump, &mut result)?;
        self.collect_stdout(&dump, &mut result)?;

        // Public spec fields close the row; name/path/script stay out of the
        // tabular output.
        result.insert("job_id", StatValue::Text(self.spec.job_id.clone()));
        result.insert("access_size", StatValue::Int(self.spec.access_size as i64));
        result.insert("repeat_cnt", StatValue::Int(self.spec.repeat_count as i64));
        Ok(result)
    }

    /// Sum every `stats_*` file in the dump directory into `result`
    ///
    /// Files are visited in sorted name order so the resulting column order
    /// is deterministic across runs and platforms.
    fn collect_stat_files(&self, dump: &Path, result: &mut RawResult) -> Result<()> {
        let entries = std::fs::read_dir(dump).map_err(|e| MedirError::IoError {
            message: format!("failed to list {}: {e}", dump.display()),
        })?;

        let mut stat_files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(STAT_FILE_PREFIX))
            })
            .collect();
        stat_files.sort();

        for file in stat_files {
            let content = std::fs::read_to_string(&file).map_err(|e| MedirError::IoError {
                message: format!("failed to read stat file {}: {e}", file.display()),
            })?;
            let content = content.replace('\t', "");
            if content.trim().is_empty() {
                continue;
            }

            let stats: IndexMap<String, serde_yaml::Value> = serde_yaml::from_str(&content)
                .map_err(|e| MedirError::ParseFailure {
                    context: format!("stat file {}", file.display()),
                    reason: e.to_string(),
                })?;
            for (key, value) in stats {
                let value = stat_value(&value).ok_or_else(|| MedirError::ParseFailure {
                    context: format!("stat file {}", file.display()),
                    reason: format!("non-numeric value for key '{key}'"),
                })?;
                result.accumulate(&key, value)?;
            }
        }
        Ok(())
    }

    /// Extract the clock/latency fields from the captured stdout
    fn collect_stdout(&self, dump: &Path, result: &mut RawResult) -> Result<()> {
        let stdout_path = dump.join("stdout");
        let content = std::fs::read_to_string(&stdout_path).map_err(|e| MedirError::IoError {
            message: format!("failed to read {}: {e}", stdout_path.display()),
        })?;

        let total_clock = extract_int(&content, r"Total clock:\s*(\d+)", "Total clock", &stdout_path)?;
        result.insert("total_clock", StatValue::Int(total_clock));
        result.insert("sim.total_clock", StatValue::Int(total_clock));
        result.insert(
            "total_ns",
            StatValue::Float(extract_float(
                &content,
                r"Total ns:\s*([\d.]+)",
                "Total ns",
                &stdout_path,
            )?),
        );
        result.insert(
            "last_clock",
            StatValue::Int(extract_int(
                &content,
                r"Last command clock:\s*(\d+)",
                "Last command clock",
                &stdout_path,
            )?),
        );
        result.insert(
            "last_ns",
            StatValue::Float(extract_float(
                &content,
                r"Last command ns:\s*([\d.]+)",
                "Last command ns",
                &stdout_path,
            )?),
        );

        // Wall-clock simulation time is informative only; older simulator
        // builds never print it.
        if let Some(sim_time) = capture(&content, r"Simulation time:\s*([\d.]+)")? {
            let value = sim_time.parse().map_err(|e| MedirError::ParseFailure {
                context: "Simulation time".to_string(),
                reason: format!("{e}"),
            })?;
            result.insert("sim.time_sec", StatValue::Float(value));
        }
        Ok(())
    }
}

fn stat_value(value: &serde_yaml::Value) -> Option<StatValue> {
    if let Some(i) = value.as_i64() {
        Some(StatValue::Int(i))
    } else {
        value.as_f64().map(StatValue::Float)
    }
}

fn capture<'a>(content: &'a str, pattern: &str) -> Result<Option<&'a str>> {
    let re = Regex::new(pattern).map_err(|e| MedirError::ParseFailure {
        context: format!("stdout pattern '{pattern}'"),
        reason: e.to_string(),
    })?;
    Ok(re
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str()))
}

fn extract<'a>(content: &'a str, pattern: &str, field: &str, path: &Path) -> Result<&'a str> {
    capture(content, pattern)?.ok_or_else(|| MedirError::MissingStat {
        field: field.to_string(),
        path: path.display().to_string(),
    })
}

fn extract_int(content: &str, pattern: &str, field: &str, path: &Path) -> Result<i64> {
    extract(content, pattern, field, path)?
        .parse()
        .map_err(|e| MedirError::ParseFailure {
            context: field.to_string(),
            reason: format!("{e}"),
        })
}

fn extract_float(content: &str, pattern: &str, field: &str, path: &Path) -> Result<f64> {
    extract(content, pattern, field, path)?
        .parse()
        .map_err(|e| MedirError::ParseFailure {
            context: field.to_string(),
            reason: format!("{e}"),
        })
}
