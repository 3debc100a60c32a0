//! Benchmark suite definitions
//!
//! A suite expands its input table into concrete test cases: one directory
//! per (pattern × size) combination holding a run script, a (possibly
//! cached) trace, and an empty dump directory. The three families mirror
//! what the simulator's precision tests measure:
//!
//! - [`bandwidth`] - sequential streaming, one round per case
//! - [`ptr_chasing`] - derangement-chain latency probing
//! - [`overwrite`] - repeated writes to a tiny working set

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;

use crate::aggregate::RawResult;
use crate::cache::WorkloadCache;
use crate::config::{HarnessConfig, SuiteMetadata};
use crate::error::{MedirError, Result};
use crate::testcase::TestCase;
use crate::trace::AccessKind;

pub mod bandwidth;
pub mod overwrite;
pub mod ptr_chasing;

pub use bandwidth::BandwidthSuite;
pub use overwrite::OverwriteSuite;
pub use ptr_chasing::PtrChasingSuite;

/// Run script filename generated for every test case
pub const RUN_SCRIPT_NAME: &str = "run.sh";

/// Everything a suite needs to generate its test cases
#[derive(Debug)]
pub struct SuiteContext<'a> {
    /// Harness configuration (simulator paths, worker budget)
    pub harness: &'a HarnessConfig,
    /// This suite's metadata
    pub metadata: &'a SuiteMetadata,
    /// Job output root: `<out_path>/<job_id>`
    pub out_root: PathBuf,
    /// Trace cache shared across jobs
    pub cache: &'a WorkloadCache,
    /// Copied simulator config (with overrides applied) for this suite
    pub local_cfg_path: PathBuf,
    /// Regenerate test case specs only, without touching the filesystem
    pub readonly: bool,
}

/// A family of generated test cases
pub trait BenchSuite {
    /// Suite key used in the config `tests` list and cache paths
    fn name(&self) -> &'static str;

    /// Create directories, run scripts and traces; yield runnable cases
    ///
    /// In readonly mode only the specs are rebuilt (for re-collecting an
    /// existing job's output tree).
    ///
    /// # Errors
    ///
    /// Propagates synthesis, cache, and filesystem errors.
    fn generate_testcases(
        &self,
        ctx: &SuiteContext<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<TestCase>>;

    /// Suite-specific output after collection (default: nothing)
    ///
    /// # Errors
    ///
    /// Propagates parse and I/O errors from the suite's extra outputs.
    fn post_collect(&self, _ctx: &SuiteContext<'_>, _results: &[RawResult]) -> Result<()> {
        Ok(())
    }
}

/// Look up a suite implementation by its config name
///
/// # Errors
///
/// Returns [`MedirError::InvalidConfiguration`] for an unknown suite.
pub fn suite_by_name(name: &str) -> Result<Box<dyn BenchSuite>> {
    match name {
        "bandwidth" => Ok(Box::new(BandwidthSuite)),
        "ptr_chasing" => Ok(Box::new(PtrChasingSuite)),
        "overwrite" => Ok(Box::new(OverwriteSuite)),
        other => Err(MedirError::InvalidConfiguration(format!(
            "unknown test suite '{other}'"
        ))),
    }
}

/// Map a suite pattern name to the access kind of its trace
pub(crate) fn pattern_kind(pattern: &str) -> Result<AccessKind> {
    match pattern {
        "read" => Ok(AccessKind::Read),
        "write" => Ok(AccessKind::Write),
        other => Err(MedirError::InvalidConfiguration(format!(
            "unknown access pattern '{other}': expected 'read' or 'write'"
        ))),
    }
}

/// Write the run script invoking the simulator with this case's config and
/// trace, capturing combined output under the dump directory
pub(crate) fn write_run_script(
    case_dir: &Path,
    sim_bin: &Path,
    cfg_path: &Path,
    trace_path: &Path,
    comment: &str,
) -> Result<()> {
    let script = format!(
        "#!/bin/bash\n\
         # {comment}\n\
         cd $(dirname $0)\n\
         {} \\\n\
         \t -c {} \\\n\
         \t -t {} \\\n\
         \t 2>&1 \\\n\
         \t > vans_dump/stdout",
        absolutize(sim_bin).display(),
        absolutize(cfg_path).display(),
        absolutize(trace_path).display(),
    );
    let path = case_dir.join(RUN_SCRIPT_NAME);
    fs::write(&path, script).map_err(|e| MedirError::IoError {
        message: format!("failed to write run script {}: {e}", path.display()),
    })
}

/// Make a path absolute relative to the current directory; run scripts `cd`
/// into their own directory, so relative paths would not survive
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Create a test case directory with its dump subdirectory
pub(crate) fn create_case_dirs(case_dir: &Path) -> Result<()> {
    let dump = case_dir.join(crate::testcase::DUMP_DIR);
    fs::create_dir_all(&dump).map_err(|e| MedirError::IoError {
        message: format!("failed to create {}: {e}", dump.display()),
    })
}

/// Human-readable byte size, e.g. `4.0 KiB`
pub(crate) fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["Byte", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
