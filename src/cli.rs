//! CLI command implementations (extracted for testability)
//!
//! The binary stays thin; each subcommand maps to one function here:
//!
//! - [`run_harness`] - the full pipeline: load config, generate every
//!   suite's test cases, execute them across the worker pool, collect, and
//!   write one CSV table per suite.
//! - [`collect_job`] - readonly re-collection over an existing job's output
//!   tree, regenerating the result tables without running anything.
//! - [`generate_trace`] - standalone trace generation for ad-hoc simulator
//!   runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::aggregate::write_results_csv;
use crate::cache::WorkloadCache;
use crate::config::{default_job_id, HarnessConfig, SuiteMetadata};
use crate::error::{MedirError, Result};
use crate::runner::ScriptRunner;
use crate::scheduler::Scheduler;
use crate::suite::{suite_by_name, BenchSuite, SuiteContext};
use crate::testcase::TestCase;
use crate::trace::{write_trace, AccessKind, AddrPattern, TraceRequest};

/// One suite ready to run: its implementation, context inputs, and cases
struct PreparedSuite {
    suite: Box<dyn BenchSuite>,
    metadata: SuiteMetadata,
    local_cfg_path: PathBuf,
    cases: Vec<TestCase>,
}

/// Run the whole benchmark pipeline for a suite root directory
///
/// Phases mirror the suite lifecycle: generate all test cases first (cache
/// warm-up happens here), then execute every suite's cases, then collect and
/// write each suite's result table.
///
/// # Errors
///
/// Propagates configuration, synthesis, execution, and collection errors;
/// under the default fail-fast policy any per-case failure fails the run.
pub fn run_harness(suite_root: &Path, job_id: Option<String>) -> Result<()> {
    let harness = HarnessConfig::load(&suite_root.join("basedata.yml"))?;
    let job_id = job_id.unwrap_or_else(default_job_id);
    let out_root = harness.out_path.join(&job_id);
    tracing::info!("job {job_id} -> {}", out_root.display());

    let cache = WorkloadCache::new(&harness.out_path);
    let mut rng = seeded_rng(&harness);
    let prepared = prepare_suites(suite_root, &harness, &out_root, &cache, false, &mut rng)?;

    let scheduler = Scheduler::new(harness.thread)?.with_policy(harness.failure_policy());
    let runner = script_runner(&harness);

    for p in &prepared {
        scheduler.run_all(&p.cases, &runner)?;
    }

    collect_and_write(&prepared, &harness, &out_root, &cache, &scheduler)
}

/// Re-collect an existing job's results without running anything
///
/// # Errors
///
/// Propagates configuration and collection errors; the job's output tree
/// must already exist.
pub fn collect_job(suite_root: &Path, job_id: &str) -> Result<()> {
    let harness = HarnessConfig::load(&suite_root.join("basedata.yml"))?;
    let out_root = harness.out_path.join(job_id);
    if !out_root.is_dir() {
        return Err(MedirError::InvalidConfiguration(format!(
            "job output {} does not exist",
            out_root.display()
        )));
    }

    let cache = WorkloadCache::new(&harness.out_path);
    let mut rng = seeded_rng(&harness);
    let prepared = prepare_suites(suite_root, &harness, &out_root, &cache, true, &mut rng)?;

    let scheduler = Scheduler::new(harness.thread)?.with_policy(harness.failure_policy());
    collect_and_write(&prepared, &harness, &out_root, &cache, &scheduler)
}

/// Generate a standalone trace at `<out_path>/trace.tmp`
///
/// # Errors
///
/// Returns [`MedirError::InvalidAccessKind`] or
/// [`MedirError::InvalidConfiguration`] for bad arguments, and I/O errors
/// from writing the trace or its description.
#[allow(clippy::too_many_arguments)]
pub fn generate_trace(
    out_path: &Path,
    start_addr: u64,
    end_addr: u64,
    addr_type: &str,
    access_type: &str,
    step: u64,
    critical_load: bool,
    desc: Option<&str>,
    seed: Option<u64>,
) -> Result<()> {
    let pattern = AddrPattern::parse(addr_type).ok_or_else(|| {
        MedirError::InvalidConfiguration(format!("unknown addr type '{addr_type}'"))
    })?;
    let kind = AccessKind::parse(access_type)?;

    let request = TraceRequest {
        start_addr,
        end_addr,
        pattern,
        kind,
        step,
        critical_load,
        repeat_rounds: 1,
        idle_cycles: 0,
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let records = request.synthesize(&mut rng)?;

    fs::create_dir_all(out_path).map_err(|e| MedirError::IoError {
        message: format!("failed to create {}: {e}", out_path.display()),
    })?;
    write_trace(&out_path.join("trace.tmp"), &records)?;

    if let Some(desc) = desc {
        let info = serde_json::json!({ "desc": desc });
        let body = serde_json::to_string_pretty(&info).map_err(|e| MedirError::ParseFailure {
            context: "trace description".to_string(),
            reason: e.to_string(),
        })?;
        fs::write(out_path.join("info.json"), body).map_err(|e| MedirError::IoError {
            message: format!("failed to write info.json: {e}"),
        })?;
    }

    tracing::info!(
        "wrote {} records to {}",
        records.len(),
        out_path.join("trace.tmp").display()
    );
    Ok(())
}

/// Load every configured suite's metadata and generate its test cases
fn prepare_suites(
    suite_root: &Path,
    harness: &HarnessConfig,
    out_root: &Path,
    cache: &WorkloadCache,
    readonly: bool,
    rng: &mut StdRng,
) -> Result<Vec<PreparedSuite>> {
    let mut prepared = Vec::new();
    for suite_name in &harness.tests {
        let metadata = SuiteMetadata::load(&suite_root.join(suite_name).join("metadata.yml"))?;
        let suite = suite_by_name(suite_name)?;

        let suite_out = out_root.join(&metadata.out_path);
        let local_cfg_path = if readonly {
            existing_local_cfg(&suite_out, &harness.vans.config_file)
        } else {
            fs::create_dir_all(&suite_out).map_err(|e| MedirError::IoError {
                message: format!("failed to create {}: {e}", suite_out.display()),
            })?;
            metadata.copy_config(&harness.vans.config_file, &suite_out)?
        };

        let ctx = SuiteContext {
            harness,
            metadata: &metadata,
            out_root: out_root.to_path_buf(),
            cache,
            local_cfg_path: local_cfg_path.clone(),
            readonly,
        };
        let cases = suite.generate_testcases(&ctx, rng)?;
        tracing::info!("suite {suite_name}: {} test cases", cases.len());

        prepared.push(PreparedSuite {
            suite,
            metadata,
            local_cfg_path,
            cases,
        });
    }
    Ok(prepared)
}

/// Collection phase: one result table per suite, plus suite post-processing
fn collect_and_write(
    prepared: &[PreparedSuite],
    harness: &HarnessConfig,
    out_root: &Path,
    cache: &WorkloadCache,
    scheduler: &Scheduler,
) -> Result<()> {
    for p in prepared {
        let results = scheduler.collect_all(&p.cases)?;
        let table_path = out_root.join(&p.metadata.result_file);
        write_results_csv(&table_path, &results)?;
        tracing::info!(
            "suite {}: wrote {} rows to {}",
            p.suite.name(),
            results.len(),
            table_path.display()
        );

        let ctx = SuiteContext {
            harness,
            metadata: &p.metadata,
            out_root: out_root.to_path_buf(),
            cache,
            local_cfg_path: p.local_cfg_path.clone(),
            readonly: true,
        };
        p.suite.post_collect(&ctx, &results)?;
    }
    Ok(())
}

fn script_runner(harness: &HarnessConfig) -> ScriptRunner {
    match harness.timeout_secs {
        Some(secs) => ScriptRunner::new().with_timeout(Duration::from_secs(secs)),
        None => ScriptRunner::new(),
    }
}

fn seeded_rng(harness: &HarnessConfig) -> StdRng {
    match harness.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// In readonly mode the copied config already sits in the suite output dir
fn existing_local_cfg(suite_out: &Path, config_file: &Path) -> PathBuf {
    config_file
        .file_name()
        .map(|name| suite_out.join(name))
        .unwrap_or_else(|| suite_out.join("vans.cfg"))
}
