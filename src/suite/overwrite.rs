//! Overwrite latency suite
//!
//! A single test case writing `iter` times into a 4-cache-line working set,
//! probing worst-case overwrite/eviction tail latency. Besides the standard
//! result row, the simulator prints one `[<iter>]:<clk>` line per overwrite
//! iteration; those are parsed into a per-iteration latency table with a
//! derived `tail` column (clock delta scaled to microseconds-equivalent).

use rand::rngs::StdRng;
use regex::Regex;

use crate::aggregate::{write_results_csv, RawResult, StatValue};
use crate::cache::TraceKey;
use crate::error::{MedirError, Result};
use crate::suite::{write_run_script, BenchSuite, SuiteContext, RUN_SCRIPT_NAME};
use crate::testcase::{TestCase, TestCaseSpec, DUMP_DIR};
use crate::trace::{overwrite_trace, CACHE_LINE_BYTES};

/// Clock-to-tail scale factor applied to per-iteration deltas
const TAIL_SCALE: f64 = 0.75;

/// Worst-case overwrite latency suite
#[derive(Debug, Clone, Copy, Default)]
pub struct OverwriteSuite;

impl BenchSuite for OverwriteSuite {
    fn name(&self) -> &'static str {
        "overwrite"
    }

    fn generate_testcases(
        &self,
        ctx: &SuiteContext<'_>,
        _rng: &mut StdRng,
    ) -> Result<Vec<TestCase>> {
        let input = &ctx.metadata.input;
        let iterations = input.iter.ok_or_else(|| {
            MedirError::InvalidConfiguration("overwrite suite requires input.iter".to_string())
        })?;

        let case_dir = ctx.out_root.join(&ctx.metadata.out_path);
        if !ctx.readonly {
            crate::suite::create_case_dirs(&case_dir)?;

            let key = TraceKey::without_pattern(self.name(), iterations);
            let trace_path = ctx.cache.resolve(
                &key,
                input.cache_trace,
                &case_dir.join("trace.txt"),
                || Ok(overwrite_trace(0, iterations)),
            )?;

            write_run_script(
                &case_dir,
                &ctx.harness.vans.dramtrace_bin,
                &ctx.local_cfg_path,
                &trace_path,
                &format!("trace: overwrite iter={iterations}"),
            )?;
        }

        Ok(vec![TestCase::new(TestCaseSpec {
            name: format!("{}\t(\tIter: {:>14})", ctx.metadata.name, iterations),
            job_id: "overwrite".to_string(),
            access_size: CACHE_LINE_BYTES * iterations,
            path: case_dir,
            repeat_count: 1,
            run_script: RUN_SCRIPT_NAME.to_string(),
        })])
    }

    /// Parse the per-iteration `[<iter>]:<clk>` lines into
    /// `overwrite_result.csv` under the job root
    fn post_collect(&self, ctx: &SuiteContext<'_>, _results: &[RawResult]) -> Result<()> {
        let stdout_path = ctx
            .out_root
            .join(&ctx.metadata.out_path)
            .join(DUMP_DIR)
            .join("stdout");
        let content = std::fs::read_to_string(&stdout_path).map_err(|e| MedirError::IoError {
            message: format!("failed to read {}: {e}", stdout_path.display()),
        })?;

        let rows = iteration_latencies(&content)?;
        if rows.is_empty() {
            tracing::warn!(
                path = %stdout_path.display(),
                "no per-iteration overwrite lines found"
            );
            return Ok(());
        }
        write_results_csv(&ctx.out_root.join("overwrite_result.csv"), &rows)
    }
}

/// Extract `[<iter>]:<clk>` lines and derive the tail-latency column
fn iteration_latencies(content: &str) -> Result<Vec<RawResult>> {
    let re = Regex::new(r"\[(\d+)\]:(\d+)").map_err(|e| MedirError::ParseFailure {
        context: "overwrite iteration pattern".to_string(),
        reason: e.to_string(),
    })?;

    let mut rows = Vec::new();
    let mut prev_clk: Option<i64> = None;
    for caps in re.captures_iter(content) {
        let iter: i64 = caps[1].parse().map_err(|e| MedirError::ParseFailure {
            context: "overwrite iteration index".to_string(),
            reason: format!("{e}"),
        })?;
        let clk: i64 = caps[2].parse().map_err(|e| MedirError::ParseFailure {
            context: "overwrite iteration clock".to_string(),
            reason: format!("{e}"),
        })?;
        let delta = match prev_clk {
            None => clk as f64,
            Some(prev) => (clk - prev) as f64,
        };
        prev_clk = Some(clk);

        let mut row = RawResult::new();
        row.insert("iter", StatValue::Int(iter));
        row.insert("clk", StatValue::Int(clk));
        row.insert("tail", StatValue::Float(delta * TAIL_SCALE));
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_latencies_tail_derivation() {
        let content = "[0]:1000\nnoise line\n[1]:1400\n[2]:2000\n";
        let rows = iteration_latencies(content).expect("parse");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("iter"), Some(&StatValue::Int(0)));
        assert_eq!(rows[0].get("tail"), Some(&StatValue::Float(750.0)));
        assert_eq!(rows[1].get("tail"), Some(&StatValue::Float(300.0)));
        assert_eq!(rows[2].get("tail"), Some(&StatValue::Float(450.0)));
    }

    #[test]
    fn test_iteration_latencies_empty() {
        assert!(iteration_latencies("no matches here")
            .expect("parse")
            .is_empty());
    }

    #[test]
    fn test_generate_single_case() {
        let dir = tempfile::tempdir().expect("tempdir");
        let harness: crate::config::HarnessConfig = serde_yaml::from_str(&format!(
            "out_path: {}\nthread: 1\nvans:\n  dramtrace_bin: /opt/vans/dramtrace\n  config_file: /opt/vans/vans.cfg\ntests: [overwrite]\n",
            dir.path().display()
        ))
        .expect("harness");
        let metadata: crate::config::SuiteMetadata = serde_yaml::from_str(
            "name: Overwrite\nout_path: overwrite\nresult_file: ow.csv\ninput:\n  iter: 1000\n  cache_trace: false\n",
        )
        .expect("metadata");
        let cache = crate::cache::WorkloadCache::new(dir.path());
        let ctx = SuiteContext {
            harness: &harness,
            metadata: &metadata,
            out_root: dir.path().join("job"),
            cache: &cache,
            local_cfg_path: dir.path().join("vans.cfg"),
            readonly: false,
        };

        let mut rng = rand::SeedableRng::seed_from_u64(0);
        let cases = OverwriteSuite
            .generate_testcases(&ctx, &mut rng)
            .expect("generate");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].spec().job_id, "overwrite");
        assert_eq!(cases[0].spec().access_size, 64 * 1000);

        let trace = std::fs::read_to_string(
            dir.path().join("job/overwrite/trace.txt"),
        )
        .expect("trace");
        assert_eq!(trace.lines().count(), 1000);
        assert!(trace.starts_with("0x00000000 W\n0x00000040 W\n0x00000080 W\n0x000000c0 W\n0x00000000 W\n"));
    }
}
