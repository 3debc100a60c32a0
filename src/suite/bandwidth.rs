//! Sequential streaming bandwidth suite
//!
//! One test case per (pattern × footprint): a single-round sequential sweep
//! at cache-line stride, optionally padded with idle cycles between
//! accesses. Reads stay non-critical here: bandwidth wants independent,
//! pipelinable accesses.

use rand::rngs::StdRng;

use crate::cache::TraceKey;
use crate::error::Result;
use crate::suite::{
    create_case_dirs, human_bytes, pattern_kind, write_run_script, BenchSuite, SuiteContext,
    RUN_SCRIPT_NAME,
};
use crate::testcase::{TestCase, TestCaseSpec};
use crate::trace::{TraceRequest, CACHE_LINE_BYTES};

/// Sequential bandwidth measurement suite
#[derive(Debug, Clone, Copy, Default)]
pub struct BandwidthSuite;

impl BenchSuite for BandwidthSuite {
    fn name(&self) -> &'static str {
        "bandwidth"
    }

    fn generate_testcases(
        &self,
        ctx: &SuiteContext<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<TestCase>> {
        let input = &ctx.metadata.input;
        let mut cases = Vec::new();

        for pattern in &input.pattern {
            let kind = pattern_kind(pattern)?;
            let out_dir = ctx
                .out_root
                .join(format!("{}_{pattern}", ctx.metadata.out_path));

            for &size in &input.access_size {
                let case_dir = out_dir.join(size.to_string());
                let repeat = 1;

                if !ctx.readonly {
                    create_case_dirs(&case_dir)?;

                    let request = TraceRequest::sequential(0, size, kind)
                        .with_step(CACHE_LINE_BYTES)
                        .with_repeat_rounds(repeat)
                        .with_idle_cycles(input.idle_clk);
                    let key = TraceKey::new(self.name(), pattern, size);
                    let trace_path = ctx.cache.resolve(
                        &key,
                        input.cache_trace,
                        &case_dir.join("trace.txt"),
                        || request.synthesize(&mut *rng),
                    )?;

                    write_run_script(
                        &case_dir,
                        &ctx.harness.vans.dramtrace_bin,
                        &ctx.local_cfg_path,
                        &trace_path,
                        &format!("trace: seq {pattern} footprint={size} step=64 repeat={repeat}"),
                    )?;
                }

                cases.push(TestCase::new(TestCaseSpec {
                    name: format!(
                        "{}\t(Pattern: {:>6} |\tSize: {:>14} |\tRepeat: {})",
                        ctx.metadata.name,
                        pattern,
                        human_bytes(size),
                        repeat
                    ),
                    job_id: format!("bandwidth_{pattern}"),
                    access_size: size,
                    path: case_dir,
                    repeat_count: repeat,
                    run_script: RUN_SCRIPT_NAME.to_string(),
                }));
            }
        }
        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::WorkloadCache;
    use crate::config::{HarnessConfig, SuiteMetadata};
    use rand::SeedableRng;

    fn harness_yaml(out: &str) -> String {
        format!(
            "out_path: {out}\n\
             thread: 2\n\
             vans:\n\
             \x20 dramtrace_bin: /opt/vans/dramtrace\n\
             \x20 config_file: /opt/vans/vans.cfg\n\
             tests: [bandwidth]\n"
        )
    }

    const METADATA: &str = "\
name: Bandwidth
out_path: bandwidth
result_file: bandwidth_result.csv
input:
  pattern: [read, write]
  access_size: [128, 256]
  cache_trace: false
";

    #[test]
    fn test_generate_creates_cases_and_scripts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let harness: HarnessConfig =
            serde_yaml::from_str(&harness_yaml(&dir.path().display().to_string()))
                .expect("harness");
        let metadata: SuiteMetadata = serde_yaml::from_str(METADATA).expect("metadata");
        let cache = WorkloadCache::new(dir.path());
        let ctx = SuiteContext {
            harness: &harness,
            metadata: &metadata,
            out_root: dir.path().join("job"),
            cache: &cache,
            local_cfg_path: dir.path().join("vans.cfg"),
            readonly: false,
        };

        let mut rng = StdRng::seed_from_u64(0);
        let cases = BandwidthSuite
            .generate_testcases(&ctx, &mut rng)
            .expect("generate");

        assert_eq!(cases.len(), 4);
        assert_eq!(cases[0].spec().job_id, "bandwidth_read");
        assert_eq!(cases[3].spec().job_id, "bandwidth_write");
        assert_eq!(cases[0].spec().repeat_count, 1);

        let case_dir = dir.path().join("job/bandwidth_read/128");
        assert!(case_dir.join("run.sh").exists());
        assert!(case_dir.join("trace.txt").exists());
        assert!(case_dir.join("vans_dump").is_dir());

        // Non-critical sequential reads at cache-line stride.
        let body = std::fs::read_to_string(case_dir.join("trace.txt")).expect("trace");
        assert_eq!(body.lines().count(), 2);
        assert!(body.starts_with("0x00000000 R\n0x00000040 R\n"));
    }

    #[test]
    fn test_readonly_generates_specs_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let harness: HarnessConfig =
            serde_yaml::from_str(&harness_yaml(&dir.path().display().to_string()))
                .expect("harness");
        let metadata: SuiteMetadata = serde_yaml::from_str(METADATA).expect("metadata");
        let cache = WorkloadCache::new(dir.path());
        let ctx = SuiteContext {
            harness: &harness,
            metadata: &metadata,
            out_root: dir.path().join("job"),
            cache: &cache,
            local_cfg_path: dir.path().join("vans.cfg"),
            readonly: true,
        };

        let mut rng = StdRng::seed_from_u64(0);
        let cases = BandwidthSuite
            .generate_testcases(&ctx, &mut rng)
            .expect("generate");
        assert_eq!(cases.len(), 4);
        assert!(!dir.path().join("job").exists(), "readonly writes nothing");
    }
}
