//! Pointer-chasing latency suite
//!
//! One test case per (pattern × footprint): a derangement-chain walk at
//! cache-line stride with critical loads, so every access blocks on the
//! previous one. Small footprints repeat enough rounds to keep the total
//! traffic near `repeat_max_size`; each round lands on a fresh address
//! range.

use rand::rngs::StdRng;

use crate::cache::TraceKey;
use crate::error::{MedirError, Result};
use crate::suite::{
    create_case_dirs, human_bytes, pattern_kind, write_run_script, BenchSuite, SuiteContext,
    RUN_SCRIPT_NAME,
};
use crate::testcase::{TestCase, TestCaseSpec};
use crate::trace::{TraceRequest, CACHE_LINE_BYTES};

/// Pointer-chasing load-to-use latency suite
#[derive(Debug, Clone, Copy, Default)]
pub struct PtrChasingSuite;

impl PtrChasingSuite {
    /// Repeat budget: enough rounds that every case touches roughly
    /// `repeat_max_size` bytes; footprints at or past the budget run once
    fn repeat_for(size: u64, repeat_max_size: u64) -> u64 {
        if size >= repeat_max_size {
            1
        } else {
            repeat_max_size / size
        }
    }
}

impl BenchSuite for PtrChasingSuite {
    fn name(&self) -> &'static str {
        "ptr_chasing"
    }

    fn generate_testcases(
        &self,
        ctx: &SuiteContext<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<TestCase>> {
        let input = &ctx.metadata.input;
        let repeat_max_size = input.repeat_max_size.ok_or_else(|| {
            MedirError::InvalidConfiguration(
                "ptr_chasing suite requires input.repeat_max_size".to_string(),
            )
        })?;
        let mut cases = Vec::new();

        for pattern in &input.pattern {
            let kind = pattern_kind(pattern)?;
            let out_dir = ctx
                .out_root
                .join(format!("{}_{pattern}", ctx.metadata.out_path));

            for &size in &input.access_size {
                let case_dir = out_dir.join(size.to_string());
                let repeat = Self::repeat_for(size, repeat_max_size);

                if !ctx.readonly {
                    create_case_dirs(&case_dir)?;

                    let request = TraceRequest::pointer_chasing(0, size, kind)
                        .with_step(CACHE_LINE_BYTES)
                        .with_repeat_rounds(repeat);
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
                        &format!(
                            "trace: ptr-chasing {pattern} footprint={size} step=64 repeat={repeat}"
                        ),
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
                    job_id: format!("ptr_chasing_{pattern}"),
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
