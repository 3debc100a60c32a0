//! Bounded-parallel execution of test cases
//!
//! Builds a dedicated worker pool sized exactly to the configured budget
//! (never auto-detected) and runs the execution and collection phases across
//! it. The pool bound is the only concurrency control: at no instant do more
//! than `worker_budget` simulator subprocesses run.
//!
//! Failures are isolated per test case and reported with the case's
//! identity. The failure policy decides what happens next: `Abort` fails the
//! whole batch after every case has finished, `Skip` drops the failed cases
//! from the aggregate and keeps going.

use rayon::prelude::*;

use crate::aggregate::RawResult;
use crate::error::{MedirError, Result};
use crate::runner::Runner;
use crate::testcase::TestCase;

/// What to do with a batch when individual test cases fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the batch on any per-case error (the default)
    Abort,
    /// Log failed cases and proceed with partial results
    Skip,
}

/// Bounded-parallelism executor for a batch of test cases
#[derive(Debug)]
pub struct Scheduler {
    worker_budget: usize,
    policy: FailurePolicy,
}

impl Scheduler {
    /// Scheduler with `worker_budget` workers and the `Abort` policy
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::InvalidConfiguration`] for a zero budget.
    pub fn new(worker_budget: usize) -> Result<Self> {
        if worker_budget == 0 {
            return Err(MedirError::InvalidConfiguration(
                "worker budget must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            worker_budget,
            policy: FailurePolicy::Abort,
        })
    }

    /// Set the failure policy
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Configured worker budget
    #[must_use]
    pub fn worker_budget(&self) -> usize {
        self.worker_budget
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_budget)
            .build()
            .map_err(|e| {
                MedirError::InvalidConfiguration(format!("failed to build worker pool: {e}"))
            })
    }

    /// Execute every test case's run script across the worker pool
    ///
    /// Completion order is unspecified; each case either succeeds or yields
    /// an error tagged with its identity.
    ///
    /// # Errors
    ///
    /// Under `Abort`, the first failing case's error (in batch order). Under
    /// `Skip`, failures are logged and `Ok` is returned; the corresponding
    /// cases will be dropped again at collection time.
    pub fn run_all(&self, cases: &[TestCase], runner: &dyn Runner) -> Result<()> {
        let pool = self.pool()?;
        let outcomes: Vec<Result<()>> =
            pool.install(|| cases.par_iter().map(|case| case.execute(runner)).collect());

        for (case, outcome) in cases.iter().zip(outcomes) {
            if let Err(err) = outcome {
                tracing::error!(name = %case.spec().name, error = %err, "test case failed");
                match self.policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Skip => {}
                }
            }
        }
        Ok(())
    }

    /// Collect every test case's result across the worker pool
    ///
    /// # Errors
    ///
    /// Under `Abort`, the first failing case's error. Under `Skip`, failed
    /// cases are logged and omitted from the returned rows.
    pub fn collect_all(&self, cases: &[TestCase]) -> Result<Vec<RawResult>> {
        let pool = self.pool()?;
        let outcomes: Vec<Result<RawResult>> =
            pool.install(|| cases.par_iter().map(TestCase::collect_result).collect());

        let mut rows = Vec::with_capacity(cases.len());
        for (case, outcome) in cases.iter().zip(outcomes) {
            match outcome {
                Ok(row) => rows.push(row),
                Err(err) => {
                    tracing::error!(
                        name = %case.spec().name,
                        error = %err,
                        "result collection failed"
                    );
                    match self.policy {
                        FailurePolicy::Abort => return Err(err),
                        FailurePolicy::Skip => {}
                    }
                }
            }
        }
        Ok(rows)
    }
}
