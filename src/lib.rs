//! # Medir
//!
//! Medir (Spanish: "to measure") is a precision benchmark harness for
//! trace-driven memory-subsystem simulators. It synthesizes memory-access
//! traces, drives the external simulator binary through them with a bounded
//! worker pool, and merges the heterogeneous per-run statistics into one
//! tabular result set per suite.
//!
//! ## Pipeline
//!
//! ```text
//! TraceRequest ──► WorkloadCache ──► TestCase (run script ► simulator)
//!                                        │
//!                                   vans_dump/ (stdout + stats_*)
//!                                        │
//!                              Scheduler::collect_all
//!                                        │
//!                              aggregate::write_results_csv
//! ```
//!
//! ## Example
//!
//! ```rust
//! use medir::trace::{AccessKind, TraceRequest};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let records = TraceRequest::sequential(0, 256, AccessKind::Read)
//!     .with_step(64)
//!     .synthesize(&mut rng)
//!     .unwrap();
//! assert_eq!(records.len(), 4);
//! assert_eq!(records[0].to_string(), "0x00000000 R");
//! ```
//!
//! The simulator itself is a black box behind the [`runner::Runner`] trait;
//! tests substitute [`runner::MockRunner`] to exercise the pipeline without
//! a simulator binary.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_wrap)] // u64 -> i64 for stat counters is safe
#![allow(clippy::cast_possible_truncation)] // footprint / step fits usize
#![allow(clippy::cast_precision_loss)] // u64/usize -> f64 for derived metrics
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)] // documented on the fallible fns that matter
#![allow(clippy::uninlined_format_args)]

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod scheduler;
pub mod suite;
pub mod testcase;
pub mod trace;

pub use error::{MedirError, Result};
