//! Result rows and CSV aggregation
//!
//! Every test case yields one [`RawResult`]: an insertion-ordered map from
//! stat key to value. Aggregation writes one CSV table whose column list is
//! **the key order of the first row**: an explicit contract here, not an
//! accident. A later row whose key set differs from row 0's is rejected as a
//! [`MedirError::SchemaMismatch`] instead of being silently truncated, so
//! heterogeneous batches fail loudly rather than losing columns.
//!
//! Values keep their integer-vs-float identity: stat files accumulate
//! int-preserving sums (two integer partial counters stay an integer), and
//! string fields such as `job_id` pass through verbatim.

use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};

// ============================================================================
// Stat values
// ============================================================================

/// One cell of a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatValue {
    /// Integer counter
    Int(i64),
    /// Floating-point measurement
    Float(f64),
    /// Pass-through text field (e.g. `job_id`)
    Text(String),
}

impl StatValue {
    /// Sum of two numeric values; integer stays integer, any float promotes
    ///
    /// Returns `None` when either side is text.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a + b)),
            (Self::Int(a), Self::Float(b)) => Some(Self::Float(*a as f64 + b)),
            (Self::Float(a), Self::Int(b)) => Some(Self::Float(a + *b as f64)),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a + b)),
            _ => None,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

// ============================================================================
// Result rows
// ============================================================================

/// One test case's parsed result row, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    values: IndexMap<String, StatValue>,
}

impl RawResult {
    /// Empty row
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field, keeping first-insertion order
    pub fn insert(&mut self, key: impl Into<String>, value: StatValue) {
        self.values.insert(key.into(), value);
    }

    /// Add `value` into an existing numeric field, or insert it fresh
    ///
    /// This is the stat-file merge rule: simulators may emit stats in
    /// several partial files, and values sharing a key are summed, never
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::ParseFailure`] when either side is text.
    pub fn accumulate(&mut self, key: &str, value: StatValue) -> Result<()> {
        match self.values.get(key) {
            None => {
                self.values.insert(key.to_string(), value);
                Ok(())
            }
            Some(existing) => {
                let sum =
                    existing
                        .checked_add(&value)
                        .ok_or_else(|| MedirError::ParseFailure {
                            context: format!("stat '{key}'"),
                            reason: "cannot accumulate non-numeric values".to_string(),
                        })?;
                self.values.insert(key.to_string(), sum);
                Ok(())
            }
        }
    }

    /// Value of a field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StatValue> {
        self.values.get(key)
    }

    /// Field names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// CSV aggregation
// ============================================================================

/// Render result rows as one CSV table
///
/// The header is row 0's keys in insertion order; every row is emitted under
/// exactly that column list. Output is byte-deterministic for a fixed input
/// sequence.
///
/// # Errors
///
/// Returns [`MedirError::SchemaMismatch`] when any row's key set differs
/// from row 0's (extra or missing keys). Callers must keep one aggregation
/// batch schema-homogeneous.
pub fn aggregate_csv(results: &[RawResult]) -> Result<String> {
    use fmt::Write;

    let Some(first) = results.first() else {
        return Ok(String::new());
    };
    let columns: Vec<&str> = first.keys().collect();

    let mut out = String::new();
    let header: Vec<String> = columns.iter().map(|c| csv_field(c)).collect();
    let _ = writeln!(out, "{}", header.join(","));

    for (row_idx, row) in results.iter().enumerate() {
        check_schema(&columns, row, row_idx)?;
        let cells: Vec<String> = columns
            .iter()
            .map(|col| {
                // check_schema guarantees presence
                row.get(col)
                    .map(|v| csv_field(&v.to_string()))
                    .unwrap_or_default()
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join(","));
    }
    Ok(out)
}

/// Aggregate rows and write the table to `path`
///
/// # Errors
///
/// Propagates [`aggregate_csv`] errors and I/O failures.
pub fn write_results_csv(path: &Path, results: &[RawResult]) -> Result<()> {
    let table = aggregate_csv(results)?;
    fs::write(path, table).map_err(|e| MedirError::IoError {
        message: format!("failed to write result table {}: {e}", path.display()),
    })
}

fn check_schema(columns: &[&str], row: &RawResult, row_idx: usize) -> Result<()> {
    let missing: Vec<&str> = columns
        .iter()
        .filter(|col| row.get(col).is_none())
        .copied()
        .collect();
    let unexpected: Vec<&str> = row.keys().filter(|key| !columns.contains(key)).collect();
    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }
    Err(MedirError::SchemaMismatch {
        row: row_idx,
        detail: format!("missing keys {missing:?}, unexpected keys {unexpected:?}"),
    })
}

/// Quote a CSV field when it contains a delimiter, quote, or newline
fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
