//! Trace file cache keyed by benchmark family, pattern, and footprint size
//!
//! Trace generation dominates suite setup for large footprints, so traces
//! shared by every job of a pattern family live under
//! `<root>/trace/<family>[/<pattern>]/<size>.trace.txt` and are reused on
//! hit. The key deliberately excludes the repeat round and the RNG seed:
//! pointer-chasing cache entries are non-reproducible across misses but
//! stable across hits.
//!
//! Publication is atomic: a miss writes to a temp file in the destination
//! directory and renames it into place without clobbering, so a concurrent
//! reader can never observe a partially-written trace. When two writers race
//! on the same key, the first rename wins and the loser reuses the winner's
//! entry.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{MedirError, Result};
use crate::trace::{format_trace, write_trace, AccessRecord};

/// Cache identity of a generated trace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceKey {
    /// Benchmark family, e.g. `bandwidth` or `ptr_chasing`
    pub family: String,
    /// Access pattern within the family; `None` for single-pattern families
    pub pattern: Option<String>,
    /// Numeric discriminator: access size in bytes, or iteration count
    pub size: u64,
}

impl TraceKey {
    /// Key with a pattern component
    #[must_use]
    pub fn new(family: &str, pattern: &str, size: u64) -> Self {
        Self {
            family: family.to_string(),
            pattern: Some(pattern.to_string()),
            size,
        }
    }

    /// Key for a family without per-pattern variants
    #[must_use]
    pub fn without_pattern(family: &str, size: u64) -> Self {
        Self {
            family: family.to_string(),
            pattern: None,
            size,
        }
    }

    /// Path of this entry relative to the cache root
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::from("trace").join(&self.family);
        if let Some(pattern) = &self.pattern {
            path = path.join(pattern);
        }
        path.join(format!("{}.trace.txt", self.size))
    }
}

/// Shared cache of generated trace files
#[derive(Debug, Clone)]
pub struct WorkloadCache {
    root: PathBuf,
}

impl WorkloadCache {
    /// Cache rooted at `root`; entries live under `root/trace/`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path of a key's cache entry
    #[must_use]
    pub fn entry_path(&self, key: &TraceKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Return a trace file for `key`, generating it if needed
    ///
    /// With `cacheable`, an existing entry is returned untouched; a miss
    /// invokes `generate` and publishes the result atomically at the
    /// canonical cache path. Without `cacheable`, the trace is always
    /// generated fresh at `local_path`.
    ///
    /// # Errors
    ///
    /// Propagates generation errors, [`MedirError::IoError`] on filesystem
    /// failures, and [`MedirError::CacheRace`] when atomic publication fails
    /// for a reason other than losing the rename race.
    pub fn resolve<F>(
        &self,
        key: &TraceKey,
        cacheable: bool,
        local_path: &Path,
        generate: F,
    ) -> Result<PathBuf>
    where
        F: FnOnce() -> Result<Vec<AccessRecord>>,
    {
        if !cacheable {
            let records = generate()?;
            write_trace(local_path, &records)?;
            return Ok(local_path.to_path_buf());
        }

        let path = self.entry_path(key);
        if path.exists() {
            tracing::debug!(path = %path.display(), "trace cache hit");
            return Ok(path);
        }

        let parent = path.parent().ok_or_else(|| MedirError::IoError {
            message: format!("cache path {} has no parent", path.display()),
        })?;
        fs::create_dir_all(parent).map_err(|e| MedirError::IoError {
            message: format!("failed to create cache dir {}: {e}", parent.display()),
        })?;

        let records = generate()?;
        publish_atomic(parent, &path, &records)?;
        tracing::debug!(path = %path.display(), records = records.len(), "trace cache fill");
        Ok(path)
    }
}

/// Write `records` to a temp file in `dir` and rename it to `dest` without
/// clobbering. Losing the rename race to a concurrent writer is benign.
fn publish_atomic(dir: &Path, dest: &Path, records: &[AccessRecord]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MedirError::IoError {
        message: format!("failed to create temp trace in {}: {e}", dir.display()),
    })?;
    tmp.write_all(format_trace(records).as_bytes())
        .map_err(|e| MedirError::IoError {
            message: format!("failed to write temp trace: {e}"),
        })?;

    match tmp.persist_noclobber(dest) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            tracing::debug!(path = %dest.display(), "lost cache publication race, reusing winner");
            Ok(())
        }
        Err(_) => Err(MedirError::CacheRace {
            path: dest.display().to_string(),
        }),
    }
}
