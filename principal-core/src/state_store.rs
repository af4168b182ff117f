//! Atomic on-disk counters: loop count, consecutive failures, per-PR review
//! attempts.
//!
//! Each counter is a single text file holding a decimal integer. A read
//! failure (missing file, garbage contents) is treated as zero -- counters
//! are advisory bookkeeping, not a source of truth the engine trusts blindly.
//! Writes go through a temp-file-then-rename so a crash mid-write never
//! leaves a torn value on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{Error, Result};

/// Atomic counter storage rooted at `<state_root>/state/`
pub struct StateStore {
    state_dir: PathBuf,
    // Held for the whole read-modify-write of any counter, defeating any
    // concurrent invocation within this process. Cross-process exclusion is
    // the outer driver's responsibility (see the crate's concurrency notes).
    lock: Mutex<()>,
}

impl StateStore {
    /// Open a state store rooted at `state_root` (its `state/` subdirectory
    /// is created lazily on first write).
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_root.into().join("state"),
            lock: Mutex::new(()),
        }
    }

    fn loop_count_path(&self) -> PathBuf {
        self.state_dir.join("loop_count")
    }

    fn consecutive_failures_path(&self) -> PathBuf {
        self.state_dir.join("consecutive_failures")
    }

    fn review_attempts_path(&self, pr_number: u64) -> PathBuf {
        self.state_dir
            .join("attempts")
            .join(format!("review-pr-{pr_number}"))
    }

    pub fn read_loop_count(&self) -> u64 {
        read_counter(&self.loop_count_path())
    }

    /// Increment and persist `loop_count`, returning the new value.
    ///
    /// Fails only when the durable write itself fails; per the engine's
    /// contract that is treated as fatal for the tick.
    pub fn increment_loop_count(&self) -> Result<u64> {
        let _guard = self.lock.lock().unwrap();
        let next = read_counter(&self.loop_count_path()) + 1;
        write_counter(&self.loop_count_path(), next)?;
        Ok(next)
    }

    pub fn read_consecutive_failures(&self) -> u64 {
        read_counter(&self.consecutive_failures_path())
    }

    pub fn write_consecutive_failures(&self, value: u64) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        write_counter(&self.consecutive_failures_path(), value)
    }

    pub fn read_review_attempts(&self, pr_number: u64) -> u64 {
        read_counter(&self.review_attempts_path(pr_number))
    }

    /// Increment and persist the review-attempt counter for `pr_number`.
    ///
    /// Every increment must be durably persisted before the engine
    /// authorizes the corresponding retry; callers escalate to human review
    /// when this returns an error instead of authorizing an unbounded retry.
    pub fn increment_review_attempts(&self, pr_number: u64) -> Result<u64> {
        let _guard = self.lock.lock().unwrap();
        let path = self.review_attempts_path(pr_number);
        let next = read_counter(&path) + 1;
        write_counter(&path, next)?;
        Ok(next)
    }
}

fn read_counter(path: &Path) -> u64 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

fn write_counter(path: &Path, value: u64) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        Error::StateStore(format!("counter path {} has no parent", path.display()))
    })?;
    fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("counter"),
        std::process::id()
    ));
    fs::write(&tmp_path, value.to_string())?;

    if fs::rename(&tmp_path, path).is_err() {
        // Some platforms cannot atomically rename over an existing file.
        let _ = fs::remove_file(path);
        fs::rename(&tmp_path, path)?;
    }

    Ok(())
}
