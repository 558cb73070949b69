/// Traversal progress — a handle the analyzer writes and collaborators
/// poll, with no channel draining and no process-wide state.
///
/// Counters are relaxed atomics; the snapshot is eventually consistent
/// and never blocks the worker pool.
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared between the analysis thread(s) and any number of observers.
#[derive(Debug, Default)]
pub struct Progress {
    files_seen: AtomicU64,
    dirs_seen: AtomicU64,
    bytes_seen: AtomicU64,
    errors_seen: AtomicU64,
    finished: AtomicBool,
    current: Mutex<String>,
}

/// One eventually-consistent read of the counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub items_done: u64,
    pub bytes_done: u64,
    pub errors_seen: u64,
    pub current_item_path: String,
    pub finished: bool,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_file(&self, bytes: u64) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
        self.bytes_seen.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_dir(&self) {
        self.dirs_seen.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_error(&self) {
        self.errors_seen.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the directory currently being read. Called once per
    /// directory task, so lock traffic stays negligible.
    pub fn set_current(&self, path: &std::path::Path) {
        *self.current.lock() = path.to_string_lossy().into_owned();
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn errors_seen(&self) -> u64 {
        self.errors_seen.load(Ordering::Relaxed)
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            items_done: self.files_seen.load(Ordering::Relaxed)
                + self.dirs_seen.load(Ordering::Relaxed),
            bytes_done: self.bytes_seen.load(Ordering::Relaxed),
            errors_seen: self.errors_seen.load(Ordering::Relaxed),
            current_item_path: self.current.lock().clone(),
            finished: self.finished.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn snapshot_reflects_counters() {
        let progress = Progress::new();
        progress.add_dir();
        progress.add_file(100);
        progress.add_file(50);
        progress.add_error();
        progress.set_current(Path::new("/scan/here"));

        let snap = progress.snapshot();
        assert_eq!(snap.items_done, 3);
        assert_eq!(snap.bytes_done, 150);
        assert_eq!(snap.errors_seen, 1);
        assert_eq!(snap.current_item_path, "/scan/here");
        assert!(!snap.finished);

        progress.mark_finished();
        assert!(progress.snapshot().finished);
    }
}
