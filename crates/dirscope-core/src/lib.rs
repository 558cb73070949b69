//! dirscope-core — disk-usage analysis engine.
//!
//! This crate contains all analysis logic with zero UI dependencies. It
//! is designed to be reusable across different frontends (CLI, TUI, GUI).
//!
//! # Modules
//!
//! - [`model`] — Arena-allocated file tree and supporting types.
//! - [`analyze`] — Parallel and sequential traversal with progress
//!   reporting, cancellation, and hardlink deduplication.
//! - [`aggregate`] — Bottom-up statistics and child sorting.
//! - [`ignore`] — Composable entry filters.
//! - [`platform`] — Mount enumeration and per-file platform attributes.
//! - [`report`] — Round-trip serialization of analyzed trees.

pub mod aggregate;
pub mod analyze;
pub mod error;
pub mod ignore;
pub mod model;
pub mod platform;
pub mod report;

pub use aggregate::{SortKey, SortSpec};
pub use analyze::{start_scan, AnalysisHandle, AnalyzeOptions, Progress, ProgressSnapshot};
pub use error::{AnalyzeError, ReportError};
pub use ignore::IgnorePredicate;
pub use model::{FileTree, NodeIndex};
pub use platform::{list_mounts, Device};

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Analyze a path and return the fully aggregated tree, children sorted
/// by `sort`.
///
/// Blocking convenience over [`analyze::scan`] + the aggregator; use
/// [`start_scan`] when the caller needs to poll progress or cancel.
pub fn analyze(
    path: &Path,
    predicate: Arc<IgnorePredicate>,
    opts: &AnalyzeOptions,
    sort: SortSpec,
) -> Result<FileTree, AnalyzeError> {
    let progress = Arc::new(Progress::new());
    let cancel = Arc::new(AtomicBool::new(false));
    let mut tree = analyze::scan(path, predicate, opts, progress, cancel)?;
    aggregate::aggregate(&mut tree);
    aggregate::sort_children(&mut tree, sort);
    Ok(tree)
}

/// Root-level totals of one analysis; the tree itself is not retained.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub root_path: PathBuf,
    pub total_size: u64,
    pub total_allocated: u64,
    pub item_count: u64,
    pub errors_seen: u64,
    pub has_errors: bool,
    pub incomplete: bool,
    /// The N largest files, as `(full path, byte size)`, largest first.
    pub largest_files: Vec<(String, u64)>,
}

/// Analyze a path, fold aggregates, and keep only the root totals plus
/// the `top_n` largest files.
pub fn summarize(
    path: &Path,
    predicate: Arc<IgnorePredicate>,
    opts: &AnalyzeOptions,
    top_n: usize,
) -> Result<AnalysisSummary, AnalyzeError> {
    let progress = Arc::new(Progress::new());
    let cancel = Arc::new(AtomicBool::new(false));
    let mut tree = analyze::scan(path, predicate, opts, Arc::clone(&progress), cancel)?;
    aggregate::aggregate(&mut tree);

    let root = tree
        .root
        .ok_or_else(|| AnalyzeError::Traversal("analysis produced no root".into()))?;
    let largest_files = aggregate::largest_files(&tree, top_n)
        .into_iter()
        .map(|idx| (tree.full_path_string(idx), tree.node(idx).size))
        .collect();

    let node = tree.node(root);
    Ok(AnalysisSummary {
        root_path: tree.full_path(root),
        total_size: node.agg_size,
        total_allocated: node.agg_allocated,
        item_count: node.item_count,
        errors_seen: progress.errors_seen(),
        has_errors: node.has_errors,
        incomplete: tree.incomplete,
        largest_files,
    })
}
