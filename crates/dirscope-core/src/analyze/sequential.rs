/// Sequential analyzer — one worker, deterministic traversal order.
///
/// Shares the directory reader with the parallel analyzer, so both
/// produce identical node semantics; this one visits subdirectories
/// depth-first in directory-read order, which makes runs reproducible.
use super::{read_directory, ScanContext};
use crate::model::NodeIndex;
use std::path::Path;
use std::sync::atomic::Ordering;

pub(crate) fn run(ctx: &ScanContext, root_idx: NodeIndex, root_path: &Path) {
    if ctx.cancel.load(Ordering::Relaxed) {
        return;
    }
    for (child_idx, child_path) in read_directory(ctx, root_idx, root_path) {
        run(ctx, child_idx, &child_path);
    }
}
