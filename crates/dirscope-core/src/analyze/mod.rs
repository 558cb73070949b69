/// Analyzer — walks the filesystem and builds the tree.
///
/// Two implementations share one directory reader: [`parallel`] runs a
/// bounded worker pool fed by a task queue, [`sequential`] recurses with
/// a single worker and deterministic order. Both write into a shared
/// `Arc<RwLock<FileTree>>` with one write-lock acquisition per directory,
/// so observers may render the growing tree while the scan runs.
pub mod hardlink;
pub mod parallel;
pub mod progress;
pub mod sequential;

pub use progress::{Progress, ProgressSnapshot};

use crate::error::AnalyzeError;
use crate::ignore::IgnorePredicate;
use crate::model::{FileNode, FileTree, NodeErrorKind, NodeIndex, NodeKind};
use crate::platform::stat;
use compact_str::CompactString;
use hardlink::HardlinkRegistry;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// A shared, concurrently-readable file tree under construction.
pub type SharedTree = Arc<RwLock<FileTree>>;

/// Knobs for one analysis run. The ignore predicate travels separately
/// because it is shared read-only across workers.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Use the single-worker analyzer with deterministic traversal order.
    pub sequential: bool,
    /// Worker count for the parallel analyzer; defaults to the number of
    /// hardware threads.
    pub worker_count: Option<usize>,
    /// Arena pre-allocation hint.
    pub estimated_nodes: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            sequential: false,
            worker_count: None,
            estimated_nodes: 100_000,
        }
    }
}

/// Everything a traversal worker needs, shared behind one `Arc`.
pub(crate) struct ScanContext {
    pub tree: SharedTree,
    pub predicate: Arc<IgnorePredicate>,
    pub hardlinks: HardlinkRegistry,
    pub progress: Arc<Progress>,
    pub cancel: Arc<AtomicBool>,
}

/// Handle to a running analysis. The calling thread stays free to poll
/// progress and request cancellation.
pub struct AnalysisHandle {
    progress: Arc<Progress>,
    cancel: Arc<AtomicBool>,
    thread: thread::JoinHandle<Result<FileTree, AnalyzeError>>,
}

impl AnalysisHandle {
    /// Request the scan to stop as soon as possible. The partial tree is
    /// still returned from [`join`], with its root flagged incomplete.
    ///
    /// [`join`]: AnalysisHandle::join
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// The progress handle, pollable from any thread.
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Wait for the analysis to finish and take the tree.
    pub fn join(self) -> Result<FileTree, AnalyzeError> {
        self.thread
            .join()
            .map_err(|_| AnalyzeError::Traversal("analysis thread panicked".into()))?
    }
}

/// Start an analysis on a background thread.
pub fn start_scan(
    path: &Path,
    predicate: Arc<IgnorePredicate>,
    opts: AnalyzeOptions,
) -> Result<AnalysisHandle, AnalyzeError> {
    let progress = Arc::new(Progress::new());
    let cancel = Arc::new(AtomicBool::new(false));
    let path = path.to_path_buf();
    let thread_progress = Arc::clone(&progress);
    let thread_cancel = Arc::clone(&cancel);

    let thread = thread::Builder::new()
        .name("dirscope-analyzer".into())
        .spawn(move || scan(&path, predicate, &opts, thread_progress, thread_cancel))
        .map_err(|err| AnalyzeError::Traversal(format!("failed to spawn analysis thread: {err}")))?;

    Ok(AnalysisHandle {
        progress,
        cancel,
        thread,
    })
}

/// Run an analysis on the calling thread and return the raw (not yet
/// aggregated) tree.
pub fn scan(
    path: &Path,
    predicate: Arc<IgnorePredicate>,
    opts: &AnalyzeOptions,
    progress: Arc<Progress>,
    cancel: Arc<AtomicBool>,
) -> Result<FileTree, AnalyzeError> {
    let resolved = fs::canonicalize(path).map_err(|source| AnalyzeError::PathResolution {
        path: path.to_path_buf(),
        source,
    })?;
    let meta = fs::symlink_metadata(&resolved).map_err(|source| AnalyzeError::PathResolution {
        path: path.to_path_buf(),
        source,
    })?;

    let name = root_name(&resolved);
    let base = resolved
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let attrs = stat::stat_platform(&meta);

    let tree: SharedTree = Arc::new(RwLock::new(FileTree::with_capacity(opts.estimated_nodes)));
    let ctx = Arc::new(ScanContext {
        tree: Arc::clone(&tree),
        predicate,
        hardlinks: HardlinkRegistry::new(),
        progress: Arc::clone(&progress),
        cancel: Arc::clone(&cancel),
    });

    if meta.is_dir() {
        if let Some(dev) = stat::device_id(&meta) {
            ctx.predicate.fix_root_device(dev);
        }
        let root_idx = {
            let mut t = tree.write();
            let mut node = FileNode::new_dir(name, None);
            node.size = meta.len();
            node.allocated = attrs.allocated;
            node.mtime = attrs.mtime;
            t.set_root(node, &base)
        };
        progress.add_dir();

        if opts.sequential {
            sequential::run(&ctx, root_idx, &resolved);
        } else {
            let workers = opts.worker_count.unwrap_or_else(num_cpus::get).max(1);
            debug!("parallel scan of {} with {workers} workers", resolved.display());
            parallel::run(&ctx, root_idx, &resolved, workers)?;
        }
    } else {
        // A regular-file starting path yields a single-node tree with no
        // directory wrapper.
        let mut node = FileNode::new_file(name, meta.len(), None);
        node.allocated = attrs.allocated;
        node.mtime = attrs.mtime;
        if let Some(link) = attrs.link {
            node.kind = NodeKind::File {
                link: Some(link.key),
                multiplicity: 1,
                primary: true,
            };
        }
        tree.write().set_root(node, &base);
        progress.add_file(meta.len());
    }

    ctx.hardlinks.finalize(&mut tree.write());
    let cancelled = cancel.load(Ordering::Relaxed);
    drop(ctx);

    let mut tree = Arc::try_unwrap(tree)
        .map_err(|_| AnalyzeError::Traversal("tree still shared after traversal".into()))?
        .into_inner();
    tree.incomplete = cancelled;
    progress.mark_finished();
    Ok(tree)
}

/// Display name for the analysis root: the final path component, or the
/// whole path for filesystem roots like "/".
fn root_name(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => CompactString::new(path.to_string_lossy()),
    }
}

/// One directory entry staged for batch insertion.
struct StagedEntry {
    node: FileNode,
    /// Path to enqueue as a new directory-read task.
    descend: Option<PathBuf>,
    /// Shared-inode key to record after insertion.
    link: Option<crate::model::HardlinkKey>,
}

/// Read one directory, create nodes for the surviving entries, and attach
/// them under a single write-lock acquisition. Returns the subdirectories
/// to descend into.
///
/// Exactly one worker processes a given directory, so its child list ends
/// up in directory-read order.
pub(crate) fn read_directory(
    ctx: &ScanContext,
    dir_idx: NodeIndex,
    dir_path: &Path,
) -> Vec<(NodeIndex, PathBuf)> {
    ctx.progress.set_current(dir_path);

    let entries = match fs::read_dir(dir_path) {
        Ok(entries) => entries,
        Err(err) => {
            // The directory node exists but cannot be listed: it becomes
            // an error placeholder and traversal moves on.
            debug!("cannot open {}: {err}", dir_path.display());
            let kind = NodeErrorKind::from_io(&err);
            let mut tree = ctx.tree.write();
            let node = tree.node_mut(dir_idx);
            node.kind = NodeKind::Error(kind);
            node.has_errors = true;
            drop(tree);
            ctx.progress.add_error();
            return Vec::new();
        }
    };

    let mut staged: Vec<StagedEntry> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("unreadable entry in {}: {err}", dir_path.display());
                ctx.progress.add_error();
                continue;
            }
        };

        let name_os = entry.file_name();
        let name = name_os.to_string_lossy().into_owned();
        let path = dir_path.join(&name_os);

        if ctx.predicate.should_ignore(&name, &path) {
            continue;
        }

        // Entry kind from the directory-entry record first; fall back to
        // stat when the record cannot say.
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => match fs::symlink_metadata(&path) {
                Ok(meta) => meta.file_type(),
                Err(err) => {
                    staged.push(error_entry(&name, &err, dir_idx));
                    ctx.progress.add_error();
                    continue;
                }
            },
        };

        if file_type.is_dir() {
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    staged.push(error_entry(&name, &err, dir_idx));
                    ctx.progress.add_error();
                    continue;
                }
            };
            // Name and path filters already ran; only the mount-crossing
            // decision needs the metadata.
            if matches!(stat::device_id(&meta), Some(dev) if ctx.predicate.crosses_mount(dev)) {
                continue;
            }
            let attrs = stat::stat_platform(&meta);
            let mut node = FileNode::new_dir(CompactString::new(&name), Some(dir_idx));
            node.size = meta.len();
            node.allocated = attrs.allocated;
            node.mtime = attrs.mtime;
            staged.push(StagedEntry {
                node,
                descend: Some(path),
                link: None,
            });
            ctx.progress.add_dir();
        } else if file_type.is_symlink() {
            // Never followed; the size is the length of the link text.
            let target_len = fs::read_link(&path)
                .map(|target| target.as_os_str().len() as u64)
                .unwrap_or(0);
            let mut node = FileNode::new_symlink(CompactString::new(&name), target_len, Some(dir_idx));
            node.mtime = fs::symlink_metadata(&path)
                .ok()
                .and_then(|meta| meta.modified().ok());
            staged.push(StagedEntry {
                node,
                descend: None,
                link: None,
            });
            ctx.progress.add_file(target_len);
        } else {
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    staged.push(error_entry(&name, &err, dir_idx));
                    ctx.progress.add_error();
                    continue;
                }
            };
            let attrs = stat::stat_platform(&meta);
            let mut node = FileNode::new_file(CompactString::new(&name), meta.len(), Some(dir_idx));
            node.allocated = attrs.allocated;
            node.mtime = attrs.mtime;
            staged.push(StagedEntry {
                node,
                descend: None,
                link: attrs.link.map(|link| link.key),
            });
            ctx.progress.add_file(meta.len());
        }
    }

    // One write lock per directory: insert and link the whole batch.
    let mut subdirs = Vec::new();
    let mut links = Vec::new();
    {
        let mut tree = ctx.tree.write();
        for entry in staged {
            let idx = tree.add_node(entry.node);
            tree.attach(dir_idx, idx);
            if let Some(path) = entry.descend {
                subdirs.push((idx, path));
            }
            if let Some(key) = entry.link {
                links.push((key, idx));
            }
        }
    }
    for (key, idx) in links {
        ctx.hardlinks.record(key, idx);
    }
    subdirs
}

fn error_entry(name: &str, err: &std::io::Error, parent: NodeIndex) -> StagedEntry {
    StagedEntry {
        node: FileNode::new_error(
            CompactString::new(name),
            NodeErrorKind::from_io(err),
            Some(parent),
        ),
        descend: None,
        link: None,
    }
}
