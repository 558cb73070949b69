/// Parallel analyzer — a bounded worker pool over a directory-task queue.
///
/// Every directory read is one task. A global `in_flight` counter tracks
/// outstanding tasks; the run is complete when it reaches zero, at which
/// point the finishing worker broadcasts shutdown to the pool. Blocking
/// filesystem calls happen only on pool threads, never on the caller's.
use super::{read_directory, ScanContext};
use crate::error::AnalyzeError;
use crate::model::NodeIndex;
use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

enum Task {
    Read(NodeIndex, PathBuf),
    Shutdown,
}

/// Walk `root_path` with `workers` pool threads. Returns once the queue
/// has drained and every worker has exited.
pub(crate) fn run(
    ctx: &Arc<ScanContext>,
    root_idx: NodeIndex,
    root_path: &Path,
    workers: usize,
) -> Result<(), AnalyzeError> {
    let (tx, rx) = crossbeam_channel::unbounded::<Task>();
    let in_flight = Arc::new(AtomicUsize::new(1));
    tx.send(Task::Read(root_idx, root_path.to_path_buf()))
        .map_err(|_| AnalyzeError::Traversal("task queue closed before start".into()))?;

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let worker_ctx = Arc::clone(ctx);
        let worker_tx = tx.clone();
        let rx = rx.clone();
        let in_flight = Arc::clone(&in_flight);
        let spawned = thread::Builder::new()
            .name(format!("dirscope-worker-{worker_id}"))
            .spawn(move || worker_loop(&worker_ctx, &worker_tx, &rx, &in_flight, workers));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                // Pool failure is fatal: stop whatever already started and
                // report up. The partial tree is discarded by the caller.
                ctx.cancel.store(true, Ordering::Relaxed);
                for _ in 0..handles.len() {
                    let _ = tx.send(Task::Shutdown);
                }
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(AnalyzeError::Traversal(format!(
                    "failed to spawn worker thread: {err}"
                )));
            }
        }
    }
    drop(tx);

    let mut panicked = false;
    for handle in handles {
        panicked |= handle.join().is_err();
    }
    if panicked {
        return Err(AnalyzeError::Traversal("worker thread panicked".into()));
    }
    Ok(())
}

fn worker_loop(
    ctx: &ScanContext,
    tx: &Sender<Task>,
    rx: &Receiver<Task>,
    in_flight: &AtomicUsize,
    workers: usize,
) {
    while let Ok(task) = rx.recv() {
        let (idx, path) = match task {
            Task::Shutdown => break,
            Task::Read(idx, path) => (idx, path),
        };

        // Cancellation is checked at task entry; a cancelled worker
        // drains its task without starting the directory read.
        if !ctx.cancel.load(Ordering::Relaxed) {
            for (child_idx, child_path) in read_directory(ctx, idx, &path) {
                in_flight.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(Task::Read(child_idx, child_path));
            }
        }

        if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Last outstanding task: the queue holds no more reads, so
            // release the whole pool.
            for _ in 0..workers {
                let _ = tx.send(Task::Shutdown);
            }
        }
    }
}
