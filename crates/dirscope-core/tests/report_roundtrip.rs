//! Report round-trip integration tests.
//!
//! Analyze a real temporary tree, export it, parse the report back, and
//! verify the reconstructed tree matches — structure, sizes, hardlink
//! accounting, and aggregates.

use dirscope_core::model::FileTree;
use dirscope_core::{analyze, report, AnalyzeOptions, IgnorePredicate, NodeIndex, SortSpec};
use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

fn scan(path: &Path) -> FileTree {
    analyze(
        path,
        Arc::new(IgnorePredicate::new()),
        &AnalyzeOptions::default(),
        SortSpec::default(),
    )
    .expect("analysis failed")
}

fn roundtrip(tree: &FileTree) -> FileTree {
    let mut buf = Vec::new();
    report::write_tree(tree, &mut buf).expect("export");
    report::read_tree(Cursor::new(buf)).expect("import")
}

/// `(path, own size, aggregated size, item count)` per node.
fn node_set(tree: &FileTree) -> BTreeSet<(String, u64, u64, u64)> {
    (0..tree.nodes.len())
        .map(|i| {
            let idx = NodeIndex::new(i);
            let node = tree.node(idx);
            (
                tree.full_path_string(idx),
                node.size,
                node.agg_size,
                node.item_count,
            )
        })
        .collect()
}

/// Scenario: nested tree with known sizes survives export + import.
#[test]
fn scanned_tree_roundtrips() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("file"), 5);
    let sub = tmp.path().join("nested").join("subnested");
    fs::create_dir_all(&sub).unwrap();
    write_bytes(&sub.join("file2"), 2);

    let original = scan(tmp.path());
    let parsed = roundtrip(&original);

    assert_eq!(node_set(&original), node_set(&parsed));

    let root = parsed.root.unwrap();
    assert_eq!(parsed.node(root).agg_size, 7);
    assert_eq!(parsed.node(root).item_count, 5);
    assert_eq!(parsed.base_path, original.base_path);

    // Modification times round-trip at second precision. The two arenas
    // may order nodes differently, so pair them up by path.
    let mtimes = |tree: &FileTree| -> std::collections::BTreeMap<String, Option<std::time::SystemTime>> {
        (0..tree.nodes.len())
            .map(|i| {
                let idx = NodeIndex::new(i);
                (tree.full_path_string(idx), tree.node(idx).mtime)
            })
            .collect()
    };
    for ((path, a), (_, b)) in mtimes(&original).into_iter().zip(mtimes(&parsed)) {
        match (a, b) {
            (Some(a), Some(b)) => {
                let delta = a
                    .duration_since(b)
                    .unwrap_or_else(|err| err.duration())
                    .as_secs();
                assert_eq!(delta, 0, "mtime drifted for {path}");
            }
            (None, None) => {}
            other => panic!("mtime presence mismatch for {path}: {other:?}"),
        }
    }
}

/// Hardlink groups keep their dedup accounting through the trip.
#[cfg(unix)]
#[test]
fn hardlinked_tree_roundtrips() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a");
    write_bytes(&a, 100);
    fs::hard_link(&a, tmp.path().join("b")).unwrap();

    let original = scan(tmp.path());
    let parsed = roundtrip(&original);

    assert_eq!(
        parsed.node(parsed.root.unwrap()).agg_size,
        100,
        "deduplicated total survives"
    );
    assert_eq!(node_set(&original), node_set(&parsed));
}

/// A second trip through the codec is byte-identical: the format is
/// canonical.
#[test]
fn double_roundtrip_is_stable() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("x.bin"), 512);
    fs::create_dir(tmp.path().join("d")).unwrap();
    write_bytes(&tmp.path().join("d").join("y.bin"), 256);

    let tree = scan(tmp.path());
    let mut first = Vec::new();
    report::write_tree(&tree, &mut first).unwrap();
    let reparsed = report::read_tree(Cursor::new(first.clone())).unwrap();
    let mut second = Vec::new();
    report::write_tree(&reparsed, &mut second).unwrap();

    assert_eq!(first, second);
}

/// Import straight from a file handle, the way the CLI wires it.
#[test]
fn export_to_file_and_import() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("payload"), 333);
    let tree = scan(tmp.path());

    let report_path = tmp.path().join("export.dsr");
    {
        let file = fs::File::create(&report_path).unwrap();
        report::write_tree(&tree, file).unwrap();
    }
    let parsed = {
        let file = fs::File::open(&report_path).unwrap();
        report::read_tree(std::io::BufReader::new(file)).unwrap()
    };

    assert_eq!(parsed.node(parsed.root.unwrap()).agg_size, 333);
}
