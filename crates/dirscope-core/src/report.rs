//! Report codec — round-trips an analyzed tree through a portable
//! textual format.
//!
//! The report is line-delimited JSON: a header record carrying the
//! version tag, then one record per node in depth-first pre-order.
//! Directory records carry the count of immediate children, which is how
//! the decoder knows when a subtree closes; both directions therefore run
//! in memory proportional to the deepest subtree, not the total tree
//! size. JSON string escaping covers the record delimiter and
//! non-printable bytes in names.
use crate::aggregate;
use crate::error::ReportError;
use crate::model::{FileNode, FileTree, HardlinkKey, NodeErrorKind, NodeIndex, NodeKind};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};

const FORMAT_NAME: &str = "dirscope-report";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    format: String,
    version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum RecordKind {
    #[serde(rename = "d")]
    Directory,
    #[serde(rename = "f")]
    File,
    #[serde(rename = "l")]
    Symlink,
    #[serde(rename = "e")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum ErrorTag {
    #[serde(rename = "permission")]
    Permission,
    #[serde(rename = "vanished")]
    Vanished,
    #[serde(rename = "other")]
    Other,
}

/// One node on the wire. Short field names keep multi-million-entry
/// reports compact.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    k: RecordKind,
    n: String,
    /// Base path, present only on the root record.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    base: Option<String>,
    /// Byte size.
    #[serde(default)]
    s: u64,
    /// Allocated-on-disk size.
    #[serde(default)]
    a: u64,
    /// Modification time, epoch seconds.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    m: Option<i64>,
    /// Immediate child count; directories only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    c: Option<u64>,
    /// Hardlink identity and multiplicity; shared-inode files only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    dev: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    ino: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    nl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pri: Option<bool>,
    /// Error kind; error records only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    err: Option<ErrorTag>,
}

/// Serialize `tree` to `writer`, one record per line.
pub fn write_tree<W: Write>(tree: &FileTree, writer: W) -> Result<(), ReportError> {
    let mut out = BufWriter::new(writer);
    write_record(
        &mut out,
        &Header {
            format: FORMAT_NAME.to_string(),
            version: FORMAT_VERSION,
        },
    )?;

    let Some(root) = tree.root else {
        return Ok(());
    };

    // Iterative pre-order over the intrusive child lists; the ancestor
    // stack is the only per-size state and is bounded by tree depth.
    let mut stack: Vec<NodeIndex> = Vec::new();
    let mut cursor = Some(root);
    while let Some(idx) = cursor {
        let node = tree.node(idx);
        write_record(&mut out, &to_record(tree, idx, idx == root))?;

        if node.is_dir() && node.first_child.is_some() {
            stack.push(idx);
            cursor = node.first_child;
        } else {
            cursor = node.next_sibling;
            while cursor.is_none() {
                match stack.pop() {
                    Some(up) => cursor = tree.node(up).next_sibling,
                    None => break,
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Parse a report back into a tree. Aggregated fields are recomputed, so
/// the result reports the same totals the exported tree did.
pub fn read_tree<R: BufRead>(reader: R) -> Result<FileTree, ReportError> {
    let mut lines = reader.lines().enumerate();

    let header: Header = loop {
        match lines.next() {
            Some((line_no, line)) => {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                break serde_json::from_str(&line).map_err(|err| ReportError::Malformed {
                    line: line_no + 1,
                    reason: format!("bad header: {err}"),
                })?;
            }
            None => {
                return Err(ReportError::Malformed {
                    line: 1,
                    reason: "missing header record".into(),
                })
            }
        }
    };
    if header.format != FORMAT_NAME || header.version != FORMAT_VERSION {
        return Err(ReportError::VersionMismatch {
            found: header.version,
            expected: FORMAT_VERSION,
        });
    }

    let mut tree = FileTree::with_capacity(1024);
    // Open directories: (index, children still expected).
    let mut open: Vec<(NodeIndex, u64)> = Vec::new();

    for (line_no, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = line_no + 1;
        let record: Record =
            serde_json::from_str(&line).map_err(|err| ReportError::Malformed {
                line: line_no,
                reason: err.to_string(),
            })?;

        let child_count = match record.k {
            RecordKind::Directory => record.c.unwrap_or(0),
            _ => 0,
        };
        let node_kind = record.k;
        let node = from_record(record, line_no)?;

        let idx = if tree.root.is_none() {
            let base = node.0.clone().unwrap_or_default();
            tree.set_root(node.1, Path::new(&base))
        } else {
            let Some(&mut (parent, ref mut remaining)) = open.last_mut() else {
                return Err(ReportError::Malformed {
                    line: line_no,
                    reason: "record after the root subtree closed".into(),
                });
            };
            *remaining -= 1;
            let mut child = node.1;
            child.parent = Some(parent);
            let idx = tree.add_node(child);
            tree.attach(parent, idx);
            idx
        };

        if node_kind == RecordKind::Directory && child_count > 0 {
            open.push((idx, child_count));
        }
        while matches!(open.last(), Some(&(_, 0))) {
            open.pop();
        }
    }

    if !open.is_empty() {
        return Err(ReportError::Truncated(open.len()));
    }
    if tree.root.is_none() {
        return Err(ReportError::Malformed {
            line: 2,
            reason: "report contains no nodes".into(),
        });
    }

    aggregate::aggregate(&mut tree);
    Ok(tree)
}

fn write_record<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<(), ReportError> {
    serde_json::to_writer(&mut *out, value)
        .map_err(|err| ReportError::Io(std::io::Error::other(err)))?;
    out.write_all(b"\n")?;
    Ok(())
}

fn to_record(tree: &FileTree, idx: NodeIndex, is_root: bool) -> Record {
    let node = tree.node(idx);
    let mut record = Record {
        k: RecordKind::File,
        n: node.name.to_string(),
        base: is_root.then(|| tree.base_path.to_string_lossy().into_owned()),
        s: node.size,
        a: node.allocated,
        m: node.mtime.map(epoch_seconds),
        c: None,
        dev: None,
        ino: None,
        nl: None,
        pri: None,
        err: None,
    };

    match &node.kind {
        NodeKind::Directory => {
            record.k = RecordKind::Directory;
            record.c = Some(tree.children(idx).len() as u64);
        }
        NodeKind::File {
            link,
            multiplicity,
            primary,
        } => {
            if let Some(key) = link {
                record.dev = Some(key.device);
                record.ino = Some(key.inode);
                record.nl = Some(*multiplicity);
                record.pri = Some(*primary);
            }
        }
        NodeKind::Symlink => record.k = RecordKind::Symlink,
        NodeKind::Error(kind) => {
            record.k = RecordKind::Error;
            record.err = Some(match kind {
                NodeErrorKind::Permission => ErrorTag::Permission,
                NodeErrorKind::Vanished => ErrorTag::Vanished,
                NodeErrorKind::Other => ErrorTag::Other,
            });
        }
    }
    record
}

/// Turn a record into `(base_path, node)`. The base is `Some` only for
/// root records.
fn from_record(record: Record, line: usize) -> Result<(Option<String>, FileNode), ReportError> {
    let name = CompactString::new(&record.n);
    let mut node = match record.k {
        RecordKind::Directory => FileNode::new_dir(name, None),
        RecordKind::File => {
            let mut node = FileNode::new_file(name, record.s, None);
            if let (Some(device), Some(inode)) = (record.dev, record.ino) {
                node.kind = NodeKind::File {
                    link: Some(HardlinkKey { device, inode }),
                    multiplicity: record.nl.unwrap_or(1).max(1),
                    primary: record.pri.unwrap_or(true),
                };
            } else if record.dev.is_some() || record.ino.is_some() {
                return Err(ReportError::Malformed {
                    line,
                    reason: "hardlink record needs both dev and ino".into(),
                });
            }
            node
        }
        RecordKind::Symlink => FileNode::new_symlink(name, record.s, None),
        RecordKind::Error => {
            let kind = match record.err {
                Some(ErrorTag::Permission) => NodeErrorKind::Permission,
                Some(ErrorTag::Vanished) => NodeErrorKind::Vanished,
                _ => NodeErrorKind::Other,
            };
            FileNode::new_error(name, kind, None)
        }
    };
    node.size = record.s;
    node.allocated = record.a;
    node.mtime = record.m.map(from_epoch_seconds);
    Ok((record.base, node))
}

fn epoch_seconds(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(after) => after.as_secs() as i64,
        Err(err) => -(err.duration().as_secs() as i64),
    }
}

fn from_epoch_seconds(seconds: i64) -> SystemTime {
    if seconds >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_secs(seconds as u64)
    } else {
        SystemTime::UNIX_EPOCH - Duration::from_secs(seconds.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn file(tree: &mut FileTree, name: &str, size: u64, parent: NodeIndex) -> NodeIndex {
        let idx = tree.add_node(FileNode::new_file(
            CompactString::new(name),
            size,
            Some(parent),
        ));
        tree.attach(parent, idx);
        idx
    }

    fn sample_tree() -> FileTree {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("T"), None),
            Path::new("/tmp"),
        );
        file(&mut tree, "file", 5, root);
        let nested = tree.add_node(FileNode::new_dir(CompactString::new("nested"), Some(root)));
        tree.attach(root, nested);
        let sub = tree.add_node(FileNode::new_dir(
            CompactString::new("subnested"),
            Some(nested),
        ));
        tree.attach(nested, sub);
        file(&mut tree, "file2", 2, sub);
        aggregate::aggregate(&mut tree);
        tree
    }

    fn roundtrip(tree: &FileTree) -> FileTree {
        let mut buf = Vec::new();
        write_tree(tree, &mut buf).expect("export");
        read_tree(Cursor::new(buf)).expect("import")
    }

    #[test]
    fn roundtrip_preserves_structure_and_aggregates() {
        let tree = sample_tree();
        let parsed = roundtrip(&tree);

        let root = parsed.root.unwrap();
        assert_eq!(parsed.node(root).name, "T");
        assert_eq!(parsed.node(root).agg_size, 7);
        assert_eq!(parsed.node(root).item_count, 5);
        assert_eq!(parsed.base_path, Path::new("/tmp"));

        let names: Vec<_> = parsed
            .children(root)
            .iter()
            .map(|&c| parsed.node(c).name.clone())
            .collect();
        assert_eq!(names, vec!["file", "nested"]);

        let nested = parsed.children(root)[1];
        assert_eq!(parsed.node(nested).agg_size, 2);
        let file2 = parsed.children(parsed.children(nested)[0])[0];
        assert_eq!(parsed.node(file2).name, "file2");
        assert_eq!(parsed.node(file2).size, 2);
    }

    #[test]
    fn roundtrip_preserves_hardlink_accounting() {
        let mut tree = FileTree::with_capacity(4);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("H"), None),
            Path::new("/x"),
        );
        let key = HardlinkKey {
            device: 3,
            inode: 77,
        };
        let a = file(&mut tree, "a", 100, root);
        let b = file(&mut tree, "b", 100, root);
        tree.node_mut(a).kind = NodeKind::File {
            link: Some(key),
            multiplicity: 2,
            primary: true,
        };
        tree.node_mut(b).kind = NodeKind::File {
            link: Some(key),
            multiplicity: 2,
            primary: false,
        };
        aggregate::aggregate(&mut tree);
        assert_eq!(tree.node(root).agg_size, 100);

        let parsed = roundtrip(&tree);
        let root = parsed.root.unwrap();
        assert_eq!(parsed.node(root).agg_size, 100, "dedup survives the trip");
        match &parsed.node(parsed.children(root)[0]).kind {
            NodeKind::File {
                link,
                multiplicity,
                primary,
            } => {
                assert_eq!(*link, Some(key));
                assert_eq!(*multiplicity, 2);
                assert!(*primary);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn roundtrip_preserves_error_nodes() {
        let mut tree = FileTree::with_capacity(4);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("r"), None),
            Path::new("/"),
        );
        let bad = tree.add_node(FileNode::new_error(
            CompactString::new("secret"),
            NodeErrorKind::Permission,
            Some(root),
        ));
        tree.attach(root, bad);
        aggregate::aggregate(&mut tree);

        let parsed = roundtrip(&tree);
        let root = parsed.root.unwrap();
        assert!(parsed.node(root).has_errors);
        let child = parsed.children(root)[0];
        assert_eq!(
            parsed.node(child).kind,
            NodeKind::Error(NodeErrorKind::Permission)
        );
    }

    #[test]
    fn names_with_delimiters_survive() {
        let mut tree = FileTree::with_capacity(4);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("with space"), None),
            Path::new("C:\\Users"),
        );
        file(&mut tree, "line\nbreak", 1, root);
        file(&mut tree, "back\\slash", 2, root);
        aggregate::aggregate(&mut tree);

        let parsed = roundtrip(&tree);
        let root = parsed.root.unwrap();
        let names: Vec<_> = parsed
            .children(root)
            .iter()
            .map(|&c| parsed.node(c).name.clone())
            .collect();
        assert_eq!(names, vec!["line\nbreak", "back\\slash"]);
        assert_eq!(parsed.base_path, Path::new("C:\\Users"));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let input = "{\"format\":\"dirscope-report\",\"version\":99}\n";
        match read_tree(Cursor::new(input)) {
            Err(ReportError::VersionMismatch { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, FORMAT_VERSION);
            }
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn truncated_report_is_detected() {
        let tree = sample_tree();
        let mut buf = Vec::new();
        write_tree(&tree, &mut buf).unwrap();
        // Drop the last record: a subtree stays open.
        let cut = buf.iter().rposition(|&b| b == b'\n').unwrap();
        let shortened = &buf[..buf[..cut].iter().rposition(|&b| b == b'\n').unwrap() + 1];

        match read_tree(Cursor::new(shortened)) {
            Err(ReportError::Truncated(open)) => assert!(open > 0),
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn malformed_record_reports_line() {
        let input = "{\"format\":\"dirscope-report\",\"version\":1}\nnot json\n";
        match read_tree(Cursor::new(input)) {
            Err(ReportError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn missing_header_is_malformed() {
        match read_tree(Cursor::new("")) {
            Err(ReportError::Malformed { .. }) => {}
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn single_file_root_roundtrips() {
        let mut tree = FileTree::with_capacity(1);
        tree.set_root(
            FileNode::new_file(CompactString::new("lone.bin"), 42, None),
            Path::new("/data"),
        );
        aggregate::aggregate(&mut tree);

        let parsed = roundtrip(&tree);
        let root = parsed.root.unwrap();
        assert!(!parsed.node(root).is_dir());
        assert_eq!(parsed.node(root).size, 42);
        assert_eq!(parsed.node(root).item_count, 1);
    }
}
