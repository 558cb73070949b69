/// Aggregator — bottom-up statistics over a completed tree.
///
/// Both analyzers insert every node after its parent, so a single pass
/// over the arena in *reverse* index order visits children before
/// parents. This gives O(n) aggregation with no recursion and no stack.
use crate::model::{FileTree, HardlinkKey, NodeIndex, NodeKind, RemovedStats};
use std::collections::HashMap;
use tracing::warn;

/// Which field drives child ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Aggregated size (a leaf's own contribution).
    #[default]
    Size,
    /// Entry name, bytewise.
    Name,
    /// Latest modification time.
    MTime,
    /// Aggregated item count.
    ItemCount,
}

/// Caller-supplied ordering for [`sort_children`]. The default is
/// aggregated size, largest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub ascending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Size,
            ascending: false,
        }
    }
}

/// Populate every node's aggregated fields.
///
/// Directory aggregates are the fold of their children's contributions
/// (hardlink-deduplicated byte shares), plus one for the directory
/// itself in the item count. Safe to call repeatedly; directory fields
/// are reset before each pass and tombstoned nodes are skipped.
pub fn aggregate(tree: &mut FileTree) {
    // Reset pass: leaves get their own values, directories start empty.
    for node in tree.nodes.iter_mut() {
        match node.kind {
            NodeKind::Directory => {
                node.agg_size = 0;
                node.agg_allocated = 0;
                node.item_count = 0;
                node.latest_mtime = node.mtime;
                node.has_errors = false;
            }
            _ => {
                node.agg_size = node.contribution();
                node.agg_allocated = node.allocated_contribution();
                node.item_count = 1;
                node.latest_mtime = node.mtime;
                node.has_errors = node.is_error();
            }
        }
    }

    // Reverse pass: children before parents.
    for i in (0..tree.nodes.len()).rev() {
        if tree.nodes[i].removed {
            continue;
        }
        if tree.nodes[i].is_dir() {
            // Children already folded in; count the directory itself.
            tree.nodes[i].item_count += 1;
        }

        let (size, alloc, items, latest, errors) = {
            let node = &tree.nodes[i];
            (
                node.contribution(),
                node.allocated_contribution(),
                node.item_count,
                node.latest_mtime,
                node.has_errors,
            )
        };
        if let Some(parent) = tree.nodes[i].parent {
            let parent = &mut tree.nodes[parent.idx()];
            parent.agg_size += size;
            parent.agg_allocated += alloc;
            parent.item_count += items;
            parent.has_errors |= errors;
            if latest > parent.latest_mtime {
                parent.latest_mtime = latest;
            }
        }
    }

    verify_hardlink_groups(tree);
}

/// Consistency pass over the hardlink groups: the contributions of a
/// group must sum to exactly its byte size, with the integer-division
/// remainder on the primary occurrence. A mismatch indicates a corrupted
/// import and is logged, not fatal.
pub fn verify_hardlink_groups(tree: &FileTree) {
    let mut groups: HashMap<HardlinkKey, (u64, u64, bool)> = HashMap::new();
    for node in &tree.nodes {
        if node.removed {
            continue;
        }
        if let NodeKind::File {
            link: Some(key),
            primary,
            ..
        } = node.kind
        {
            let entry = groups.entry(key).or_insert((0, node.size, false));
            entry.0 += node.contribution();
            entry.2 |= primary;
        }
    }

    for (key, (contributed, byte_size, has_primary)) in groups {
        if !has_primary {
            warn!(
                "hardlink group ({}, {}) has no primary occurrence",
                key.device, key.inode
            );
        }
        if contributed != byte_size {
            warn!(
                "hardlink group ({}, {}) contributes {contributed} of {byte_size} bytes",
                key.device, key.inode
            );
        }
        debug_assert_eq!(contributed, byte_size);
    }
}

/// Stably order every directory's child list by `spec`. Entries that
/// compare equal keep their traversal order.
pub fn sort_children(tree: &mut FileTree, spec: SortSpec) {
    for i in 0..tree.nodes.len() {
        if !tree.nodes[i].is_dir() || tree.nodes[i].removed {
            continue;
        }
        let parent = NodeIndex::new(i);
        let mut children = tree.children(parent);
        if children.len() < 2 {
            continue;
        }
        children.sort_by(|&a, &b| {
            let (a, b) = (&tree.nodes[a.idx()], &tree.nodes[b.idx()]);
            let ordering = match spec.key {
                SortKey::Size => a.agg_size.cmp(&b.agg_size),
                SortKey::Name => a.name.cmp(&b.name),
                SortKey::MTime => a.latest_mtime.cmp(&b.latest_mtime),
                SortKey::ItemCount => a.item_count.cmp(&b.item_count),
            };
            if spec.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        tree.relink_children(parent, &children);
    }
}

/// Indices of the `n` largest regular files, sorted descending by size.
///
/// Uses `select_nth_unstable_by` (O(n) average) to bring the top-n
/// elements to the front, then sorts only those, which beats a full sort
/// when the tree is much larger than `n`.
pub fn largest_files(tree: &FileTree, n: usize) -> Vec<NodeIndex> {
    if n == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<NodeIndex> = tree
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| matches!(node.kind, NodeKind::File { .. }) && !node.removed)
        .map(|(i, _)| NodeIndex::new(i))
        .collect();

    let descending = |a: &NodeIndex, b: &NodeIndex| {
        tree.nodes[b.idx()].size.cmp(&tree.nodes[a.idx()].size)
    };
    if candidates.len() > n {
        candidates.select_nth_unstable_by(n - 1, descending);
        candidates.truncate(n);
    }
    candidates.sort_unstable_by(descending);
    candidates
}

/// Partial re-fold after [`FileTree::remove_subtree`]: subtract the
/// removed contribution from every directory on the path from `parent`
/// up to the root.
pub fn refold_removed(tree: &mut FileTree, parent: NodeIndex, removed: RemovedStats) {
    let mut cursor = Some(parent);
    while let Some(idx) = cursor {
        let node = &mut tree.nodes[idx.idx()];
        node.agg_size = node.agg_size.saturating_sub(removed.bytes);
        node.agg_allocated = node.agg_allocated.saturating_sub(removed.allocated);
        node.item_count = node.item_count.saturating_sub(removed.items);
        cursor = node.parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileNode;
    use compact_str::CompactString;
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    fn dir(tree: &mut FileTree, name: &str, parent: NodeIndex) -> NodeIndex {
        let idx = tree.add_node(FileNode::new_dir(CompactString::new(name), Some(parent)));
        tree.attach(parent, idx);
        idx
    }

    fn file(tree: &mut FileTree, name: &str, size: u64, parent: NodeIndex) -> NodeIndex {
        let idx = tree.add_node(FileNode::new_file(
            CompactString::new(name),
            size,
            Some(parent),
        ));
        tree.attach(parent, idx);
        idx
    }

    /// root -> file (5), nested -> subnested -> file2 (2)
    fn nested_tree() -> (FileTree, NodeIndex, NodeIndex) {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("T"), None),
            Path::new("/tmp"),
        );
        file(&mut tree, "file", 5, root);
        let nested = dir(&mut tree, "nested", root);
        let subnested = dir(&mut tree, "subnested", nested);
        file(&mut tree, "file2", 2, subnested);
        (tree, root, nested)
    }

    #[test]
    fn aggregates_size_and_item_count() {
        let (mut tree, root, nested) = nested_tree();
        aggregate(&mut tree);

        assert_eq!(tree.node(root).agg_size, 7);
        assert_eq!(tree.node(root).item_count, 5);
        assert_eq!(tree.node(nested).agg_size, 2);
        assert_eq!(tree.node(nested).item_count, 3);
    }

    #[test]
    fn aggregate_is_idempotent() {
        let (mut tree, root, _) = nested_tree();
        aggregate(&mut tree);
        aggregate(&mut tree);
        assert_eq!(tree.node(root).agg_size, 7);
        assert_eq!(tree.node(root).item_count, 5);
    }

    #[test]
    fn hardlink_group_counted_once() {
        let mut tree = FileTree::with_capacity(4);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("H"), None),
            Path::new("/tmp"),
        );
        let key = HardlinkKey {
            device: 7,
            inode: 42,
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

        aggregate(&mut tree);
        assert_eq!(tree.node(root).agg_size, 100, "not 200");
        assert_eq!(tree.node(root).item_count, 3);
    }

    #[test]
    fn mtime_propagates_to_ancestors() {
        let (mut tree, root, nested) = nested_tree();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let new = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000);
        tree.node_mut(root).mtime = Some(old);
        // file2 sits two levels down.
        let file2 = tree.children(tree.children(nested)[0])[0];
        tree.node_mut(file2).mtime = Some(new);

        aggregate(&mut tree);
        assert_eq!(tree.node(root).latest_mtime, Some(new));
        for &child in &tree.children(root) {
            assert!(tree.node(root).latest_mtime >= tree.node(child).latest_mtime);
        }
    }

    #[test]
    fn error_flag_reaches_root() {
        let (mut tree, root, nested) = nested_tree();
        let bad = tree.add_node(FileNode::new_error(
            CompactString::new("secret"),
            crate::model::NodeErrorKind::Permission,
            Some(nested),
        ));
        tree.attach(nested, bad);

        aggregate(&mut tree);
        assert!(tree.node(root).has_errors);
        // The error node itself contributes no bytes but counts as an item.
        assert_eq!(tree.node(root).agg_size, 7);
        assert_eq!(tree.node(root).item_count, 6);
    }

    #[test]
    fn sort_by_size_descending_is_default() {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("r"), None),
            Path::new("/"),
        );
        let small = file(&mut tree, "small", 10, root);
        let big = file(&mut tree, "big", 1_000, root);
        let mid = file(&mut tree, "mid", 100, root);
        aggregate(&mut tree);

        sort_children(&mut tree, SortSpec::default());
        assert_eq!(tree.children(root), vec![big, mid, small]);
    }

    #[test]
    fn sort_by_name_ascending() {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("r"), None),
            Path::new("/"),
        );
        let c = file(&mut tree, "c", 1, root);
        let a = file(&mut tree, "a", 2, root);
        let b = file(&mut tree, "b", 3, root);
        aggregate(&mut tree);

        sort_children(
            &mut tree,
            SortSpec {
                key: SortKey::Name,
                ascending: true,
            },
        );
        assert_eq!(tree.children(root), vec![a, b, c]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("r"), None),
            Path::new("/"),
        );
        let first = file(&mut tree, "first", 50, root);
        let second = file(&mut tree, "second", 50, root);
        let third = file(&mut tree, "third", 50, root);
        aggregate(&mut tree);

        sort_children(&mut tree, SortSpec::default());
        assert_eq!(tree.children(root), vec![first, second, third]);
    }

    #[test]
    fn largest_files_descending_with_cap() {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.set_root(
            FileNode::new_dir(CompactString::new("r"), None),
            Path::new("/"),
        );
        for (name, size) in [("a", 10), ("b", 900), ("c", 40), ("d", 300)] {
            file(&mut tree, name, size, root);
        }
        aggregate(&mut tree);

        let top = largest_files(&tree, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(tree.node(top[0]).size, 900);
        assert_eq!(tree.node(top[1]).size, 300);
        assert!(largest_files(&tree, 0).is_empty());
    }

    #[test]
    fn refold_after_removal_updates_ancestors() {
        let (mut tree, root, nested) = nested_tree();
        aggregate(&mut tree);

        let stats = tree.remove_subtree(nested).unwrap();
        assert_eq!(
            stats,
            RemovedStats {
                bytes: 2,
                allocated: 2,
                items: 3
            }
        );
        refold_removed(&mut tree, root, stats);

        assert_eq!(tree.node(root).agg_size, 5);
        assert_eq!(tree.node(root).item_count, 2);

        // A fresh full pass over the tombstoned arena agrees.
        aggregate(&mut tree);
        assert_eq!(tree.node(root).agg_size, 5);
        assert_eq!(tree.node(root).item_count, 2);
    }
}
