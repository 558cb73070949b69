/// Arena-backed file tree.
///
/// All nodes live in a single `Vec<FileNode>`. Relationships between nodes
/// use `NodeIndex` (a thin `u32` wrapper) rather than heap pointers, giving
/// cache-friendly traversal and trivial serialisation. The analyzer is the
/// only writer during traversal; the aggregator owns the tree afterwards.
use super::node::{FileNode, NodeIndex};
use crate::platform;
use std::path::{Path, PathBuf};
#[cfg(test)]
use compact_str::CompactString;

/// Totals for a detached subtree, returned by [`FileTree::remove_subtree`]
/// so the caller can re-fold the parent chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovedStats {
    pub bytes: u64,
    pub allocated: u64,
    pub items: u64,
}

/// The complete tree produced by one analysis.
#[derive(Debug, Clone)]
pub struct FileTree {
    /// Arena: every node in a flat, cache-friendly vector.
    pub nodes: Vec<FileNode>,

    /// The analysis root. Index 0 once the root has been created.
    pub root: Option<NodeIndex>,

    /// Directory containing the analysis root. `base_path` joined with the
    /// chain of node names reconstructs any node's full path.
    pub base_path: PathBuf,

    /// Set when traversal was cancelled before visiting everything.
    pub incomplete: bool,
}

impl FileTree {
    /// Create an empty tree with pre-allocated capacity.
    ///
    /// `estimated_nodes` should be a rough upper bound; the arena grows if
    /// needed, but pre-allocation avoids repeated re-allocation while
    /// scanning large trees.
    pub fn with_capacity(estimated_nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(estimated_nodes),
            root: None,
            base_path: PathBuf::new(),
            incomplete: false,
        }
    }

    /// Allocate a new node in the arena and return its index.
    pub fn add_node(&mut self, node: FileNode) -> NodeIndex {
        let idx = NodeIndex::new(self.nodes.len());
        self.nodes.push(node);
        idx
    }

    /// Install `node` as the analysis root. `base` is the directory that
    /// contains it.
    pub fn set_root(&mut self, node: FileNode, base: &Path) -> NodeIndex {
        debug_assert!(self.root.is_none(), "root installed twice");
        let idx = self.add_node(node);
        self.root = Some(idx);
        self.base_path = base.to_path_buf();
        idx
    }

    /// Attach `child` as the last child of `parent`, preserving
    /// directory-read order.
    ///
    /// Idempotent under retry: attaching a child that already hangs off
    /// this parent is a no-op.
    pub fn attach(&mut self, parent: NodeIndex, child: NodeIndex) {
        if self.is_attached(parent, child) {
            return;
        }
        self.nodes[child.idx()].parent = Some(parent);
        match self.nodes[parent.idx()].last_child {
            Some(tail) => self.nodes[tail.idx()].next_sibling = Some(child),
            None => self.nodes[parent.idx()].first_child = Some(child),
        }
        self.nodes[parent.idx()].last_child = Some(child);
    }

    /// Whether `child` already hangs in `parent`'s sibling chain.
    ///
    /// A node is linked iff it has a successor or it is the chain tail;
    /// nodes are constructed with `parent` pre-set, so the parent field
    /// alone does not prove attachment.
    fn is_attached(&self, parent: NodeIndex, child: NodeIndex) -> bool {
        self.nodes[child.idx()].parent == Some(parent)
            && (self.nodes[child.idx()].next_sibling.is_some()
                || self.nodes[parent.idx()].last_child == Some(child))
    }

    /// Direct children of a node, in attach order.
    pub fn children(&self, parent: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut cursor = self.nodes[parent.idx()].first_child;
        while let Some(idx) = cursor {
            out.push(idx);
            cursor = self.nodes[idx.idx()].next_sibling;
        }
        out
    }

    /// Replace a directory's child list. Used by the aggregator's sort;
    /// `ordered` must be a permutation of the current children.
    pub(crate) fn relink_children(&mut self, parent: NodeIndex, ordered: &[NodeIndex]) {
        self.nodes[parent.idx()].first_child = ordered.first().copied();
        self.nodes[parent.idx()].last_child = ordered.last().copied();
        for pair in ordered.windows(2) {
            self.nodes[pair[0].idx()].next_sibling = Some(pair[1]);
        }
        if let Some(&tail) = ordered.last() {
            self.nodes[tail.idx()].next_sibling = None;
        }
    }

    /// Reconstruct the full path of a node by walking parent links and
    /// joining with the platform separator. Contains `base_path` verbatim.
    pub fn full_path(&self, index: NodeIndex) -> PathBuf {
        let mut segments: Vec<&str> = Vec::new();
        let mut cursor = Some(index);
        while let Some(idx) = cursor {
            segments.push(self.nodes[idx.idx()].name.as_str());
            cursor = self.nodes[idx.idx()].parent;
        }
        segments.reverse();

        let mut path = self.base_path.clone();
        for segment in segments {
            path.push(segment);
        }
        path
    }

    /// Full path as a display string using the platform separator.
    pub fn full_path_string(&self, index: NodeIndex) -> String {
        let sep = platform::separator();
        let path = self.full_path(index);
        let s = path.to_string_lossy().into_owned();
        if sep == '/' {
            s
        } else {
            s.replace('/', &sep.to_string())
        }
    }

    /// Detach `index` from its parent and tombstone the whole subtree.
    ///
    /// All-or-nothing: either the node is unlinked and every descendant is
    /// marked removed, or (for the root, which has no parent) nothing
    /// changes and `None` is returned. The returned totals are the
    /// subtree's aggregated contribution, for the caller to re-fold
    /// upward via [`crate::aggregate::refold_removed`].
    pub fn remove_subtree(&mut self, index: NodeIndex) -> Option<RemovedStats> {
        let parent = self.nodes[index.idx()].parent?;

        // Unlink from the sibling chain.
        let mut prev: Option<NodeIndex> = None;
        let mut cursor = self.nodes[parent.idx()].first_child;
        while let Some(cur) = cursor {
            if cur == index {
                break;
            }
            prev = Some(cur);
            cursor = self.nodes[cur.idx()].next_sibling;
        }
        debug_assert_eq!(cursor, Some(index), "child not found under its parent");

        let next = self.nodes[index.idx()].next_sibling;
        match prev {
            Some(p) => self.nodes[p.idx()].next_sibling = next,
            None => self.nodes[parent.idx()].first_child = next,
        }
        if self.nodes[parent.idx()].last_child == Some(index) {
            self.nodes[parent.idx()].last_child = prev;
        }
        self.nodes[index.idx()].next_sibling = None;

        // Tombstone the subtree and total up its contribution.
        let stats = RemovedStats {
            bytes: self.nodes[index.idx()].contribution(),
            allocated: self.nodes[index.idx()].allocated_contribution(),
            items: self.nodes[index.idx()].item_count.max(1),
        };
        let mut stack = vec![index];
        while let Some(idx) = stack.pop() {
            self.nodes[idx.idx()].removed = true;
            let mut child = self.nodes[idx.idx()].first_child;
            while let Some(c) = child {
                stack.push(c);
                child = self.nodes[c.idx()].next_sibling;
            }
        }
        Some(stats)
    }

    /// Get the node at the given index.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &FileNode {
        &self.nodes[index.idx()]
    }

    /// Mutable access to the node at the given index.
    #[inline]
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut FileNode {
        &mut self.nodes[index.idx()]
    }

    /// Total number of nodes in the arena, tombstones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree contains no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
