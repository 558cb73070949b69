/// A single node in the arena-allocated file tree.
///
/// Nodes are stored in a flat `Vec<FileNode>` for cache-friendly traversal.
/// Parent-child relationships use indices rather than pointers, which also
/// makes serialisation trivial and avoids reference-counting overhead.
use compact_str::CompactString;
use std::time::SystemTime;

/// Lightweight index into the arena `Vec<FileNode>`.
///
/// A `u32` keeps nodes small while still addressing ~4 billion entries,
/// far past any filesystem this tool will meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a `NodeIndex` from a `usize`; debug-asserts on overflow.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// The index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a hardlink group: `(device, inode)`.
///
/// Two directory entries with the same key reference one on-disk file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HardlinkKey {
    pub device: u64,
    pub inode: u64,
}

/// Why an entry could not be analysed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeErrorKind {
    /// Access was denied.
    Permission,
    /// The entry disappeared between listing and stat.
    Vanished,
    /// Anything else (I/O error, unsupported entry type, ...).
    Other,
}

impl NodeErrorKind {
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::Permission,
            std::io::ErrorKind::NotFound => Self::Vanished,
            _ => Self::Other,
        }
    }
}

/// What a node is. The variant set is closed; every variant shares the
/// accessor surface on [`FileNode`] (name, parent, size, mtime).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A directory. Aggregated fields are populated by the aggregator
    /// after traversal completes.
    Directory,

    /// A regular file. `multiplicity` is the number of directory entries
    /// sharing this inode observed in the current analysis (1 for
    /// non-shared inodes); `primary` marks the first-seen occurrence of
    /// a hardlink group.
    File {
        link: Option<HardlinkKey>,
        multiplicity: u32,
        primary: bool,
    },

    /// A symbolic link. Never followed; its size is the byte length of
    /// the link target text.
    Symlink,

    /// Placeholder for an entry that could not be read.
    Error(NodeErrorKind),
}

/// A single entry in the tree.
///
/// Stored in a flat arena (`Vec<FileNode>`). Children form an intrusive
/// list via `first_child` / `next_sibling`; `last_child` makes appending
/// O(1) so the list keeps directory-read order.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Entry name only (NOT the full path). Full paths are reconstructed
    /// on demand by walking up via `parent`.
    pub name: CompactString,

    /// Variant-specific data.
    pub kind: NodeKind,

    /// Own byte size. Files: logical length; symlinks: link text length;
    /// directories: the size reported by their own metadata, which is
    /// stored but never included in aggregate sums.
    pub size: u64,

    /// Space allocated on disk. Falls back to `size` on platforms that
    /// do not report block counts.
    pub allocated: u64,

    /// Last-modified timestamp from the entry's own metadata.
    pub mtime: Option<SystemTime>,

    /// Index of the parent node. `None` only for the analysis root.
    pub parent: Option<NodeIndex>,

    /// Head of the child list (directories only).
    pub first_child: Option<NodeIndex>,

    /// Tail of the child list, for O(1) append in read order.
    pub last_child: Option<NodeIndex>,

    /// Next sibling under the same parent.
    pub next_sibling: Option<NodeIndex>,

    /// Aggregated byte size: for directories, the sum of child
    /// contributions (hardlink-deduplicated); for leaves, the node's own
    /// contribution. Populated by the aggregator.
    pub agg_size: u64,

    /// Aggregated allocated-on-disk size, same fold as `agg_size`.
    pub agg_allocated: u64,

    /// Aggregated item count: one for the node itself plus all
    /// descendants. Populated by the aggregator.
    pub item_count: u64,

    /// Latest modification time of the node or any descendant.
    pub latest_mtime: Option<SystemTime>,

    /// `true` if this subtree contains any error node.
    pub has_errors: bool,

    /// Tombstone set by `remove_subtree`. Aggregation skips removed
    /// nodes; they stay in the arena but are unreachable.
    pub removed: bool,
}

impl FileNode {
    fn base(name: CompactString, kind: NodeKind, parent: Option<NodeIndex>) -> Self {
        Self {
            name,
            kind,
            size: 0,
            allocated: 0,
            mtime: None,
            parent,
            first_child: None,
            last_child: None,
            next_sibling: None,
            agg_size: 0,
            agg_allocated: 0,
            item_count: 0,
            latest_mtime: None,
            has_errors: false,
            removed: false,
        }
    }

    /// Create a directory node.
    pub fn new_dir(name: CompactString, parent: Option<NodeIndex>) -> Self {
        Self::base(name, NodeKind::Directory, parent)
    }

    /// Create a regular-file node with the given logical size.
    pub fn new_file(name: CompactString, size: u64, parent: Option<NodeIndex>) -> Self {
        let mut node = Self::base(
            name,
            NodeKind::File {
                link: None,
                multiplicity: 1,
                primary: true,
            },
            parent,
        );
        node.size = size;
        node.allocated = size;
        node
    }

    /// Create a symlink node. `target_len` is the byte length of the link
    /// target text.
    pub fn new_symlink(name: CompactString, target_len: u64, parent: Option<NodeIndex>) -> Self {
        let mut node = Self::base(name, NodeKind::Symlink, parent);
        node.size = target_len;
        node.allocated = target_len;
        node
    }

    /// Create an error placeholder node.
    pub fn new_error(name: CompactString, kind: NodeErrorKind, parent: Option<NodeIndex>) -> Self {
        let mut node = Self::base(name, NodeKind::Error(kind), parent);
        node.has_errors = true;
        node
    }

    /// `true` for directory nodes.
    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    /// `true` for error placeholder nodes.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.kind, NodeKind::Error(_))
    }

    /// Bytes this node contributes to its parent's aggregate.
    ///
    /// A file in a hardlink group of multiplicity `m` contributes
    /// `size / m`, with the integer-division remainder credited to the
    /// primary occurrence so the group sums to exactly its byte size.
    /// Directories contribute their aggregated size; error nodes nothing.
    pub fn contribution(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory => self.agg_size,
            NodeKind::File {
                multiplicity,
                primary,
                ..
            } => shared_portion(self.size, *multiplicity, *primary),
            NodeKind::Symlink => self.size,
            NodeKind::Error(_) => 0,
        }
    }

    /// Allocated-on-disk contribution, same sharing rule as [`contribution`].
    ///
    /// [`contribution`]: FileNode::contribution
    pub fn allocated_contribution(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory => self.agg_allocated,
            NodeKind::File {
                multiplicity,
                primary,
                ..
            } => shared_portion(self.allocated, *multiplicity, *primary),
            NodeKind::Symlink => self.allocated,
            NodeKind::Error(_) => 0,
        }
    }
}

/// Split `total` across `multiplicity` occurrences: every occurrence gets
/// the integer share, the primary additionally gets the remainder.
#[inline]
fn shared_portion(total: u64, multiplicity: u32, primary: bool) -> u64 {
    let m = u64::from(multiplicity.max(1));
    let share = total / m;
    if primary {
        share + total % m
    } else {
        share
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_contribution_unshared() {
        let node = FileNode::new_file(CompactString::new("a"), 100, None);
        assert_eq!(node.contribution(), 100);
    }

    #[test]
    fn hardlink_group_sums_to_byte_size() {
        // 100 bytes over 3 links: 34 + 33 + 33 = 100.
        let mut primary = FileNode::new_file(CompactString::new("a"), 100, None);
        primary.kind = NodeKind::File {
            link: Some(HardlinkKey {
                device: 1,
                inode: 42,
            }),
            multiplicity: 3,
            primary: true,
        };
        let mut secondary = primary.clone();
        secondary.kind = NodeKind::File {
            link: Some(HardlinkKey {
                device: 1,
                inode: 42,
            }),
            multiplicity: 3,
            primary: false,
        };

        let total = primary.contribution() + 2 * secondary.contribution();
        assert_eq!(total, 100);
        assert_eq!(primary.contribution(), 34);
        assert_eq!(secondary.contribution(), 33);
    }

    #[test]
    fn error_node_contributes_nothing() {
        let node = FileNode::new_error(CompactString::new("x"), NodeErrorKind::Permission, None);
        assert_eq!(node.contribution(), 0);
        assert!(node.has_errors);
    }

    #[test]
    fn error_kind_from_io() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert_eq!(NodeErrorKind::from_io(&denied), NodeErrorKind::Permission);
        let gone = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(NodeErrorKind::from_io(&gone), NodeErrorKind::Vanished);
        let other = std::io::Error::new(std::io::ErrorKind::Interrupted, "eintr");
        assert_eq!(NodeErrorKind::from_io(&other), NodeErrorKind::Other);
    }
}
