/// Hardlink registry — the one piece of shared mutable state during
/// traversal.
///
/// Private to a single analysis run; each root gets its own registry.
/// Access windows are short (one lookup plus an optional insert), so a
/// single mutex over the whole map is enough.
use crate::model::{FileTree, HardlinkKey, NodeIndex, NodeKind};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct HardlinkRegistry {
    /// Members of each group in the order traversal encountered them;
    /// the first recorded entry is the group's primary occurrence.
    groups: Mutex<HashMap<HardlinkKey, Vec<NodeIndex>>>,
}

impl HardlinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one directory entry whose inode is shared (`st_nlink > 1`).
    pub fn record(&self, key: HardlinkKey, index: NodeIndex) {
        self.groups.lock().entry(key).or_default().push(index);
    }

    /// Write final multiplicities into the tree once traversal is done.
    ///
    /// Every member of a group of size `m` gets `multiplicity = m`; the
    /// first-seen member becomes primary. Inodes that were only seen once
    /// (links pointing outside the scanned root) stay at multiplicity 1.
    pub fn finalize(&self, tree: &mut FileTree) {
        let groups = self.groups.lock();
        for (key, members) in groups.iter() {
            let multiplicity = members.len() as u32;
            for (pos, &idx) in members.iter().enumerate() {
                let node = tree.node_mut(idx);
                debug_assert!(matches!(node.kind, NodeKind::File { .. }));
                node.kind = NodeKind::File {
                    link: Some(*key),
                    multiplicity,
                    primary: pos == 0,
                };
            }
        }
    }
}
