/// Data model for the dirscope file tree.
///
/// Re-exports the arena-allocated tree structure and supporting types.
pub mod node;
pub mod size;
pub mod tree;

pub use node::{FileNode, HardlinkKey, NodeErrorKind, NodeIndex, NodeKind};
pub use tree::{FileTree, RemovedStats};
