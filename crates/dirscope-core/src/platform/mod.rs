/// Platform abstraction — path separator, mount/drive enumeration, and
/// per-file platform attributes.
pub mod mounts;
pub mod path;
pub mod stat;

pub use mounts::{list_mounts, Device};
pub use path::shorten_path;
pub use stat::{device_id, stat_platform, LinkInfo, PlatformAttrs};

/// The platform path separator character.
#[inline]
pub fn separator() -> char {
    std::path::MAIN_SEPARATOR
}
