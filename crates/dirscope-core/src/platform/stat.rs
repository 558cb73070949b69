/// Per-file platform attributes.
///
/// Best-effort by contract: a failed metadata read never aborts traversal,
/// the caller records a partial node instead.
use crate::model::HardlinkKey;
use std::fs::Metadata;
use std::time::SystemTime;

/// Hardlink identity plus the link count reported by the filesystem.
#[derive(Debug, Clone, Copy)]
pub struct LinkInfo {
    pub key: HardlinkKey,
    pub nlink: u64,
}

/// Attributes the platform can report for one entry.
#[derive(Debug, Clone, Copy)]
pub struct PlatformAttrs {
    pub mtime: Option<SystemTime>,
    /// Space allocated on disk. Equals the logical size on platforms
    /// without block-count reporting.
    pub allocated: u64,
    /// Present only for regular files with a shared inode.
    pub link: Option<LinkInfo>,
}

/// Read platform attributes from already-fetched metadata.
#[cfg(unix)]
pub fn stat_platform(meta: &Metadata) -> PlatformAttrs {
    use std::os::unix::fs::MetadataExt;

    let link = if meta.is_file() && meta.nlink() > 1 {
        Some(LinkInfo {
            key: HardlinkKey {
                device: meta.dev(),
                inode: meta.ino(),
            },
            nlink: meta.nlink(),
        })
    } else {
        None
    };

    PlatformAttrs {
        mtime: meta.modified().ok(),
        // st_blocks is always in 512-byte units regardless of the
        // filesystem block size.
        allocated: meta.blocks() * 512,
        link,
    }
}

#[cfg(not(unix))]
pub fn stat_platform(meta: &Metadata) -> PlatformAttrs {
    PlatformAttrs {
        mtime: meta.modified().ok(),
        allocated: meta.len(),
        link: None,
    }
}

/// Device id of the filesystem holding this entry, where the platform
/// exposes one. Used for the mount-crossing check.
#[cfg(unix)]
pub fn device_id(meta: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.dev())
}

#[cfg(not(unix))]
pub fn device_id(_meta: &Metadata) -> Option<u64> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    #[test]
    fn regular_file_has_no_link_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain");
        fs::File::create(&path)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        let meta = fs::symlink_metadata(&path).unwrap();
        let attrs = stat_platform(&meta);
        assert!(attrs.link.is_none());
        assert!(attrs.mtime.is_some());
    }

    #[test]
    fn hardlinked_file_reports_shared_inode() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"shared").unwrap();
        fs::hard_link(&a, &b).unwrap();

        let meta_a = fs::symlink_metadata(&a).unwrap();
        let meta_b = fs::symlink_metadata(&b).unwrap();
        let link_a = stat_platform(&meta_a).link.expect("nlink > 1");
        let link_b = stat_platform(&meta_b).link.expect("nlink > 1");
        assert_eq!(link_a.key, link_b.key);
        assert_eq!(link_a.nlink, 2);
    }

    #[test]
    fn device_id_matches_for_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x"), b"x").unwrap();
        let d1 = device_id(&fs::metadata(dir.path()).unwrap());
        let d2 = device_id(&fs::metadata(dir.path().join("x")).unwrap());
        assert_eq!(d1, d2);
        assert!(d1.is_some());
    }
}
