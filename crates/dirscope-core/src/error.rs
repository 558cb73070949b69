//! Error types for `dirscope-core`.
//!
//! Per-node failures (permission denied, vanished entries) never surface
//! here — they become error nodes in the tree. These enums cover the
//! operation-level failures that abort the enclosing call.

use std::path::PathBuf;

/// Errors that abort an analysis before or during traversal.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The starting path does not exist or could not be resolved.
    /// No tree is produced.
    #[error("cannot resolve path {path}: {source}")]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unrecoverable traversal failure (worker pool crash). Any partial
    /// tree is discarded.
    #[error("traversal failed: {0}")]
    Traversal(String),

    /// An ignore pattern failed to compile. Surfaced before traversal
    /// begins; the predicate keeps its prior configuration.
    #[error("invalid ignore configuration: {0}")]
    InvalidIgnoreConfig(String),

    /// Mount/drive enumeration failed at the OS level.
    #[error("mount enumeration failed: {0}")]
    MountEnumeration(#[from] std::io::Error),
}

/// Errors from the report codec during import or export.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// A record could not be parsed.
    #[error("malformed report at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// The stream ended while a subtree was still open.
    #[error("truncated report: {0} directories left open")]
    Truncated(usize),

    /// The header carries a version this build does not understand.
    #[error("unsupported report version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    /// Underlying I/O failure while reading or writing the stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_resolution_displays_path() {
        let err = AnalyzeError::PathResolution {
            path: PathBuf::from("/no/such/dir"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/no/such/dir"));
    }

    #[test]
    fn version_mismatch_displays_versions() {
        let err = ReportError::VersionMismatch {
            found: 9,
            expected: 1,
        };
        assert_eq!(err.to_string(), "unsupported report version 9 (expected 1)");
    }

    #[test]
    fn report_io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: ReportError = io_err.into();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
