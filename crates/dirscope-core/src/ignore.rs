/// Ignore predicate — decides which entries traversal skips.
///
/// Four independent filters short-circuit on the first match: hidden
/// names, an absolute-path set, a compiled regex-pattern set, and the
/// mount-crossing check. Configuration is installed before traversal
/// begins and never changes mid-scan; the predicate is then shared
/// read-only across all workers.
use crate::error::AnalyzeError;
use regex::RegexSet;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel for "root device not fixed yet".
const DEVICE_UNSET: u64 = u64::MAX;

#[derive(Debug)]
pub struct IgnorePredicate {
    /// Skip names starting with a dot.
    ignore_hidden: bool,
    /// Absolute paths to skip, platform-normalized.
    paths: HashSet<PathBuf>,
    /// Pattern sources, kept so later loads can recompile the whole set.
    pattern_sources: Vec<String>,
    /// Compiled form of `pattern_sources`.
    patterns: Option<RegexSet>,
    /// Whether traversal may descend onto other devices.
    cross_device_ok: bool,
    /// Device id of the analysis root, fixed once at scan start.
    root_device: AtomicU64,
}

impl Default for IgnorePredicate {
    fn default() -> Self {
        Self::new()
    }
}

impl IgnorePredicate {
    /// The always-false predicate: nothing is ignored, crossing allowed.
    pub fn new() -> Self {
        Self {
            ignore_hidden: false,
            paths: HashSet::new(),
            pattern_sources: Vec::new(),
            patterns: None,
            cross_device_ok: true,
            root_device: AtomicU64::new(DEVICE_UNSET),
        }
    }

    /// Enable or disable the hidden-name filter.
    pub fn set_ignore_hidden(&mut self, ignore: bool) {
        self.ignore_hidden = ignore;
    }

    /// Disallow or allow descending onto a different device.
    pub fn set_cross_device_ok(&mut self, ok: bool) {
        self.cross_device_ok = ok;
    }

    /// Add one absolute path to skip.
    pub fn add_ignore_path(&mut self, path: impl Into<PathBuf>) {
        self.paths.insert(normalize(path.into()));
    }

    /// Add regex patterns matched against full path strings.
    ///
    /// A pattern ignores an entry when it matches a complete trailing
    /// portion of the full path, starting at a component boundary — so
    /// `[abc]+` ignores `/scan/abc` but not `/scan/normal`, and
    /// `target/debug` ignores any path ending in those two components.
    ///
    /// All-or-nothing: one bad pattern fails the call and leaves the
    /// predicate unchanged.
    pub fn add_patterns<I, S>(&mut self, patterns: I) -> Result<(), AnalyzeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut combined = self.pattern_sources.clone();
        combined.extend(patterns.into_iter().map(Into::into));
        let compiled = RegexSet::new(combined.iter().map(|p| anchor(p)))
            .map_err(|err| AnalyzeError::InvalidIgnoreConfig(err.to_string()))?;
        self.pattern_sources = combined;
        self.patterns = Some(compiled);
        Ok(())
    }

    /// Load an ignore file: one entry per line, `#` comments and blank
    /// lines skipped. A line that contains (or starts with) a path
    /// separator is an absolute-path entry; anything else is a regex
    /// pattern. A compile failure in any pattern fails the whole load
    /// and leaves prior state untouched.
    pub fn load_file(&mut self, path: &Path) -> Result<(), AnalyzeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| AnalyzeError::InvalidIgnoreConfig(format!("{}: {err}", path.display())))?;

        let mut new_paths = Vec::new();
        let mut new_patterns = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.contains(crate::platform::separator()) {
                new_paths.push(PathBuf::from(line));
            } else {
                new_patterns.push(line.to_string());
            }
        }

        // Compile before committing anything.
        self.add_patterns(new_patterns)?;
        for p in new_paths {
            self.add_ignore_path(p);
        }
        Ok(())
    }

    /// Fix the analysis root's device id. Called once by the analyzer
    /// before workers start.
    pub fn fix_root_device(&self, device: u64) {
        self.root_device.store(device, Ordering::Relaxed);
    }

    /// Whether an entry on `device` would cross a mount boundary the
    /// configuration forbids.
    pub fn crosses_mount(&self, device: u64) -> bool {
        if self.cross_device_ok {
            return false;
        }
        let root = self.root_device.load(Ordering::Relaxed);
        root != DEVICE_UNSET && device != root
    }

    /// The name/path filters (hidden, path set, pattern set). Pure and
    /// callable from any number of workers concurrently.
    pub fn should_ignore(&self, name: &str, full_path: &Path) -> bool {
        if self.ignore_hidden && name.starts_with('.') {
            return true;
        }
        if !self.paths.is_empty() && self.paths.contains(&normalize(full_path.to_path_buf())) {
            return true;
        }
        if let Some(patterns) = &self.patterns {
            if patterns.is_match(&full_path.to_string_lossy()) {
                return true;
            }
        }
        false
    }

    /// Full composition for directories, including the mount-crossing
    /// check when the entry's device id is known.
    pub fn should_ignore_dir(&self, name: &str, full_path: &Path, device: Option<u64>) -> bool {
        if self.should_ignore(name, full_path) {
            return true;
        }
        matches!(device, Some(dev) if self.crosses_mount(dev))
    }
}

/// Anchor a user pattern so it must cover one or more complete trailing
/// path components.
fn anchor(pattern: &str) -> String {
    let sep = regex::escape(&crate::platform::separator().to_string());
    format!("(?:^|{sep})(?:{pattern})$")
}

/// Platform-form normalization for path-set comparisons. Case folds on
/// systems with case-insensitive path conventions.
#[cfg(windows)]
fn normalize(path: PathBuf) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}

#[cfg(not(windows))]
fn normalize(path: PathBuf) -> PathBuf {
    path
}
