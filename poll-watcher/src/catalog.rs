//! The set of files under a watched root, plus the snapshot the poll loop
//! diffs against.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::error::{Result, WatcherError};

/// A watched file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    path: PathBuf,
}

impl FileHandle {
    /// Create a handle for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current modification time in Unix epoch seconds.
    ///
    /// Always hits the filesystem; nothing is cached between calls.
    pub fn modified_secs(&self) -> std::io::Result<i64> {
        let modified = std::fs::metadata(&self.path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified).timestamp())
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Files rooted at one path, their filters and the last-seen snapshot.
#[derive(Debug)]
pub struct ResourceCatalog {
    /// Watched file or directory.
    root: PathBuf,

    /// Whether enumeration follows symbolic links.
    follow_symlinks: bool,

    /// Enumerated files; `None` until [`ResourceCatalog::initialize`].
    entries: Option<Vec<FileHandle>>,

    /// Last observed modification time per path.
    snapshot: IndexMap<PathBuf, i64>,

    exclude_patterns: Vec<String>,

    include_patterns: Vec<String>,
}

impl ResourceCatalog {
    /// Open a catalog rooted at `root`.
    ///
    /// Fails with [`WatcherError::InvalidResource`] unless `root` is an
    /// existing file or directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.is_file() && !root.is_dir() {
            return Err(WatcherError::InvalidResource(root.display().to_string()));
        }

        Ok(Self {
            root,
            follow_symlinks: false,
            entries: None,
            snapshot: IndexMap::new(),
            exclude_patterns: Vec::new(),
            include_patterns: Vec::new(),
        })
    }

    /// Open a catalog from a watch config, patterns included.
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        let mut catalog = Self::open(&config.path)?;
        catalog.follow_symlinks = config.follow_symlinks;
        catalog.add_exclude_patterns(&config.exclude_patterns);
        catalog.add_include_patterns(&config.include_patterns);
        Ok(catalog)
    }

    /// Follow symbolic links during enumeration.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Root path of the catalog.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether [`ResourceCatalog::initialize`] has run.
    pub fn is_initialized(&self) -> bool {
        self.entries.is_some()
    }

    /// Enumerate the root and record the initial snapshot.
    ///
    /// Runs once; later calls return immediately and never walk the
    /// filesystem again.
    pub fn initialize(&mut self) -> Result<()> {
        if self.entries.is_some() {
            return Ok(());
        }

        let entries = self.enumerate()?;
        self.stash(&entries);

        info!(
            "Catalog {} initialized: {} entries, {} stashed",
            self.root.display(),
            entries.len(),
            self.snapshot.len()
        );

        self.entries = Some(entries);
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<FileHandle>> {
        if self.root.is_file() {
            return Ok(vec![FileHandle::new(&self.root)]);
        }

        if !self.root.is_dir() {
            return Err(WatcherError::InvalidResource(
                self.root.display().to_string(),
            ));
        }

        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {e}", self.root.display());
                    continue;
                }
            };

            // Only files are watched. Links to files count whether or not
            // links are followed into directories.
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink()
                    && std::fs::metadata(entry.path()).is_ok_and(|m| m.is_file()));
            if is_file {
                entries.push(FileHandle::new(entry.into_path()));
            }
        }

        Ok(entries)
    }

    fn stash(&mut self, entries: &[FileHandle]) {
        for handle in entries {
            if self.is_filtered(handle.path()) {
                continue;
            }

            match handle.modified_secs() {
                Ok(time) => self.update_snapshot(handle.path(), time),
                Err(e) => debug!("Not stashing {handle}: {e}"),
            }
        }
    }

    /// Enumerated files, in walk order. Empty before initialization.
    pub fn entries(&self) -> &[FileHandle] {
        self.entries.as_deref().unwrap_or_default()
    }

    /// Last observed modification time per path.
    pub fn snapshot(&self) -> &IndexMap<PathBuf, i64> {
        &self.snapshot
    }

    /// Recorded modification time for `path`, if any.
    pub fn snapshot_time(&self, path: &Path) -> Option<i64> {
        self.snapshot.get(path).copied()
    }

    /// Record `time` as the last observed modification time of `path`.
    pub fn update_snapshot(&mut self, path: impl Into<PathBuf>, time: i64) {
        self.snapshot.insert(path.into(), time);
    }

    /// Current exclude patterns.
    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Current include patterns.
    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    /// Append exclude patterns, skipping ones already present.
    pub fn add_exclude_patterns<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        extend_unique(&mut self.exclude_patterns, patterns);
        self
    }

    /// Append include patterns, skipping ones already present.
    pub fn add_include_patterns<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        extend_unique(&mut self.include_patterns, patterns);
        self
    }

    /// Whether `path` contains any exclude pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.exclude_patterns
            .iter()
            .any(|pattern| path.contains(pattern.as_str()))
    }

    /// Whether `path` misses every include pattern.
    ///
    /// An empty include list puts every path in scope.
    pub fn is_out_of_scope(&self, path: &Path) -> bool {
        if self.include_patterns.is_empty() {
            return false;
        }

        let path = path.to_string_lossy();
        !self
            .include_patterns
            .iter()
            .any(|pattern| path.contains(pattern.as_str()))
    }

    /// Whether `path` is dropped by either filter.
    pub fn is_filtered(&self, path: &Path) -> bool {
        self.is_excluded(path) || self.is_out_of_scope(path)
    }
}

fn extend_unique<I, S>(target: &mut Vec<String>, patterns: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if !target.iter().any(|existing| existing == pattern) {
            target.push(pattern.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn populated_dir() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        fs::write(temp_dir.path().join("b.rs"), "fn main() {}").unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("nested").join("c.txt"), "c").unwrap();
        temp_dir
    }

    #[test]
    fn test_open_nonexistent_path() {
        let result = ResourceCatalog::open("/nonexistent/path/12345");
        assert!(matches!(result, Err(WatcherError::InvalidResource(_))));
    }

    #[test]
    fn test_entries_empty_before_initialize() {
        let temp_dir = populated_dir();
        let catalog = ResourceCatalog::open(temp_dir.path()).unwrap();

        assert!(!catalog.is_initialized());
        assert!(catalog.entries().is_empty());
        assert!(catalog.snapshot().is_empty());
    }

    #[test]
    fn test_initialize_walks_recursively() {
        let temp_dir = populated_dir();
        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();
        catalog.initialize().unwrap();

        let paths: Vec<PathBuf> = catalog
            .entries()
            .iter()
            .map(|h| h.path().to_path_buf())
            .collect();
        assert_eq!(
            paths,
            vec![
                temp_dir.path().join("a.txt"),
                temp_dir.path().join("b.rs"),
                temp_dir.path().join("nested").join("c.txt"),
            ]
        );
        assert_eq!(catalog.snapshot().len(), 3);
    }

    #[test]
    fn test_initialize_is_cached() {
        let temp_dir = populated_dir();
        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();
        catalog.initialize().unwrap();
        let first = catalog.entries().to_vec();

        fs::write(temp_dir.path().join("late.txt"), "late").unwrap();
        catalog.initialize().unwrap();

        assert_eq!(catalog.entries(), first.as_slice());
        assert_eq!(catalog.snapshot_time(&temp_dir.path().join("late.txt")), None);
    }

    #[test]
    fn test_single_file_root() {
        let temp_dir = populated_dir();
        let file = temp_dir.path().join("a.txt");
        let mut catalog = ResourceCatalog::open(&file).unwrap();
        catalog.initialize().unwrap();

        assert_eq!(catalog.entries(), &[FileHandle::new(&file)]);
        assert!(catalog.snapshot_time(&file).is_some());
    }

    #[test]
    fn test_snapshot_skips_filtered_paths() {
        let temp_dir = populated_dir();
        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();
        catalog.add_exclude_patterns(["nested"]).add_include_patterns([".txt"]);
        catalog.initialize().unwrap();

        // Enumeration is unfiltered; only the snapshot honours the filters
        assert_eq!(catalog.entries().len(), 3);
        let stashed: Vec<&PathBuf> = catalog.snapshot().keys().collect();
        assert_eq!(stashed, vec![&temp_dir.path().join("a.txt")]);
    }

    #[test]
    fn test_add_patterns_deduplicates() {
        let temp_dir = populated_dir();
        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();

        assert!(catalog.exclude_patterns().is_empty());
        assert!(catalog.include_patterns().is_empty());

        catalog.add_exclude_patterns(["a", "a", "b"]);
        catalog.add_exclude_patterns(["b", "c"]);
        catalog.add_include_patterns(vec!["x".to_string(), "x".to_string()]);

        assert_eq!(catalog.exclude_patterns(), &["a", "b", "c"]);
        assert_eq!(catalog.include_patterns(), &["x"]);
    }

    #[test]
    fn test_is_excluded() {
        let temp_dir = populated_dir();
        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();

        assert!(!catalog.is_excluded(Path::new("path/contains/ignoring/path/test.php")));

        catalog.add_exclude_patterns(["test", "test2"]);

        assert!(catalog.is_excluded(Path::new("path/contains/ignoring/path/test.php")));
        assert!(!catalog.is_excluded(Path::new("path/not/contains/ignoring/path/teest.js")));
        assert!(catalog.is_excluded(Path::new("path/contains/ignoring/path/test2.php")));
        assert!(!catalog.is_excluded(Path::new("path/not/contains/ignoring/path/teest2.js")));
    }

    #[test]
    fn test_is_out_of_scope() {
        let temp_dir = populated_dir();
        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();

        assert!(!catalog.is_out_of_scope(Path::new("emptyneedingpatterns")));

        catalog.add_include_patterns(["test", "test2"]);

        assert!(!catalog.is_out_of_scope(Path::new("path/contains/needing/path/test.php")));
        assert!(catalog.is_out_of_scope(Path::new("path/not/contains/needing/path/teest.js")));
        assert!(!catalog.is_out_of_scope(Path::new("path/contains/needing/path/test2.php")));
        assert!(catalog.is_out_of_scope(Path::new("path/not/contains/needing/path/teest2.js")));
    }

    #[test]
    fn test_patterns_are_substrings_not_globs() {
        let temp_dir = populated_dir();
        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();
        catalog.add_exclude_patterns(["*.txt"]);

        assert!(!catalog.is_excluded(Path::new("notes/a.txt")));
        assert!(catalog.is_excluded(Path::new("notes/*.txt")));
    }

    #[test]
    fn test_update_snapshot_overwrites() {
        let temp_dir = populated_dir();
        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();
        catalog.initialize().unwrap();

        let (first_path, first_time) = catalog
            .snapshot()
            .first()
            .map(|(p, t)| (p.clone(), *t))
            .unwrap();

        catalog.update_snapshot(&first_path, 0);

        assert_eq!(catalog.snapshot_time(&first_path), Some(0));
        assert_ne!(first_time, 0);
        // Overwriting keeps the original insertion position
        assert_eq!(catalog.snapshot().first().map(|(p, _)| p), Some(&first_path));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_enumerated() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("real.toml");
        fs::write(&target, "key = 1").unwrap();
        fs::write(temp_dir.path().join("plain.txt"), "plain").unwrap();
        std::os::unix::fs::symlink(&target, temp_dir.path().join("link.toml")).unwrap();

        let mut catalog = ResourceCatalog::open(temp_dir.path()).unwrap();
        catalog.initialize().unwrap();

        let link = temp_dir.path().join("link.toml");
        let plain = temp_dir.path().join("plain.txt");
        let paths: Vec<&Path> = catalog.entries().iter().map(FileHandle::path).collect();
        assert_eq!(paths, vec![link.as_path(), plain.as_path()]);
        assert!(catalog.snapshot_time(&link).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_follow_symlinks_controls_linked_directories() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("inner.txt"), "inner").unwrap();
        fs::write(temp_dir.path().join("top.txt"), "top").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("linked")).unwrap();

        let mut plain = ResourceCatalog::open(temp_dir.path()).unwrap();
        plain.initialize().unwrap();
        assert_eq!(plain.entries(), &[FileHandle::new(temp_dir.path().join("top.txt"))]);

        let config = WatchConfig::new(temp_dir.path()).follow_symlinks();
        let mut following = ResourceCatalog::from_config(&config).unwrap();
        following.initialize().unwrap();
        assert_eq!(
            following.entries(),
            &[
                FileHandle::new(temp_dir.path().join("linked").join("inner.txt")),
                FileHandle::new(temp_dir.path().join("top.txt")),
            ]
        );

        let mut builder = ResourceCatalog::open(temp_dir.path())
            .unwrap()
            .with_follow_symlinks(true);
        builder.initialize().unwrap();
        assert_eq!(builder.entries(), following.entries());
    }

    #[test]
    fn test_from_config() {
        let temp_dir = populated_dir();
        let config = WatchConfig::new(temp_dir.path())
            .exclude("b.rs")
            .exclude("b.rs")
            .include("txt");

        let catalog = ResourceCatalog::from_config(&config).unwrap();

        assert_eq!(catalog.root(), temp_dir.path());
        assert_eq!(catalog.exclude_patterns(), &["b.rs"]);
        assert_eq!(catalog.include_patterns(), &["txt"]);
    }
}
