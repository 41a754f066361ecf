//! Depth-first directory traversal.
//!
//! [`Walker`] is a lazy, single-use iterator over the files below a root.
//! Ignored entries are pruned before descent, and entries that cannot be read
//! are skipped and counted instead of failing the walk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::{DirEntry, WalkDir};

use super::matcher::{IgnoreMatcher, IGNORE_FILE_NAME};
use crate::error::ScanError;
use crate::Result;

/// A regular file observed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub absolute_path: PathBuf,
    pub relative_path: PathBuf,
    pub size_bytes: u64,
    /// Unix milliseconds.
    pub modified_at: i64,
}

impl FileDescriptor {
    /// Absolute path as stored in the catalog.
    ///
    /// Exact, since the walker never yields paths that are not UTF-8.
    #[must_use]
    pub fn full_path(&self) -> String {
        self.absolute_path.to_string_lossy().into_owned()
    }

    #[must_use]
    pub fn filename(&self) -> String {
        self.absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parent_path(&self) -> String {
        self.absolute_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercase extension with a leading dot, or empty.
    #[must_use]
    pub fn extension(&self) -> String {
        self.absolute_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }
}

/// Counters for one walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    /// Files yielded.
    pub files: u64,
    /// Entries pruned by ignore rules (a pruned directory counts once).
    pub ignored: u64,
    /// Entries skipped as unreadable, vanished, cyclic, not UTF-8 or not
    /// regular files.
    pub skipped: u64,
}

/// Traversal options.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Descend into symlinked directories, guarded by canonical path.
    pub follow_symlinks: bool,
}

/// Lazy depth-first iterator over the files below a root.
///
/// Yields `Err` only for fatal problems at the root itself, after which it
/// is exhausted.
pub struct Walker {
    root: PathBuf,
    matcher: IgnoreMatcher,
    entries: walkdir::IntoIter,
    follow_symlinks: bool,
    visited: HashSet<PathBuf>,
    stats: WalkStats,
    done: bool,
}

impl Walker {
    /// Start a walk of `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is missing or not a directory.
    pub fn new(root: impl AsRef<Path>, matcher: IgnoreMatcher, options: WalkOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&root)
            .map_err(|e| ScanError::invalid_directory(root.display().to_string(), e.to_string()))?;
        if !metadata.is_dir() {
            return Err(
                ScanError::invalid_directory(root.display().to_string(), "not a directory").into(),
            );
        }

        let entries = WalkDir::new(&root)
            .follow_links(options.follow_symlinks)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            root,
            matcher,
            entries,
            follow_symlinks: options.follow_symlinks,
            visited: HashSet::new(),
            stats: WalkStats::default(),
            done: false,
        })
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> WalkStats {
        self.stats
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn skip(&mut self, path: &Path, reason: &dyn std::fmt::Display) {
        tracing::warn!(path = %path.display(), reason = %reason, "Skipping entry");
        self.stats.skipped += 1;
    }

    /// Returns `true` if the directory should be descended into.
    fn enter_dir(&mut self, entry: &DirEntry) -> bool {
        if !self.follow_symlinks {
            return true;
        }
        match entry.path().canonicalize() {
            Ok(canonical) => {
                if self.visited.insert(canonical) {
                    true
                } else {
                    tracing::debug!(path = %entry.path().display(), "Directory already visited");
                    self.stats.skipped += 1;
                    false
                }
            }
            Err(e) => {
                self.skip(entry.path(), &e);
                false
            }
        }
    }

    fn describe(&mut self, entry: &DirEntry, relative: PathBuf) -> Option<FileDescriptor> {
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                self.skip(entry.path(), &e);
                return None;
            }
        };

        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));

        Some(FileDescriptor {
            absolute_path: entry.path().to_path_buf(),
            relative_path: relative,
            size_bytes: metadata.len(),
            modified_at,
        })
    }
}

impl Iterator for Walker {
    type Item = Result<FileDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let entry = match self.entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    if e.depth() == 0 {
                        self.done = true;
                        return Some(Err(ScanError::Walk {
                            path: self.root.display().to_string(),
                            reason: e.to_string(),
                        }
                        .into()));
                    }
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    self.skip(&path, &e);
                    continue;
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            if entry.depth() == 0 {
                if self.follow_symlinks {
                    self.enter_dir(&entry);
                }
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root).map(Path::to_path_buf) else {
                self.skip(entry.path(), &"outside scan root");
                continue;
            };

            let file_type = entry.file_type();
            let is_dir = file_type.is_dir();

            if (entry.depth() == 1 && relative.as_os_str() == IGNORE_FILE_NAME)
                || self.matcher.matches(&relative, is_dir)
            {
                tracing::trace!(path = %relative.display(), "Ignored");
                self.stats.ignored += 1;
                if is_dir {
                    self.entries.skip_current_dir();
                }
                continue;
            }

            if entry.path().to_str().is_none() {
                self.skip(entry.path(), &"path is not valid UTF-8");
                if is_dir {
                    self.entries.skip_current_dir();
                }
                continue;
            }

            if is_dir {
                if !self.enter_dir(&entry) {
                    self.entries.skip_current_dir();
                }
                continue;
            }

            if !file_type.is_file() {
                // Unfollowed symlinks, sockets, fifos, devices.
                tracing::debug!(path = %entry.path().display(), "Not a regular file");
                self.stats.skipped += 1;
                continue;
            }

            if let Some(descriptor) = self.describe(&entry, relative) {
                self.stats.files += 1;
                return Some(Ok(descriptor));
            }
        }
    }
}

/// Walk `root` with its current ignore file.
///
/// # Errors
///
/// Returns an error if the ignore file is unreadable or the root is invalid.
pub fn walk(root: impl AsRef<Path>, options: WalkOptions) -> Result<Walker> {
    let root = root.as_ref();
    let matcher = IgnoreMatcher::load(root)?;
    Walker::new(root, matcher, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn relative_paths(walker: Walker) -> Vec<String> {
        walker
            .map(|d| d.unwrap().relative_path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_walks_depth_first_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b/inner")).unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::write(tmp.path().join("b/inner/c.txt"), "c").unwrap();
        fs::write(tmp.path().join("b/d.txt"), "d").unwrap();
        fs::write(tmp.path().join("e.txt"), "e").unwrap();

        let walker = walk(tmp.path(), WalkOptions::default()).unwrap();
        assert_eq!(
            relative_paths(walker),
            vec!["a.txt", "b/d.txt", "b/inner/c.txt", "e.txt"]
        );
    }

    #[test]
    fn test_descriptor_metadata() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Report.PDF"), "12345").unwrap();

        let mut walker = walk(tmp.path(), WalkOptions::default()).unwrap();
        let d = walker.next().unwrap().unwrap();
        assert_eq!(d.size_bytes, 5);
        assert!(d.modified_at > 0);
        assert_eq!(d.filename(), "Report.PDF");
        assert_eq!(d.extension(), ".pdf");
        assert_eq!(d.absolute_path, tmp.path().join("Report.PDF"));
        assert!(walker.next().is_none());
        assert_eq!(walker.stats().files, 1);
    }

    #[test]
    fn test_ignore_rules_prune_subtrees() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(IGNORE_FILE_NAME), "*.tmp\nnode_modules\n").unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::write(tmp.path().join("b.tmp"), "b").unwrap();
        fs::create_dir_all(tmp.path().join("web/node_modules/pkg")).unwrap();
        fs::write(tmp.path().join("web/node_modules/pkg/index.js"), "x").unwrap();
        fs::write(tmp.path().join("web/app.js"), "x").unwrap();

        let walker = walk(tmp.path(), WalkOptions::default()).unwrap();
        assert_eq!(relative_paths(walker), vec!["a.txt", "web/app.js"]);
    }

    #[test]
    fn test_ignore_file_itself_not_yielded() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(IGNORE_FILE_NAME), "").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        // Only the root ignore file is special.
        fs::write(tmp.path().join("sub").join(IGNORE_FILE_NAME), "").unwrap();

        let mut walker = walk(tmp.path(), WalkOptions::default()).unwrap();
        let names: Vec<_> = walker.by_ref().map(|d| d.unwrap().relative_path).collect();
        assert_eq!(names, vec![PathBuf::from("sub").join(IGNORE_FILE_NAME)]);
        assert_eq!(walker.stats().ignored, 1);
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = Walker::new(
            tmp.path().join("missing"),
            IgnoreMatcher::empty(),
            WalkOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_file_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        assert!(Walker::new(&file, IgnoreMatcher::empty(), WalkOptions::default()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed_by_default() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("real")).unwrap();
        fs::write(tmp.path().join("real/f.txt"), "x").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real"), tmp.path().join("link")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("broken")).unwrap();

        let mut walker = walk(tmp.path(), WalkOptions::default()).unwrap();
        let paths: Vec<_> = walker.by_ref().map(|d| d.unwrap().relative_path).collect();
        assert_eq!(paths, vec![PathBuf::from("real/f.txt")]);
        assert_eq!(walker.stats().skipped, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates_when_following() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/b/f.txt"), "x").unwrap();
        // a/b/up -> a, and top -> a: both reach a/b/f.txt again.
        std::os::unix::fs::symlink(tmp.path().join("a"), tmp.path().join("a/b/up")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("a"), tmp.path().join("top")).unwrap();

        let walker = walk(
            tmp.path(),
            WalkOptions {
                follow_symlinks: true,
            },
        )
        .unwrap();
        assert_eq!(relative_paths(walker), vec!["a/b/f.txt"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.txt"), "x").unwrap();
        fs::write(tmp.path().join(OsStr::from_bytes(b"a\xff.txt")), "x").unwrap();
        fs::write(tmp.path().join(OsStr::from_bytes(b"a\xfe.txt")), "x").unwrap();
        let bad_dir = tmp.path().join(OsStr::from_bytes(b"d\xff"));
        fs::create_dir(&bad_dir).unwrap();
        fs::write(bad_dir.join("inner.txt"), "x").unwrap();

        let mut walker = walk(tmp.path(), WalkOptions::default()).unwrap();
        let paths: Vec<_> = walker.by_ref().map(|d| d.unwrap().relative_path).collect();
        assert_eq!(paths, vec![PathBuf::from("good.txt")]);
        assert_eq!(walker.stats().skipped, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_skipped_when_following() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ok.txt"), "x").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("broken")).unwrap();

        let mut walker = walk(
            tmp.path(),
            WalkOptions {
                follow_symlinks: true,
            },
        )
        .unwrap();
        let paths: Vec<_> = walker.by_ref().map(|d| d.unwrap().relative_path).collect();
        assert_eq!(paths, vec![PathBuf::from("ok.txt")]);
        assert_eq!(walker.stats().skipped, 1);
    }
}
