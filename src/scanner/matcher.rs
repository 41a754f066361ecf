//! Ignore-pattern matching for scanned directories.
//!
//! Patterns come from a `.docignore` file at the root of a registered
//! directory, one gitignore-style glob per line. The file is read fresh on
//! every scan.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::ScanError;
use crate::Result;

/// Name of the per-directory ignore file.
pub const IGNORE_FILE_NAME: &str = ".docignore";

/// Compiled ignore predicate over paths relative to a scan root.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    gitignore: Option<Gitignore>,
    pattern_count: usize,
    rejected: Vec<String>,
}

impl IgnoreMatcher {
    /// A matcher that ignores nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            gitignore: None,
            pattern_count: 0,
            rejected: Vec::new(),
        }
    }

    /// Compile patterns from the raw contents of an ignore file.
    ///
    /// Blank lines and `#` comments are skipped. A malformed pattern is
    /// logged and skipped; it never fails the whole file.
    #[must_use]
    pub fn from_contents(root: impl AsRef<Path>, contents: &str) -> Self {
        let mut builder = GitignoreBuilder::new(root.as_ref());
        let mut pattern_count = 0;
        let mut rejected = Vec::new();

        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match builder.add_line(None, line) {
                Ok(_) => pattern_count += 1,
                Err(e) => {
                    tracing::warn!(pattern = %line, error = %e, "Skipping invalid ignore pattern");
                    rejected.push(line.to_string());
                }
            }
        }

        if pattern_count == 0 {
            return Self {
                rejected,
                ..Self::empty()
            };
        }

        match builder.build() {
            Ok(gitignore) => Self {
                gitignore: Some(gitignore),
                pattern_count,
                rejected,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to compile ignore patterns, ignoring none");
                Self {
                    rejected,
                    ..Self::empty()
                }
            }
        }
    }

    /// Load `<root>/.docignore`, or an empty matcher if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let path = ignore_file_path(root);

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let matcher = Self::from_contents(root, &contents);
                tracing::debug!(
                    path = %path.display(),
                    patterns = matcher.pattern_count,
                    rejected = matcher.rejected.len(),
                    "Loaded ignore patterns"
                );
                Ok(matcher)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::empty()),
            Err(e) => Err(ScanError::IgnoreFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    /// Whether `relative` (or any of its parent directories) is ignored.
    #[must_use]
    pub fn matches(&self, relative: &Path, is_dir: bool) -> bool {
        let Some(gitignore) = &self.gitignore else {
            return false;
        };
        if relative.as_os_str().is_empty() || relative.has_root() {
            return false;
        }
        gitignore
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }

    /// Number of patterns that compiled.
    #[must_use]
    pub const fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    /// Lines that were skipped as malformed.
    #[must_use]
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

/// Location of the ignore file for a scan root.
#[must_use]
pub fn ignore_file_path(root: &Path) -> PathBuf {
    root.join(IGNORE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn matcher(contents: &str) -> IgnoreMatcher {
        IgnoreMatcher::from_contents("/root", contents)
    }

    #[test]
    fn test_empty_matches_nothing() {
        let m = IgnoreMatcher::empty();
        assert!(!m.matches(Path::new("a.tmp"), false));
        assert!(!m.matches(Path::new("node_modules"), true));
    }

    #[test]
    fn test_extension_glob() {
        let m = matcher("*.tmp\n");
        assert!(m.matches(Path::new("b.tmp"), false));
        assert!(m.matches(Path::new("deep/nested/c.tmp"), false));
        assert!(!m.matches(Path::new("a.txt"), false));
    }

    #[test]
    fn test_directory_names() {
        let m = matcher("node_modules\nbuild_*\n");
        assert!(m.matches(Path::new("node_modules"), true));
        assert!(m.matches(Path::new("web/node_modules"), true));
        assert!(m.matches(Path::new("node_modules/pkg/index.js"), false));
        assert!(m.matches(Path::new("build_output"), true));
        assert!(!m.matches(Path::new("src/main.rs"), false));
    }

    #[test]
    fn test_star_stays_within_segment() {
        let m = matcher("docs/*.md\n");
        assert!(m.matches(Path::new("docs/readme.md"), false));
        assert!(!m.matches(Path::new("docs/guide/intro.md"), false));
    }

    #[test]
    fn test_double_star() {
        let m = matcher("logs/**/*.log\n");
        assert!(m.matches(Path::new("logs/a/b/app.log"), false));
        assert!(!m.matches(Path::new("other/app.log"), false));
    }

    #[test]
    fn test_directory_only_pattern() {
        let m = matcher("cache/\n");
        assert!(m.matches(Path::new("cache"), true));
        assert!(!m.matches(Path::new("cache"), false));
    }

    #[test]
    fn test_comments_blanks_and_whitespace() {
        let m = matcher("# temp files\n\n   *.bak   \n");
        assert_eq!(m.pattern_count(), 1);
        assert!(m.matches(Path::new("old.bak"), false));
        assert!(!m.matches(Path::new("# temp files"), false));
    }

    #[test]
    fn test_malformed_pattern_skipped() {
        let m = matcher("[unclosed\n*.tmp\n");
        assert_eq!(m.rejected(), ["[unclosed".to_string()]);
        assert_eq!(m.pattern_count(), 1);
        assert!(m.matches(Path::new("x.tmp"), false));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let m = IgnoreMatcher::load(tmp.path()).unwrap();
        assert_eq!(m.pattern_count(), 0);
        assert!(!m.matches(Path::new("anything"), false));
    }

    #[test]
    fn test_load_from_disk() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(IGNORE_FILE_NAME), "*.log\n").unwrap();

        let m = IgnoreMatcher::load(tmp.path()).unwrap();
        assert!(m.matches(Path::new("server.log"), false));
        assert!(!m.matches(Path::new("server.txt"), false));
    }

    #[test]
    fn test_load_unreadable_is_error() {
        let tmp = TempDir::new().unwrap();
        // A directory in place of the ignore file cannot be read as text.
        fs::create_dir(tmp.path().join(IGNORE_FILE_NAME)).unwrap();

        let err = IgnoreMatcher::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("ignore file"));
    }
}
