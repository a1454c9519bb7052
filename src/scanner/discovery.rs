use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::StaleConfig;
use crate::error::ScanError;

/// Enumerates workspace files that match the include patterns and none of the exclude patterns.
#[derive(Debug, Clone)]
pub struct RepositoryScanner {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    max_files: usize,
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

impl RepositoryScanner {
    pub fn new(
        root: impl Into<PathBuf>,
        include: &[String],
        exclude: &[String],
        max_files: usize,
    ) -> Result<Self, ScanError> {
        Ok(Self {
            root: root.into(),
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
            max_files,
        })
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &StaleConfig) -> Result<Self, ScanError> {
        Self::new(
            root,
            &config.include_globs,
            &config.exclude_globs,
            config.max_scan_files,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a workspace-relative path passes the include and exclude patterns.
    pub fn is_candidate(&self, relative: &Path) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }

    // A directory is pruned when a file directly below it would be excluded by the
    // directory pattern itself
    fn is_excluded_dir(&self, relative: &Path) -> bool {
        !relative.as_os_str().is_empty()
            && (self.exclude.is_match(relative) || self.exclude.is_match(relative.join("_")))
    }

    /// Files to scan, in a stable order, capped at the configured maximum.
    ///
    /// Only an inaccessible root is fatal; unreadable entries below it are skipped.
    pub fn discover(&self) -> Result<Vec<PathBuf>, ScanError> {
        let metadata = std::fs::metadata(&self.root).map_err(|e| ScanError::RootUnavailable {
            root: self.root.clone(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::RootUnavailable {
                root: self.root.clone(),
                reason: "not a directory".to_string(),
            });
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
                !self.is_excluded_dir(relative)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable workspace entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if !self.is_candidate(relative) {
                continue;
            }

            if files.len() >= self.max_files {
                warn!(limit = self.max_files, "file cap reached, remaining files are not scanned");
                break;
            }
            files.push(entry.into_path());
        }

        debug!(root = %self.root.display(), files = files.len(), "discovered files");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "// x\n").unwrap();
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_excluded_paths_are_never_enumerated() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/main.rs");
        touch(dir.path(), "generated/api.rs");
        touch(dir.path(), "src/generated/types.rs");

        let scanner = RepositoryScanner::new(
            dir.path(),
            &["**/*".to_string()],
            &["**/generated/**".to_string()],
            100,
        )
        .unwrap();
        assert_eq!(relative(dir.path(), &scanner.discover().unwrap()), vec!["src/main.rs"]);
    }

    #[test]
    fn test_include_patterns_and_sorted_output() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.rs");
        touch(dir.path(), "a.rs");
        touch(dir.path(), "notes.md");

        let scanner = RepositoryScanner::new(dir.path(), &["**/*.rs".to_string()], &[], 100).unwrap();
        assert_eq!(relative(dir.path(), &scanner.discover().unwrap()), vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn test_file_cap() {
        let dir = TempDir::new().unwrap();
        for name in ["a.rs", "b.rs", "c.rs", "d.rs"] {
            touch(dir.path(), name);
        }
        let scanner = RepositoryScanner::new(dir.path(), &["**/*".to_string()], &[], 2).unwrap();
        assert_eq!(scanner.discover().unwrap().len(), 2);
    }

    #[test]
    fn test_default_config_skips_vcs_and_build_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".git/config");
        touch(dir.path(), "target/debug/out.rs");
        touch(dir.path(), "node_modules/pkg/index.js");
        touch(dir.path(), "lib.rs");

        let scanner = RepositoryScanner::from_config(dir.path(), &StaleConfig::default()).unwrap();
        assert_eq!(relative(dir.path(), &scanner.discover().unwrap()), vec!["lib.rs"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let scanner = RepositoryScanner::from_config(dir.path().join("nope"), &StaleConfig::default()).unwrap();
        assert!(matches!(scanner.discover(), Err(ScanError::RootUnavailable { .. })));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RepositoryScanner::new(".", &["a[".to_string()], &[], 1).unwrap_err();
        assert!(matches!(err, ScanError::Pattern(_)));
    }
}
