use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::process::Command;
use tracing::debug;

use crate::extractor::CommentExtractor;
use crate::tokens::{identifier_set, strip_comments};
use crate::types::CommentCandidate;

/// Version-control metadata for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsInfo {
    pub last_modified: DateTime<Utc>,
    pub revision: String,
}

/// Optional version-control lookups. Implementations return `None` on any failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn last_change(&self, path: &Path) -> Option<VcsInfo>;

    /// File contents as they were just before `revision` changed it.
    async fn content_before(&self, path: &Path, revision: &str) -> Option<String>;
}

/// Used when no repository is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVersionControl;

#[async_trait]
impl VersionControl for NoVersionControl {
    async fn last_change(&self, _path: &Path) -> Option<VcsInfo> {
        None
    }

    async fn content_before(&self, _path: &Path, _revision: &str) -> Option<String> {
        None
    }
}

/// Shells out to the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn run(&self, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .await
            .map_err(|e| debug!(error = %e, "git is not available"))
            .ok()?;

        if !output.status.success() {
            debug!(
                args = ?args,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git lookup failed"
            );
            return None;
        }
        String::from_utf8(output.stdout).ok()
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn last_change(&self, path: &Path) -> Option<VcsInfo> {
        let relative = self.relative(path);
        let stdout = self
            .run(&["log", "-1", "--format=%ct %H", "--", &relative])
            .await?;
        parse_log_line(stdout.trim())
    }

    async fn content_before(&self, path: &Path, revision: &str) -> Option<String> {
        let spec = format!("{}^:{}", revision, self.relative(path));
        self.run(&["show", &spec]).await
    }
}

fn parse_log_line(line: &str) -> Option<VcsInfo> {
    let (timestamp, revision) = line.split_once(' ')?;
    let seconds: i64 = timestamp.parse().ok()?;
    let last_modified = Utc.timestamp_opt(seconds, 0).single()?;
    Some(VcsInfo {
        last_modified,
        revision: revision.trim().to_string(),
    })
}

/// Everything a heuristic may consult about one comment.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub file_path: PathBuf,
    pub language_id: String,
    /// Identifiers referenced in the comment's code window.
    pub symbols: HashSet<String>,
    /// Identifiers used anywhere in the file's code (comments excluded).
    pub file_identifiers: Arc<HashSet<String>>,
    pub vcs: Option<VcsInfo>,
    /// Code window that followed the same comment before the last change, if it existed then.
    pub baseline_window: Option<String>,
    pub workspace_root: Arc<PathBuf>,
    pub now: DateTime<Utc>,
}

impl FileContext {
    /// Bare context with no version-control data, mainly for scoring ad-hoc snippets.
    pub fn detached(file_path: impl Into<PathBuf>, language_id: &str, window: &str) -> Self {
        let symbols = identifier_set(window);
        Self {
            file_path: file_path.into(),
            language_id: language_id.to_string(),
            file_identifiers: Arc::new(symbols.clone()),
            symbols,
            vcs: None,
            baseline_window: None,
            workspace_root: Arc::new(PathBuf::from(".")),
            now: Utc::now(),
        }
    }
}

/// Per-file data shared by every candidate in that file.
#[derive(Debug, Clone)]
pub struct FileScope {
    file_path: PathBuf,
    language_id: String,
    file_identifiers: Arc<HashSet<String>>,
    vcs: Option<VcsInfo>,
    baseline_windows: Arc<HashMap<String, String>>,
    workspace_root: Arc<PathBuf>,
    now: DateTime<Utc>,
}

impl FileScope {
    pub fn context_for(&self, candidate: &CommentCandidate) -> FileContext {
        FileContext {
            file_path: self.file_path.clone(),
            language_id: self.language_id.clone(),
            symbols: identifier_set(&candidate.window.text),
            file_identifiers: Arc::clone(&self.file_identifiers),
            vcs: self.vcs.clone(),
            baseline_window: self.baseline_windows.get(&candidate.body()).cloned(),
            workspace_root: Arc::clone(&self.workspace_root),
            now: self.now,
        }
    }

    pub fn vcs(&self) -> Option<&VcsInfo> {
        self.vcs.as_ref()
    }
}

/// Resolves symbols and version-control metadata for a file.
pub struct ContextBuilder {
    vcs: Arc<dyn VersionControl>,
    extractor: CommentExtractor,
    workspace_root: Arc<PathBuf>,
}

impl ContextBuilder {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        extractor: CommentExtractor,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            vcs,
            extractor,
            workspace_root: Arc::new(workspace_root.into()),
        }
    }

    /// Version-control lookups never fail the file: missing data just leaves fields empty.
    pub async fn for_file(
        &self,
        path: &Path,
        language_id: &str,
        text: &str,
        candidates: &[CommentCandidate],
    ) -> FileScope {
        let file_identifiers = identifier_set(&strip_comments(text, candidates));

        let vcs = self.vcs.last_change(path).await;
        let baseline_windows = match &vcs {
            Some(info) => match self.vcs.content_before(path, &info.revision).await {
                Some(previous) => self
                    .extractor
                    .extract(&previous, language_id)
                    .into_iter()
                    .map(|c| (c.body(), c.window.text))
                    .collect(),
                None => HashMap::new(),
            },
            None => HashMap::new(),
        };

        if vcs.is_none() {
            debug!(path = %path.display(), "no version-control info");
        }

        FileScope {
            file_path: path.to_path_buf(),
            language_id: language_id.to_string(),
            file_identifiers: Arc::new(file_identifiers),
            vcs,
            baseline_windows: Arc::new(baseline_windows),
            workspace_root: Arc::clone(&self.workspace_root),
            now: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;

    const SOURCE: &str = "// Doubles the input\nfn double(x: i32) -> i32 {\n    x * 3\n}\n";
    const PREVIOUS: &str = "// Doubles the input\nfn double(x: i32) -> i32 {\n    x * 2\n}\n";

    #[test]
    fn test_parse_log_line() {
        let info = parse_log_line("1700000000 abc123").unwrap();
        assert_eq!(info.revision, "abc123");
        assert_eq!(info.last_modified.timestamp(), 1_700_000_000);
        assert!(parse_log_line("garbage").is_none());
        assert!(parse_log_line("").is_none());
    }

    #[tokio::test]
    async fn test_context_without_vcs() {
        let builder = ContextBuilder::new(Arc::new(NoVersionControl), CommentExtractor::default(), "/repo");
        let candidates = CommentExtractor::default().extract(SOURCE, "rust");
        let scope = builder
            .for_file(Path::new("/repo/src/lib.rs"), "rust", SOURCE, &candidates)
            .await;
        let context = scope.context_for(&candidates[0]);

        assert!(context.vcs.is_none());
        assert!(context.baseline_window.is_none());
        assert!(context.symbols.contains("double"));
        assert!(context.file_identifiers.contains("double"));
        assert!(!context.file_identifiers.contains("Doubles"));
    }

    #[tokio::test]
    async fn test_context_with_vcs_baseline() {
        let mut vcs = MockVersionControl::new();
        vcs.expect_last_change().returning(|_| {
            Some(VcsInfo {
                last_modified: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
                revision: "deadbeef".to_string(),
            })
        });
        vcs.expect_content_before()
            .with(always(), eq("deadbeef"))
            .returning(|_, _| Some(PREVIOUS.to_string()));

        let builder = ContextBuilder::new(Arc::new(vcs), CommentExtractor::default(), "/repo");
        let candidates = CommentExtractor::default().extract(SOURCE, "rust");
        let scope = builder
            .for_file(Path::new("/repo/src/lib.rs"), "rust", SOURCE, &candidates)
            .await;
        let context = scope.context_for(&candidates[0]);

        assert_eq!(context.vcs.as_ref().unwrap().revision, "deadbeef");
        assert!(context.baseline_window.unwrap().contains("x * 2"));
    }

    #[tokio::test]
    async fn test_vcs_failure_is_silent() {
        let mut vcs = MockVersionControl::new();
        vcs.expect_last_change().returning(|_| None);
        vcs.expect_content_before().never();

        let builder = ContextBuilder::new(Arc::new(vcs), CommentExtractor::default(), "/repo");
        let scope = builder
            .for_file(Path::new("/repo/a.rs"), "rust", SOURCE, &[])
            .await;
        assert!(scope.vcs().is_none());
    }
}
