use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{content_digest, CacheEntry, IncrementalCache};
use crate::config::StaleConfig;
use crate::context::ContextBuilder;
use crate::error::ScanError;
use crate::extractor::CommentExtractor;
use crate::heuristics::HeuristicEngine;
use crate::language::detect_language;
use crate::storage::memory::ItemStore;
use crate::types::{ItemId, StaleCommentItem, Status};

use super::discovery::RepositoryScanner;

/// `(processed, total)` after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
}

/// Summary of one workspace scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cancelled: bool,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
    /// Surfaced items, sorted like the item store.
    pub items: Vec<StaleCommentItem>,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug)]
struct FileOutcome {
    items: Vec<StaleCommentItem>,
    cache_hit: bool,
}

/// Scans files in fixed-size batches through the cache, extractor, context builder and engine,
/// then publishes the surfaced items to the item store.
pub struct ScanOrchestrator {
    config: Arc<StaleConfig>,
    scanner: RepositoryScanner,
    extractor: CommentExtractor,
    context: ContextBuilder,
    engine: Arc<HeuristicEngine>,
    cache: Arc<IncrementalCache>,
    store: Arc<ItemStore>,
}

impl ScanOrchestrator {
    pub fn new(
        config: Arc<StaleConfig>,
        scanner: RepositoryScanner,
        context: ContextBuilder,
        engine: Arc<HeuristicEngine>,
        cache: Arc<IncrementalCache>,
        store: Arc<ItemStore>,
    ) -> Self {
        let extractor = CommentExtractor::new(config.window_lines, config.max_file_bytes);
        Self {
            config,
            scanner,
            extractor,
            context,
            engine,
            cache,
            store,
        }
    }

    pub fn scanner(&self) -> &RepositoryScanner {
        &self.scanner
    }

    /// Scan the whole workspace.
    ///
    /// Cancellation is checked before each batch; a batch that has started always finishes.
    /// A cancelled scan only replaces the store entries of files it processed.
    pub async fn scan<F>(&self, mut on_progress: F, cancel: &CancellationToken) -> Result<ScanReport, ScanError>
    where
        F: FnMut(ScanProgress) + Send,
    {
        let started = Instant::now();
        let files = self.scanner.discover()?;
        let total = files.len();
        info!(root = %self.scanner.root().display(), files = total, "starting scan");

        let mut report = ScanReport {
            total_files: total,
            processed_files: 0,
            failed_files: 0,
            skipped_files: 0,
            cache_hits: 0,
            cache_misses: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
            items: Vec::new(),
        };
        let mut processed_paths = HashSet::new();
        let mut found = Vec::new();

        for batch in files.chunks(self.config.batch_size.max(1)) {
            if cancel.is_cancelled() {
                info!(processed = report.processed_files, total, "scan cancelled");
                report.cancelled = true;
                break;
            }

            let results = join_all(batch.iter().map(|path| self.process_file(path))).await;
            for (path, result) in batch.iter().zip(results) {
                report.processed_files += 1;
                processed_paths.insert(path.clone());
                match result {
                    Ok(outcome) => {
                        if outcome.cache_hit {
                            report.cache_hits += 1;
                        } else {
                            report.cache_misses += 1;
                        }
                        found.extend(self.surfaced(outcome.items));
                    }
                    Err(ScanError::Oversized { path, size }) => {
                        info!(path = %path.display(), size, "skipping oversized file");
                        report.skipped_files += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to scan file");
                        report.failed_files += 1;
                    }
                }
            }

            on_progress(ScanProgress {
                processed: report.processed_files,
                total,
            });
        }

        if report.cancelled {
            self.store.replace_for_files(&processed_paths, found);
            let mut items: Vec<_> = self.store.get_all();
            items.retain(|item| processed_paths.contains(&item.file_path));
            report.items = items;
        } else {
            self.store.replace_all(found);
            report.items = self.store.get_all();
        }
        report.elapsed = started.elapsed();

        info!(
            processed = report.processed_files,
            failed = report.failed_files,
            cache_hits = report.cache_hits,
            items = report.items.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "scan finished"
        );
        Ok(report)
    }

    /// Rescan a single file and refresh its items in the store.
    pub async fn scan_file(&self, path: &Path) -> Result<Vec<StaleCommentItem>, ScanError> {
        let files: HashSet<PathBuf> = [path.to_path_buf()].into_iter().collect();
        let items = match self.process_file(path).await {
            Ok(outcome) => self.surfaced(outcome.items),
            Err(ScanError::Oversized { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        self.store.replace_for_files(&files, items);
        Ok(self.store.items_for_file(path))
    }

    /// Items that meet the score threshold and have not been dismissed.
    fn surfaced(&self, items: Vec<StaleCommentItem>) -> Vec<StaleCommentItem> {
        let dismissed = self.store.dismissed();
        items
            .into_iter()
            .filter(|item| self.config.is_visible_score(item.score))
            .filter(|item| !dismissed.contains(&item.id))
            .collect()
    }

    async fn process_file(&self, path: &Path) -> Result<FileOutcome, ScanError> {
        let io_err = |source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        };

        let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
        if metadata.len() > self.extractor.max_file_bytes() {
            self.cache.invalidate(path);
            return Err(ScanError::Oversized {
                path: path.to_path_buf(),
                size: metadata.len(),
            });
        }
        let mtime: DateTime<Utc> = metadata.modified().map_err(io_err)?.into();

        let bytes = tokio::fs::read(path).await.map_err(io_err)?;
        let digest = content_digest(&bytes);

        if let Some(entry) = self.cache.lookup(path, &digest, mtime) {
            debug!(path = %path.display(), "cache hit");
            return Ok(FileOutcome {
                items: entry.items.clone(),
                cache_hit: true,
            });
        }

        let text = String::from_utf8(bytes).map_err(|_| ScanError::NotUtf8 {
            path: path.to_path_buf(),
        })?;
        let language_id = detect_language(path);
        let items = self.score_text(path, language_id, &text, mtime).await;

        self.cache
            .store(path.to_path_buf(), CacheEntry::new(digest, mtime, items.clone()));
        Ok(FileOutcome {
            items,
            cache_hit: false,
        })
    }

    async fn score_text(
        &self,
        path: &Path,
        language_id: &str,
        text: &str,
        mtime: DateTime<Utc>,
    ) -> Vec<StaleCommentItem> {
        let candidates = self.extractor.extract(text, language_id);
        if candidates.is_empty() {
            return Vec::new();
        }
        let scope = self.context.for_file(path, language_id, text, &candidates).await;

        let items: Vec<StaleCommentItem> = candidates
            .iter()
            .map(|candidate| {
                let context = scope.context_for(candidate);
                let assessment = self.engine.assess(candidate, &context);
                StaleCommentItem {
                    id: ItemId::compute(path, &candidate.range, &candidate.text),
                    file_path: path.to_path_buf(),
                    range: candidate.range,
                    original_comment_text: candidate.text.clone(),
                    surrounding_code: candidate.window.text.clone(),
                    score: assessment.score,
                    reasons: assessment.reasons,
                    language_id: language_id.to_string(),
                    status: Status::Detected,
                    regenerated_text: None,
                    last_modified: mtime,
                }
            })
            .collect();

        debug!(path = %path.display(), comments = items.len(), "scored file");
        items
    }
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("root", &self.scanner.root())
            .field("batch_size", &self.config.batch_size)
            .finish()
    }
}
