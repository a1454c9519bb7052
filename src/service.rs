//! The public facade: one workspace, its collaborators, and the operations a front end needs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, IncrementalCache};
use crate::config::{workspace_data_dir, StaleConfig};
use crate::context::{ContextBuilder, GitCli, NoVersionControl, VersionControl};
use crate::edit::{EditApplier, FsEditApplier};
use crate::error::{EditError, Result, StaleError};
use crate::extractor::CommentExtractor;
use crate::heuristics::HeuristicEngine;
use crate::regeneration::{
    Generator, PromptTemplate, RegenerationDriver, RegenerationReport, WaveProgress,
};
use crate::scanner::{RepositoryScanner, ScanOrchestrator, ScanProgress, ScanReport};
use crate::storage::{DismissedSet, ItemStore, ItemStoreMetadata, JsonFileStore, KeyValueStore, MemoryStore};
use crate::types::{ItemId, StaleCommentItem};

const STATE_FILE: &str = "state.json";
const CACHE_SNAPSHOT_FILE: &str = "cache.json";

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub items: ItemStoreMetadata,
    pub cache: CacheStats,
    pub assessments: u64,
}

/// Wires every collaborator explicitly. Anything not provided gets a local default.
pub struct StaleCommentServiceBuilder {
    root: PathBuf,
    config: Option<StaleConfig>,
    vcs: Option<Arc<dyn VersionControl>>,
    generator: Option<Arc<dyn Generator>>,
    editor: Option<Arc<dyn EditApplier>>,
    kv_store: Option<Arc<dyn KeyValueStore>>,
    engine: Option<HeuristicEngine>,
    data_dir: Option<PathBuf>,
}

impl StaleCommentServiceBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: None,
            vcs: None,
            generator: None,
            editor: None,
            kv_store: None,
            engine: None,
            data_dir: None,
        }
    }

    pub fn config(mut self, config: StaleConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn version_control(mut self, vcs: Arc<dyn VersionControl>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// Use the `git` binary for history lookups.
    pub fn with_git(self) -> Self {
        let git = Arc::new(GitCli::new(self.root.clone()));
        self.version_control(git)
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn edit_applier(mut self, editor: Arc<dyn EditApplier>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    pub fn engine(mut self, engine: HeuristicEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Directory for the dismissed set and cache snapshot.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Use the per-user data directory for this workspace, when one can be determined.
    pub fn with_default_data_dir(mut self) -> Self {
        self.data_dir = workspace_data_dir(&self.root);
        self
    }

    pub fn build(self) -> Result<StaleCommentService> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => StaleConfig::load(&self.root)?,
        };
        let config = Arc::new(config);

        let kv_store: Arc<dyn KeyValueStore> = match (self.kv_store, &self.data_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(JsonFileStore::new(dir.join(STATE_FILE))),
            (None, None) => Arc::new(MemoryStore::new()),
        };
        let dismissed = Arc::new(DismissedSet::load(kv_store)?);
        let editor = self.editor.unwrap_or_else(|| Arc::new(FsEditApplier));
        let store = Arc::new(ItemStore::new(dismissed, editor));

        let engine = Arc::new(self.engine.unwrap_or_else(|| {
            HeuristicEngine::standard(&config.weights, config.age_half_life_days)
        }));
        let cache = Arc::new(IncrementalCache::new(config.cache_capacity));
        let vcs = self.vcs.unwrap_or_else(|| Arc::new(NoVersionControl));

        let extractor = CommentExtractor::new(config.window_lines, config.max_file_bytes);
        let orchestrator = ScanOrchestrator::new(
            Arc::clone(&config),
            RepositoryScanner::from_config(self.root.clone(), &config)?,
            ContextBuilder::new(vcs, extractor, self.root.clone()),
            Arc::clone(&engine),
            Arc::clone(&cache),
            Arc::clone(&store),
        );

        let driver = self.generator.map(|generator| {
            RegenerationDriver::new(Arc::clone(&store), generator)
                .with_template(PromptTemplate::from_config(config.prompt_template.as_deref()))
                .with_style(config.style_options())
                .with_concurrency(config.batch_concurrency)
        });

        let service = StaleCommentService {
            root: self.root,
            config,
            cache,
            engine,
            store,
            orchestrator,
            driver,
            snapshot_path: self.data_dir.map(|dir| dir.join(CACHE_SNAPSHOT_FILE)),
        };
        service.restore_cache();
        info!(root = %service.root.display(), "stale comment service ready");
        Ok(service)
    }
}

/// Stale-comment detection and review for one workspace.
pub struct StaleCommentService {
    root: PathBuf,
    config: Arc<StaleConfig>,
    cache: Arc<IncrementalCache>,
    engine: Arc<HeuristicEngine>,
    store: Arc<ItemStore>,
    orchestrator: ScanOrchestrator,
    driver: Option<RegenerationDriver>,
    snapshot_path: Option<PathBuf>,
}

impl std::fmt::Debug for StaleCommentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaleCommentService")
            .field("root", &self.root)
            .field("items", &self.store.len())
            .field("cache_entries", &self.cache.len())
            .field("regeneration", &self.driver.is_some())
            .finish()
    }
}

impl StaleCommentService {
    pub fn builder(root: impl Into<PathBuf>) -> StaleCommentServiceBuilder {
        StaleCommentServiceBuilder::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StaleConfig {
        &self.config
    }

    pub fn engine(&self) -> &HeuristicEngine {
        &self.engine
    }

    pub fn cache(&self) -> &IncrementalCache {
        &self.cache
    }

    /// Scan the workspace and refresh the item store.
    pub async fn scan_workspace<F>(&self, on_progress: F, cancel: &CancellationToken) -> Result<ScanReport>
    where
        F: FnMut(ScanProgress) + Send,
    {
        Ok(self.orchestrator.scan(on_progress, cancel).await?)
    }

    /// Rescan one file, e.g. after it was saved.
    pub async fn scan_file(&self, path: &Path) -> Result<Vec<StaleCommentItem>> {
        Ok(self.orchestrator.scan_file(path).await?)
    }

    /// Sorted items, dismissed ones excluded.
    pub fn get_items(&self) -> Vec<StaleCommentItem> {
        self.store.get_all()
    }

    pub fn get_item(&self, id: &ItemId) -> Option<StaleCommentItem> {
        self.store.get(id)
    }

    fn driver(&self) -> Result<&RegenerationDriver> {
        self.driver
            .as_ref()
            .ok_or_else(|| StaleError::Config("no generator is configured".to_string()))
    }

    pub async fn regenerate(&self, id: &ItemId) -> Result<StaleCommentItem> {
        Ok(self.driver()?.regenerate(id).await?)
    }

    /// Regenerate every visible item that has no replacement text yet.
    pub async fn regenerate_all<F>(&self, on_progress: F) -> Result<RegenerationReport>
    where
        F: FnMut(WaveProgress) + Send,
    {
        let items = self.store.get_all();
        self.regenerate_items(&items, on_progress).await
    }

    pub async fn regenerate_items<F>(&self, items: &[StaleCommentItem], on_progress: F) -> Result<RegenerationReport>
    where
        F: FnMut(WaveProgress) + Send,
    {
        Ok(self.driver()?.regenerate_all(items, on_progress).await)
    }

    /// Write an item's regenerated text into its file and drop the item.
    ///
    /// The file is rescanned afterwards so the remaining items carry ranges that match the
    /// edited text. The same happens when the edit is refused because the file moved on.
    pub async fn apply(&self, id: &ItemId) -> Result<StaleCommentItem> {
        let result = self.store.apply(id).await;
        let edited = match &result {
            Ok(applied) => Some(applied.file_path.clone()),
            Err(StaleError::Edit(EditError::Conflict { path, .. })) => Some(path.clone()),
            Err(_) => None,
        };
        if let Some(path) = edited {
            self.refresh_file(&path).await;
        }
        result
    }

    async fn refresh_file(&self, path: &Path) {
        let previous = self.store.items_for_file(path);
        self.cache.invalidate(path);
        match self.orchestrator.scan_file(path).await {
            Ok(items) => {
                let restored = self.store.carry_over_moved(&previous);
                debug!(path = %path.display(), items = items.len(), restored, "rescanned edited file");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "dropping items of a file that could not be rescanned");
                let files: HashSet<PathBuf> = [path.to_path_buf()].into_iter().collect();
                self.store.replace_for_files(&files, Vec::new());
            }
        }
    }

    pub fn dismiss(&self, id: &ItemId) -> Result<()> {
        self.store.dismiss(id)
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            items: self.store.metadata(),
            cache: self.cache.stats(),
            assessments: self.engine.assessment_count(),
        }
    }

    /// Persist the cache so the next process can skip unchanged files.
    pub fn save_cache(&self) -> Result<Option<usize>> {
        match &self.snapshot_path {
            Some(path) => Ok(Some(self.cache.save_snapshot(path)?)),
            None => Ok(None),
        }
    }

    fn restore_cache(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        match self.cache.load_snapshot(path) {
            Ok(count) => debug!(entries = count, "restored cache snapshot"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache snapshot");
            }
        }
    }
}
