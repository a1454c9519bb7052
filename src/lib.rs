pub mod types;
pub mod error;
pub mod config;
pub mod language;
pub mod tokens;
pub mod extractor;
pub mod context;
pub mod heuristics;
pub mod cache;
pub mod scanner;
pub mod storage;
pub mod edit;
pub mod regeneration;
pub mod service;
pub mod cli;
pub mod cli_types;

// Re-export commonly used types
pub use types::*;
pub use error::{Result, StaleError};
pub use config::{HeuristicWeights, StaleConfig, StyleOptions};
pub use context::{GitCli, NoVersionControl, VcsInfo, VersionControl};
pub use extractor::CommentExtractor;
pub use heuristics::{Heuristic, HeuristicEngine};
pub use cache::IncrementalCache;
pub use scanner::{RepositoryScanner, ScanProgress, ScanReport};
pub use storage::{DismissedSet, ItemStore, JsonFileStore, KeyValueStore, MemoryStore};
pub use edit::{EditApplier, FsEditApplier};
pub use regeneration::{Generator, PromptTemplate, RegenerationDriver, RegenerationReport, WaveProgress};
pub use service::{ServiceStats, StaleCommentService, StaleCommentServiceBuilder};
pub use cli::CliApp;
