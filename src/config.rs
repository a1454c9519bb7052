use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StaleError};

pub const CONFIG_FILE_NAME: &str = ".stale-comments.toml";
pub const ENV_PREFIX: &str = "STALE_COMMENTS";

/// Per-heuristic weights. A weight is the maximum number of points a heuristic adds to the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    #[serde(alias = "symbolDrift")]
    pub symbol_drift: f64,
    #[serde(alias = "signatureMismatch")]
    pub signature_mismatch: f64,
    pub divergence: f64,
    pub age: f64,
    #[serde(alias = "deadReference")]
    pub dead_reference: f64,
    #[serde(alias = "complexityDelta")]
    pub complexity_delta: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            symbol_drift: 25.0,
            signature_mismatch: 20.0,
            divergence: 15.0,
            age: 20.0,
            dead_reference: 15.0,
            complexity_delta: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStyle {
    #[default]
    Succinct,
    Detailed,
}

/// Directives forwarded to the generator with every regeneration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleOptions {
    pub use_emojis: bool,
    pub comment_style: CommentStyle,
    pub comment_only: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            use_emojis: false,
            comment_style: CommentStyle::Succinct,
            comment_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaleConfig {
    #[serde(alias = "maxScanFiles")]
    pub max_scan_files: usize,
    #[serde(alias = "includeGlobs")]
    pub include_globs: Vec<String>,
    #[serde(alias = "excludeGlobs")]
    pub exclude_globs: Vec<String>,
    #[serde(alias = "scoreThreshold")]
    pub score_threshold: f64,
    #[serde(alias = "showLowConfidence")]
    pub show_low_confidence: bool,
    /// Files processed concurrently per scan batch.
    #[serde(alias = "batchSize")]
    pub batch_size: usize,
    /// Items regenerated concurrently per wave.
    #[serde(alias = "batchConcurrency")]
    pub batch_concurrency: usize,
    #[serde(alias = "commentOnlyRegeneration")]
    pub comment_only_regeneration: bool,
    #[serde(alias = "useEmojis")]
    pub use_emojis: bool,
    #[serde(alias = "commentStyle")]
    pub comment_style: CommentStyle,
    #[serde(alias = "windowLines")]
    pub window_lines: usize,
    #[serde(alias = "ageHalfLifeDays")]
    pub age_half_life_days: f64,
    #[serde(alias = "maxFileBytes")]
    pub max_file_bytes: u64,
    #[serde(alias = "cacheCapacity")]
    pub cache_capacity: usize,
    pub weights: HeuristicWeights,
    #[serde(alias = "promptTemplate")]
    pub prompt_template: Option<String>,
}

impl Default for StaleConfig {
    fn default() -> Self {
        Self {
            max_scan_files: 5000,
            include_globs: vec!["**/*".to_string()],
            exclude_globs: vec![
                "**/.git/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
            ],
            score_threshold: 55.0,
            show_low_confidence: false,
            batch_size: 25,
            batch_concurrency: 3,
            comment_only_regeneration: true,
            use_emojis: false,
            comment_style: CommentStyle::Succinct,
            window_lines: 30,
            age_half_life_days: 180.0,
            max_file_bytes: 1024 * 1024,
            cache_capacity: 10_000,
            weights: HeuristicWeights::default(),
            prompt_template: None,
        }
    }
}

impl StaleConfig {
    /// Load defaults, then `<root>/.stale-comments.toml`, then `STALE_COMMENTS__*` variables.
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let path = workspace_root.join(CONFIG_FILE_NAME);
        debug!(path = %path.display(), "loading configuration");

        let defaults = toml::to_string(&Self::default())
            .map_err(|e| StaleError::Config(e.to_string()))?;

        let config: StaleConfig = Config::builder()
            .add_source(File::from_str(&defaults, FileFormat::Toml))
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("include_globs")
                    .with_list_parse_key("exclude_globs")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: StaleConfig =
            toml::from_str(contents).map_err(|e| StaleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(StaleError::Config("batch_size must be at least 1".into()));
        }
        if self.batch_concurrency == 0 {
            return Err(StaleError::Config("batch_concurrency must be at least 1".into()));
        }
        if !(0.0..=100.0).contains(&self.score_threshold) {
            return Err(StaleError::Config(format!(
                "score_threshold must be within 0..=100, got {}",
                self.score_threshold
            )));
        }
        if self.age_half_life_days <= 0.0 {
            return Err(StaleError::Config("age_half_life_days must be positive".into()));
        }
        if self.cache_capacity == 0 {
            return Err(StaleError::Config("cache_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn style_options(&self) -> StyleOptions {
        StyleOptions {
            use_emojis: self.use_emojis,
            comment_style: self.comment_style,
            comment_only: self.comment_only_regeneration,
        }
    }

    /// Whether an item with `score` should be surfaced under this configuration.
    pub fn is_visible_score(&self, score: f64) -> bool {
        score >= self.score_threshold
            || (self.show_low_confidence && score >= self.score_threshold - 10.0)
    }
}

/// Per-workspace data directory holding the dismissed set and cache snapshot.
pub fn workspace_data_dir(workspace_root: &Path) -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("dev", "stale-comments", "stale-comments")?;
    let canonical = workspace_root
        .canonicalize()
        .unwrap_or_else(|_| workspace_root.to_path_buf());
    let digest = blake3::hash(canonical.to_string_lossy().as_bytes()).to_hex();
    Some(dirs.data_dir().join(&digest.as_str()[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_recognized_configuration() {
        let config = StaleConfig::default();
        assert_eq!(config.max_scan_files, 5000);
        assert_eq!(config.score_threshold, 55.0);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.batch_concurrency, 3);
        assert!(config.comment_only_regeneration);
        assert!(!config.show_low_confidence);
        assert_eq!(config.weights.symbol_drift, 25.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StaleConfig::load(dir.path()).unwrap();
        assert_eq!(config.max_scan_files, 5000);
        assert_eq!(config.exclude_globs.len(), 3);
    }

    #[test]
    fn test_load_reads_workspace_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "score_threshold = 40.0\nexclude_globs = [\"**/generated/**\"]\n\n[weights]\nage = 5.0\n",
        )
        .unwrap();

        let config = StaleConfig::load(dir.path()).unwrap();
        assert_eq!(config.score_threshold, 40.0);
        assert_eq!(config.exclude_globs, vec!["**/generated/**".to_string()]);
        assert_eq!(config.weights.age, 5.0);
        assert_eq!(config.weights.divergence, 15.0);
    }

    #[test]
    fn test_camel_case_keys_are_accepted() {
        let config = StaleConfig::from_toml_str("scoreThreshold = 70.0\nmaxScanFiles = 10\n").unwrap();
        assert_eq!(config.score_threshold, 70.0);
        assert_eq!(config.max_scan_files, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = StaleConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = StaleConfig::default();
        config.score_threshold = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_low_confidence_window() {
        let mut config = StaleConfig::default();
        assert!(config.is_visible_score(55.0));
        assert!(!config.is_visible_score(50.0));
        config.show_low_confidence = true;
        assert!(config.is_visible_score(50.0));
        assert!(!config.is_visible_score(44.0));
    }
}
