#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use stale_comments::error::GeneratorError;
use stale_comments::{
    Generator, StaleCommentService, StaleConfig, StyleOptions, VcsInfo, VersionControl,
};

pub const SCENARIO: &str = "// returns sum\nfunction average(values) {\n  const total = values.reduce((a, b) => a + b, 0);\n  return total / values.length;\n}\n";

/// Every file was last touched twenty years ago.
pub struct AncientHistory;

#[async_trait]
impl VersionControl for AncientHistory {
    async fn last_change(&self, _path: &Path) -> Option<VcsInfo> {
        Some(VcsInfo {
            last_modified: Utc::now() - Duration::days(365 * 20),
            revision: "0f1e2d3c".to_string(),
        })
    }

    async fn content_before(&self, _path: &Path, _revision: &str) -> Option<String> {
        None
    }
}

/// Answers with a fixed comment, failing the call numbers listed in `fail_calls`.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub reply: String,
    pub fail_calls: Vec<usize>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.fail_calls = calls.to_vec();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        _language_id: &str,
        _prompt: &str,
        _style: &StyleOptions,
    ) -> Result<String, GeneratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::task::yield_now().await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_calls.contains(&call) {
            return Err(GeneratorError::TransientServer);
        }
        Ok(self.reply.clone())
    }
}

pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Configuration that surfaces the scenario comment even without history.
pub fn low_threshold() -> StaleConfig {
    StaleConfig {
        score_threshold: 10.0,
        ..StaleConfig::default()
    }
}

pub fn service(root: &TempDir, config: StaleConfig) -> StaleCommentService {
    StaleCommentService::builder(root.path())
        .config(config)
        .build()
        .unwrap()
}

pub fn service_with_generator(
    root: &TempDir,
    config: StaleConfig,
    generator: Arc<dyn Generator>,
) -> StaleCommentService {
    StaleCommentService::builder(root.path())
        .config(config)
        .generator(generator)
        .build()
        .unwrap()
}
