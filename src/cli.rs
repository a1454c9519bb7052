use anyhow::{bail, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    cli_types::{DismissArgs, ListArgs, ScanArgs},
    config::{workspace_data_dir, StaleConfig},
    scanner::{ScanProgress, ScanReport},
    service::StaleCommentService,
    types::{ItemId, StaleCommentItem},
};

const ID_DISPLAY_LEN: usize = 12;

pub struct CliApp {
    service: StaleCommentService,
    verbose: bool,
}

impl CliApp {
    /// Build the service for `root`, with git history and the per-user data directory.
    pub fn new(root: &Path, threshold: Option<f64>, verbose: bool, colors_enabled: bool) -> Result<Self> {
        info!("Initializing stale-comments CLI");
        colored::control::set_override(colors_enabled);

        let mut config = StaleConfig::load(root)
            .with_context(|| format!("Failed to load configuration for {}", root.display()))?;
        if let Some(threshold) = threshold {
            config.score_threshold = threshold;
        }

        let service = StaleCommentService::builder(root)
            .config(config)
            .with_git()
            .with_default_data_dir()
            .build()
            .context("Failed to initialize the stale comment service")?;

        Ok(Self::with_service(service, verbose))
    }

    pub fn with_service(service: StaleCommentService, verbose: bool) -> Self {
        Self { service, verbose }
    }

    pub fn service(&self) -> &StaleCommentService {
        &self.service
    }

    pub async fn scan(&self, args: ScanArgs) -> Result<()> {
        let start_time = Instant::now();
        if args.no_cache {
            self.service.cache().clear();
        }

        if !args.json {
            self.print_header("Stale Comment Scan");
            if self.verbose {
                let config = self.service.config();
                self.print_info(&format!("Workspace: {}", self.service.root().display()));
                self.print_info(&format!("Include patterns: {:?}", config.include_globs));
                self.print_info(&format!("Exclude patterns: {:?}", config.exclude_globs));
                self.print_info(&format!("Score threshold: {}", config.score_threshold));
            }
        }

        let progress = if args.json {
            ProgressBar::hidden()
        } else {
            create_scan_progress()?
        };
        let report = self
            .run_scan(|p: ScanProgress| {
                progress.set_length(p.total as u64);
                progress.set_position(p.processed as u64);
            })
            .await?;
        progress.finish_and_clear();

        if args.json {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize scan report")?;
            println!("{}", json);
            return Ok(());
        }

        self.print_scan_summary(&report);
        self.print_items(&report.items);
        self.print_success(&format!("Total scan time: {:?}", start_time.elapsed()));
        Ok(())
    }

    pub async fn list(&self, args: ListArgs) -> Result<()> {
        self.run_scan(|_| {}).await?;
        let items = self.service.get_items();

        if args.json {
            let json = serde_json::to_string_pretty(&items).context("Failed to serialize items")?;
            println!("{}", json);
        } else {
            self.print_items(&items);
        }
        Ok(())
    }

    pub async fn dismiss(&self, args: DismissArgs) -> Result<()> {
        self.run_scan(|_| {}).await?;
        let items = self.service.get_items();
        let id = resolve_id(&items, &args.id)?;

        self.service
            .dismiss(&id)
            .with_context(|| format!("Failed to dismiss {}", id))?;
        self.print_success(&format!("Dismissed {}", short_id(&id)));
        Ok(())
    }

    pub fn show_config(&self) -> Result<()> {
        self.print_header("Configuration");

        let config = toml::to_string_pretty(self.service.config()).context("Failed to serialize configuration")?;
        println!("{}", config);

        self.print_info("Data Directory:");
        match workspace_data_dir(self.service.root()) {
            Some(dir) => {
                self.print_info(&format!("  Path: {}", dir.display()));
                let snapshot = dir.join("cache.json");
                if let Ok(metadata) = std::fs::metadata(&snapshot) {
                    self.print_info(&format!("  Cache snapshot: {} KB", metadata.len() / 1024));
                } else {
                    self.print_info("  Cache snapshot: none");
                }
            }
            None => self.print_warning("  No per-user data directory is available"),
        }

        let stats = self.service.stats();
        self.print_info(&format!("Dismissed comments: {}", stats.items.dismissed));
        self.print_info(&format!("Cache entries: {}/{}", stats.cache.entries, stats.cache.capacity));
        Ok(())
    }

    async fn run_scan<F>(&self, on_progress: F) -> Result<ScanReport>
    where
        F: FnMut(ScanProgress) + Send,
    {
        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let report = self.service.scan_workspace(on_progress, &cancel).await;
        ctrl_c.abort();
        let report = report.context("Scan failed")?;

        match self.service.save_cache() {
            Ok(Some(entries)) => debug!(entries, "saved cache snapshot"),
            Ok(None) => {}
            Err(e) => self.print_warning(&format!("Failed to save cache snapshot: {}", e)),
        }
        Ok(report)
    }

    fn print_scan_summary(&self, report: &ScanReport) {
        if report.cancelled {
            self.print_warning("Scan cancelled, results are partial");
        }
        self.print_success(&format!(
            "Scanned {} of {} files ({} cached)",
            report.processed_files, report.total_files, report.cache_hits
        ));
        if report.failed_files > 0 || report.skipped_files > 0 {
            self.print_warning(&format!(
                "{} files failed, {} skipped",
                report.failed_files, report.skipped_files
            ));
        }
    }

    fn print_items(&self, items: &[StaleCommentItem]) {
        if items.is_empty() {
            self.print_success("No stale comments found");
            return;
        }
        self.print_info(&format!("{} stale comments:", items.len()));
        for item in items {
            println!("{}", format_item(item, self.service.root(), self.verbose));
        }
    }

    // Utility methods for consistent output formatting
    fn print_header(&self, title: &str) {
        println!("\n{}", title.bold().underline());
    }

    fn print_success(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    fn print_info(&self, message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    fn print_warning(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }
}

fn create_scan_progress() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({elapsed})")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    Ok(bar)
}

fn short_id(id: &ItemId) -> &str {
    let s = id.as_str();
    &s[..s.len().min(ID_DISPLAY_LEN)]
}

/// Find the item whose id equals `query`, or the only one it is a prefix of.
pub fn resolve_id(items: &[StaleCommentItem], query: &str) -> Result<ItemId> {
    if let Some(item) = items.iter().find(|item| item.id.as_str() == query) {
        return Ok(item.id.clone());
    }

    let matches: Vec<&StaleCommentItem> = items
        .iter()
        .filter(|item| item.id.as_str().starts_with(query))
        .collect();
    match matches.as_slice() {
        [] => bail!("No stale comment matches id '{}'", query),
        [item] => Ok(item.id.clone()),
        _ => bail!("Id prefix '{}' matches {} comments, use a longer prefix", query, matches.len()),
    }
}

fn display_path(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// One item as printed by `scan` and `list`.
pub fn format_item(item: &StaleCommentItem, root: &Path, verbose: bool) -> String {
    let score = format!("{:>5.1}", item.score);
    let score = if item.score >= 75.0 {
        score.red().bold()
    } else if item.score >= 55.0 {
        score.yellow()
    } else {
        score.normal()
    };

    let first_line = item.original_comment_text.lines().next().unwrap_or("").trim();
    let mut out = format!(
        "{}  {}:{}  {}  {}",
        score,
        display_path(&item.file_path, root).display(),
        item.range.start.line + 1,
        short_id(&item.id).dimmed(),
        first_line
    );

    if verbose {
        for reason in &item.reasons {
            out.push_str(&format!("\n         {} (+{:.1})", reason, reason.contribution));
        }
    } else if !item.reasons.is_empty() {
        out.push_str(&format!("\n         {}", item.reason_names().join(", ").dimmed()));
    }
    out
}
