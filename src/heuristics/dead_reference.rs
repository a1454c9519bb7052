use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::FileContext;
use crate::error::HeuristicError;
use crate::tokens::{identifiers, is_stopword};
use crate::types::CommentCandidate;

use super::{Heuristic, Signal};

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z][a-zA-Z0-9+.-]*://\S+").expect("valid url regex"));

static PATH_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\.{0,2}/)?[A-Za-z0-9_.-]+(?:/[A-Za-z0-9_.-]+)+\.[A-Za-z0-9]{1,8}\b")
        .expect("valid path regex")
});

static QUALIFIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*(?:(?:::|\.)[A-Za-z_][A-Za-z0-9_]*)+(?:\(\))?")
        .expect("valid qualified-name regex")
});

static BACKTICKED: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

static CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\(\)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Reference {
    Path(String),
    Symbol(String),
}

/// Flags comments that point at files or symbols which can no longer be resolved.
///
/// Paths are resolved on disk, relative to the workspace root and to the file's own directory.
///
/// Symbols are resolved only against identifiers used in the same file's code, not across the
/// workspace. A comment naming `helper::parse` counts it as dead unless `parse` also appears in
/// this file.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadReference;

impl DeadReference {
    fn references(body: &str) -> BTreeSet<Reference> {
        let without_urls = URL.replace_all(body, " ");
        let mut refs = BTreeSet::new();

        for m in PATH_LIKE.find_iter(&without_urls) {
            refs.insert(Reference::Path(m.as_str().to_string()));
        }
        let without_paths = PATH_LIKE.replace_all(&without_urls, " ");

        for m in QUALIFIED.find_iter(&without_paths) {
            let text = m.as_str();
            // Plain prose like "e.g" or version numbers are not code references
            if !text.contains("::") && !text.ends_with("()") {
                continue;
            }
            if let Some(last) = identifiers(text).last() {
                refs.insert(Reference::Symbol(last.to_string()));
            }
        }
        for cap in BACKTICKED.captures_iter(&without_paths) {
            let inner = &cap[1];
            if let Some(last) = identifiers(inner).last() {
                if last.len() >= 2 && !is_stopword(&last.to_lowercase()) {
                    refs.insert(Reference::Symbol(last.to_string()));
                }
            }
        }
        for cap in CALL.captures_iter(&without_paths) {
            refs.insert(Reference::Symbol(cap[1].to_string()));
        }
        refs
    }

    fn resolves(reference: &Reference, context: &FileContext) -> bool {
        match reference {
            Reference::Symbol(name) => context.file_identifiers.contains(name.as_str()),
            Reference::Path(path) => {
                let relative = Path::new(path.trim_start_matches("./"));
                if relative.is_absolute() {
                    return relative.exists();
                }
                let from_root = context.workspace_root.join(relative);
                let from_file = context
                    .file_path
                    .parent()
                    .map(|dir| dir.join(relative))
                    .map(|p| p.exists())
                    .unwrap_or(false);
                from_root.exists() || from_file
            }
        }
    }
}

impl Heuristic for DeadReference {
    fn name(&self) -> &str {
        "Dead Reference"
    }

    fn evaluate(
        &self,
        candidate: &CommentCandidate,
        context: &FileContext,
    ) -> Result<Signal, HeuristicError> {
        let refs = Self::references(&candidate.body());
        if refs.is_empty() {
            return Ok(Signal::none());
        }

        let dead: Vec<String> = refs
            .iter()
            .filter(|r| !Self::resolves(r, context))
            .map(|r| match r {
                Reference::Path(p) => format!("file `{}`", p),
                Reference::Symbol(s) => format!("`{}`", s),
            })
            .collect();
        if dead.is_empty() {
            return Ok(Signal::none());
        }

        let score = dead.len() as f64 / refs.len() as f64;
        Ok(Signal::new(
            score,
            format!("references {} which cannot be resolved", dead.join(", ")),
        ))
    }
}
