//! Language-agnostic token scanning shared by the context builder and heuristics.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::CommentCandidate;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier regex"));

static BACKTICKED: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

static CALL_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\(\)").expect("valid regex"));

static SNAKE_CASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z][A-Za-z0-9]*(?:_[A-Za-z0-9]+)+\b").expect("valid regex")
});

static CAMEL_CASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[a-z]+[A-Z][A-Za-z0-9]*|[A-Z][a-z0-9]+[A-Z][A-Za-z0-9]*)\b")
        .expect("valid regex")
});

static BRANCHES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:if|elif|for|foreach|while|case|catch|except|when|guard)\b|&&|\|\||\?\?")
        .expect("valid regex")
});

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "this", "that", "with", "from", "into", "are", "was", "were", "will",
    "its", "but", "not", "all", "any", "can", "has", "have", "had", "use", "uses", "used",
    "using", "when", "then", "than", "there", "their", "them", "they", "which", "what", "where",
    "who", "how", "why", "also", "only", "just", "each", "every", "should", "would", "could",
    "may", "might", "must", "one", "two", "get", "gets", "set", "sets", "new", "out", "our",
    "your", "you", "via", "per", "etc", "here", "does", "did", "done", "make", "makes", "let",
    "var", "const", "function", "func", "def", "fn", "pub", "return", "returns", "param",
    "params", "self", "true", "false", "null", "none", "nil", "void", "async", "await", "static",
    "class", "struct", "impl", "mut", "else", "elif", "while", "todo", "fixme", "note", "see",
    "given", "value", "values", "string", "number", "int", "bool", "boolean", "list", "array",
    "type", "object",
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Every identifier-shaped token in `text`.
pub fn identifiers(text: &str) -> impl Iterator<Item = &str> {
    IDENTIFIER.find_iter(text).map(|m| m.as_str())
}

pub fn identifier_set(text: &str) -> HashSet<String> {
    identifiers(text).map(str::to_string).collect()
}

/// Split `parseHTTPRequest` / `parse_http_request` into lowercase subwords.
pub fn split_identifier(ident: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for chunk in ident.split(|c: char| c == '_' || c.is_ascii_digit()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            if c.is_uppercase() && !current.is_empty() {
                let prev_lower = chars[i - 1].is_lowercase();
                let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
                if prev_lower || next_lower {
                    parts.push(std::mem::take(&mut current));
                }
            }
            current.push(c);
        }
        if !current.is_empty() {
            parts.push(current);
        }
    }
    parts.into_iter().map(|p| p.to_lowercase()).collect()
}

/// Crude singularization so that `values` and `value` compare equal.
pub fn normalize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.len() > 3 && lower.ends_with('s') && !lower.ends_with("ss") {
        lower[..lower.len() - 1].to_string()
    } else {
        lower
    }
}

/// Content words of `text`: identifier subwords of three or more letters, minus stopwords.
pub fn words(text: &str) -> HashSet<String> {
    identifiers(text)
        .flat_map(split_identifier)
        .filter(|w| w.len() >= 3 && !is_stopword(w))
        .map(|w| normalize_word(&w))
        .filter(|w| !is_stopword(w))
        .collect()
}

/// Identifiers a comment explicitly names: backticked code, `calls()`, snake_case and camelCase.
pub fn referenced_identifiers(comment: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();

    for cap in BACKTICKED.captures_iter(comment) {
        for ident in identifiers(&cap[1]) {
            if ident.len() >= 2 && !is_stopword(&ident.to_lowercase()) {
                found.insert(ident.to_string());
            }
        }
    }
    for cap in CALL_LIKE.captures_iter(comment) {
        found.insert(cap[1].to_string());
    }
    for m in SNAKE_CASE.find_iter(comment).chain(CAMEL_CASE.find_iter(comment)) {
        found.insert(m.as_str().to_string());
    }
    found
}

/// Approximate cyclomatic complexity: one plus the number of branch points.
pub fn complexity(code: &str) -> u32 {
    1 + BRANCHES.find_iter(code).count() as u32
}

/// `text` with every candidate's comment span blanked out, so only code identifiers remain.
pub fn strip_comments(text: &str, candidates: &[CommentCandidate]) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

    for candidate in candidates {
        let start = candidate.range.start;
        let end = candidate.range.end;
        for line_idx in start.line..=end.line {
            let Some(line) = lines.get_mut(line_idx as usize) else {
                break;
            };
            let chars: Vec<char> = line.chars().collect();
            let keep_before = if line_idx == start.line {
                start.column as usize
            } else {
                0
            };
            let keep_after = if line_idx == end.line {
                (end.column as usize).min(chars.len())
            } else {
                chars.len()
            };
            let mut kept: String = chars[..keep_before.min(chars.len())].iter().collect();
            kept.extend(&chars[keep_after.max(keep_before.min(chars.len()))..]);
            *line = kept;
        }
    }
    lines.join("\n")
}
