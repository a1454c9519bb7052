use once_cell::sync::Lazy;
use regex::Regex;

use crate::language::CommentTokens;

static OPENING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*\s*").expect("valid fence regex"));

static CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").expect("valid fence regex"));

static CODE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$]").expect("valid regex"));

/// Remove a surrounding markdown code fence, if the output starts with one.
pub fn strip_fences(raw: &str) -> String {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    let without_open = OPENING_FENCE.replace(text, "");
    CLOSING_FENCE.replace(&without_open, "").trim().to_string()
}

/// Keep only the comment-shaped lines of `text`, or all of it when none are found.
///
/// Lines directly following a comment line that do not start like code are kept as block
/// continuations.
pub fn extract_comment(text: &str, language_id: &str) -> String {
    let tokens = CommentTokens::for_language(language_id);
    let mut kept: Vec<&str> = Vec::new();
    let mut in_comment = false;

    for line in text.lines() {
        let trimmed = line.trim();
        in_comment = tokens.is_comment_shaped(trimmed)
            || (in_comment && !trimmed.is_empty() && !CODE_START.is_match(trimmed));
        if in_comment {
            kept.push(line);
        }
    }

    if kept.is_empty() {
        text.to_string()
    } else {
        kept.join("\n")
    }
}

/// Turn raw generator output into the text stored on the item.
pub fn postprocess(raw: &str, language_id: &str, comment_only: bool) -> String {
    let text = strip_fences(raw);
    if comment_only {
        extract_comment(&text, language_id)
    } else {
        text
    }
}
