use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Zero-based line/column position inside a file. Columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn lines(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self::new(Position::new(start_line, start_col), Position::new(end_line, end_col))
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line + 1,
            self.start.column + 1,
            self.end.line + 1,
            self.end.column + 1
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    Line,
    Block,
}

/// Code surrounding a comment, used for scoring and as regeneration context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeWindow {
    /// First line of the window (zero-based).
    pub start_line: u32,
    pub text: String,
    /// The declaration line(s) directly following the comment, if any.
    pub declaration: Option<String>,
}

impl CodeWindow {
    pub fn empty(start_line: u32) -> Self {
        Self {
            start_line,
            text: String::new(),
            declaration: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A comment span found by the extractor, prior to scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCandidate {
    /// Raw comment text including its comment tokens.
    pub text: String,
    pub range: TextRange,
    pub kind: CommentKind,
    pub window: CodeWindow,
}

impl CommentCandidate {
    /// Comment text with comment tokens and decoration stripped, one line per source line.
    pub fn body(&self) -> String {
        self.text
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches("/**")
                    .trim_start_matches("/*")
                    .trim_end_matches("*/")
                    .trim_start_matches("<!--")
                    .trim_end_matches("-->")
                    .trim_start_matches("///")
                    .trim_start_matches("//!")
                    .trim_start_matches("//")
                    .trim_start_matches('#')
                    .trim_start_matches('*')
                    .trim()
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Deterministic identity of a finding: stable while path, range and text are unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn compute(path: &Path, range: &TextRange, text: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(range.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a finding.
///
/// `Detected -> Regenerating -> Updated | Detected`, `Updated -> Applied | Dismissed`,
/// `Detected -> Dismissed`. `Applied` and `Dismissed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Detected,
    Regenerating,
    Updated,
    Applied,
    Dismissed,
}

impl Status {
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Detected, Regenerating)
                | (Detected, Dismissed)
                | (Regenerating, Updated)
                | (Regenerating, Detected)
                | (Updated, Applied)
                | (Updated, Dismissed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Applied | Status::Dismissed)
    }
}

/// A heuristic that fired for an item, with its weighted contribution to the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub heuristic: String,
    pub message: Option<String>,
    pub contribution: f64,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.heuristic, message),
            None => f.write_str(&self.heuristic),
        }
    }
}

/// A scored, identity-stable finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleCommentItem {
    pub id: ItemId,
    pub file_path: PathBuf,
    pub range: TextRange,
    pub original_comment_text: String,
    pub surrounding_code: String,
    /// Aggregate staleness score in `[0, 100]`.
    pub score: f64,
    /// Ordered by contribution, highest first.
    pub reasons: Vec<Reason>,
    pub language_id: String,
    pub status: Status,
    pub regenerated_text: Option<String>,
    pub last_modified: DateTime<Utc>,
}

impl StaleCommentItem {
    pub fn reason_names(&self) -> Vec<&str> {
        self.reasons.iter().map(|r| r.heuristic.as_str()).collect()
    }

    pub fn has_regenerated_text(&self) -> bool {
        self.regenerated_text.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_range() -> TextRange {
        TextRange::lines(3, 0, 3, 14)
    }

    #[test]
    fn test_item_id_is_deterministic() {
        let path = Path::new("src/lib.rs");
        let a = ItemId::compute(path, &sample_range(), "// returns sum");
        let b = ItemId::compute(path, &sample_range(), "// returns sum");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_item_id_changes_with_any_component() {
        let base = ItemId::compute(Path::new("a.rs"), &sample_range(), "// x");
        assert_ne!(base, ItemId::compute(Path::new("b.rs"), &sample_range(), "// x"));
        assert_ne!(base, ItemId::compute(Path::new("a.rs"), &TextRange::lines(4, 0, 4, 4), "// x"));
        assert_ne!(base, ItemId::compute(Path::new("a.rs"), &sample_range(), "// y"));
    }

    #[test]
    fn test_status_transitions() {
        assert!(Status::Detected.can_transition_to(Status::Regenerating));
        assert!(Status::Regenerating.can_transition_to(Status::Detected));
        assert!(Status::Regenerating.can_transition_to(Status::Updated));
        assert!(Status::Updated.can_transition_to(Status::Applied));
        assert!(Status::Detected.can_transition_to(Status::Dismissed));

        assert!(!Status::Updated.can_transition_to(Status::Detected));
        assert!(!Status::Applied.can_transition_to(Status::Detected));
        assert!(!Status::Dismissed.can_transition_to(Status::Regenerating));
        assert!(!Status::Detected.can_transition_to(Status::Applied));
        assert!(Status::Applied.is_terminal());
        assert!(!Status::Updated.is_terminal());
    }

    #[test]
    fn test_comment_body_strips_tokens() {
        let candidate = CommentCandidate {
            text: "/**\n * Adds two numbers\n * @returns sum\n */".to_string(),
            range: TextRange::lines(0, 0, 3, 3),
            kind: CommentKind::Block,
            window: CodeWindow::empty(4),
        };
        assert_eq!(candidate.body(), "Adds two numbers\n@returns sum");
    }

    #[test]
    fn test_range_display_is_one_based() {
        assert_eq!(sample_range().to_string(), "4:1-4:15");
    }
}
