use tracing::info;

use crate::language::{is_indent_scoped, CommentTokens};
use crate::types::{CodeWindow, CommentCandidate, CommentKind, Position, TextRange};

pub const DEFAULT_WINDOW_LINES: usize = 30;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Locates comment spans and the code window that follows each of them.
#[derive(Debug, Clone)]
pub struct CommentExtractor {
    window_lines: usize,
    max_file_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opening {
    Line(usize),
    Block(usize),
}

impl Default for CommentExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_LINES, DEFAULT_MAX_FILE_BYTES)
    }
}

impl CommentExtractor {
    pub fn new(window_lines: usize, max_file_bytes: u64) -> Self {
        Self {
            window_lines: window_lines.max(1),
            max_file_bytes,
        }
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Extract every comment in `text`, in source order.
    ///
    /// Files larger than the size ceiling yield no candidates.
    pub fn extract(&self, text: &str, language_id: &str) -> Vec<CommentCandidate> {
        if text.len() as u64 > self.max_file_bytes {
            info!(
                bytes = text.len(),
                limit = self.max_file_bytes,
                "skipping oversized file during comment extraction"
            );
            return Vec::new();
        }

        let tokens = CommentTokens::for_language(language_id);
        let lines: Vec<&str> = text.lines().collect();
        let mut candidates = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let chars: Vec<char> = lines[i].chars().collect();

            if i == 0 && lines[i].starts_with("#!") {
                i += 1;
                continue;
            }

            let Some(opening) = find_opening(&chars, &tokens, language_id) else {
                i += 1;
                continue;
            };

            let (col, kind) = match opening {
                Opening::Line(col) => (col, CommentKind::Line),
                Opening::Block(col) => (col, CommentKind::Block),
            };
            let trailing = chars[..col].iter().any(|c| !c.is_whitespace());

            let (text, end) = match opening {
                Opening::Line(_) => self.collect_line_comment(&lines, i, col, trailing, &tokens),
                Opening::Block(_) => collect_block_comment(&lines, i, col, &tokens),
            };
            let end_line = end.line as usize;

            let candidate = CommentCandidate {
                text,
                range: TextRange::new(Position::new(i as u32, col as u32), end),
                kind,
                window: self.capture_window(&lines, i, end_line, trailing, language_id),
            };
            if !candidate.body().is_empty() {
                candidates.push(candidate);
            }

            i = end_line + 1;
        }

        candidates
    }

    fn collect_line_comment(
        &self,
        lines: &[&str],
        start_line: usize,
        col: usize,
        trailing: bool,
        tokens: &CommentTokens,
    ) -> (String, Position) {
        let first: String = lines[start_line].chars().skip(col).collect();
        let mut parts = vec![first.trim_end().to_string()];
        let mut last = start_line;

        // Consecutive full-line comments form one candidate
        if !trailing {
            if let Some(line_token) = tokens.line {
                while last + 1 < lines.len() {
                    let next = lines[last + 1].trim();
                    let opens_block = tokens
                        .block
                        .map(|(open, _)| next.starts_with(open))
                        .unwrap_or(false);
                    if !next.starts_with(line_token) || opens_block {
                        break;
                    }
                    parts.push(next.to_string());
                    last += 1;
                }
            }
        }

        let end_col = lines[last].trim_end().chars().count() as u32;
        (parts.join("\n"), Position::new(last as u32, end_col))
    }

    fn capture_window(
        &self,
        lines: &[&str],
        comment_start: usize,
        comment_end: usize,
        trailing: bool,
        language_id: &str,
    ) -> CodeWindow {
        let mut start = if trailing { comment_start } else { comment_end + 1 };
        if !trailing {
            while start < lines.len() && lines[start].trim().is_empty() {
                start += 1;
            }
        }
        if start >= lines.len() {
            return CodeWindow::empty(start as u32);
        }

        let indent_scoped = is_indent_scoped(language_id);
        let base_indent = indentation(lines[start]);
        let mut depth: i32 = 0;
        let mut opened = false;
        let mut collected: Vec<&str> = Vec::new();

        for (offset, line) in lines[start..].iter().take(self.window_lines).enumerate() {
            if offset > 0 {
                if indent_scoped {
                    if !line.trim().is_empty() && indentation(line) <= base_indent {
                        break;
                    }
                } else if !opened && line.trim().is_empty() {
                    break;
                }
            }
            collected.push(line);

            if !indent_scoped {
                for ch in line.chars() {
                    match ch {
                        '{' => {
                            depth += 1;
                            opened = true;
                        }
                        '}' => depth -= 1,
                        _ => {}
                    }
                }
                if opened && depth <= 0 {
                    break;
                }
            }
        }

        while collected.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
            collected.pop();
        }

        let tokens = CommentTokens::for_language(language_id);
        CodeWindow {
            start_line: start as u32,
            text: collected.join("\n"),
            declaration: declaration_of(&collected, &tokens),
        }
    }
}

/// Locate the first comment opening on a line, skipping string literals.
fn find_opening(chars: &[char], tokens: &CommentTokens, language_id: &str) -> Option<Opening> {
    let single_quotes_are_strings = language_id != "rust";
    let mut quote: Option<char> = None;
    let mut idx = 0;

    while idx < chars.len() {
        let ch = chars[idx];
        if let Some(q) = quote {
            if ch == '\\' {
                idx += 2;
                continue;
            }
            if ch == q {
                quote = None;
            }
            idx += 1;
            continue;
        }

        if ch == '"' || ch == '`' || (ch == '\'' && single_quotes_are_strings) {
            quote = Some(ch);
            idx += 1;
            continue;
        }
        if let Some((open, _)) = tokens.block {
            if starts_at(chars, idx, open) {
                return Some(Opening::Block(idx));
            }
        }
        if let Some(line) = tokens.line {
            if starts_at(chars, idx, line) {
                return Some(Opening::Line(idx));
            }
        }
        idx += 1;
    }
    None
}

fn collect_block_comment(
    lines: &[&str],
    start_line: usize,
    col: usize,
    tokens: &CommentTokens,
) -> (String, Position) {
    let Some((open, close)) = tokens.block else {
        let text: String = lines[start_line].chars().skip(col).collect();
        let end = lines[start_line].chars().count() as u32;
        return (text, Position::new(start_line as u32, end));
    };

    let mut parts: Vec<String> = Vec::new();
    let mut search_from = col + open.chars().count();

    for (line_idx, line) in lines.iter().enumerate().skip(start_line) {
        let chars: Vec<char> = line.chars().collect();
        let from = if line_idx == start_line { search_from } else { 0 };
        let begin = if line_idx == start_line { col } else { 0 };

        if let Some(close_idx) = (from..chars.len()).find(|&i| starts_at(&chars, i, close)) {
            let end_col = close_idx + close.chars().count();
            parts.push(chars[begin..end_col].iter().collect());
            return (
                parts.join("\n"),
                Position::new(line_idx as u32, end_col as u32),
            );
        }
        parts.push(chars[begin.min(chars.len())..].iter().collect());
        search_from = 0;
    }

    // Unterminated block comment runs to end of file
    let last = lines.len().saturating_sub(1);
    let end_col = lines.get(last).map(|l| l.chars().count()).unwrap_or(0);
    (parts.join("\n"), Position::new(last as u32, end_col as u32))
}

/// The declaration lines that open the window, up to the line that opens its body.
fn declaration_of(lines: &[&str], tokens: &CommentTokens) -> Option<String> {
    let mut parts = Vec::new();
    for line in lines.iter().take(3) {
        let trimmed = line.trim();
        if trimmed.is_empty() || tokens.is_comment_shaped(trimmed) {
            break;
        }
        parts.push(trimmed);
        if trimmed.contains('{') || trimmed.ends_with(':') || trimmed.ends_with(';') {
            break;
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn starts_at(chars: &[char], idx: usize, token: &str) -> bool {
    let mut pos = idx;
    for expected in token.chars() {
        match chars.get(pos) {
            Some(&c) if c == expected => pos += 1,
            _ => return false,
        }
    }
    true
}

fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}
