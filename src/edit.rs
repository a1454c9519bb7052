//! Writing regenerated comments back into source files.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::EditError;
use crate::types::{Position, TextRange};

/// Replaces a range of a file in one step: either the whole edit lands or nothing does.
///
/// `expected` is the comment the range held when it was scanned. Implementations refuse the
/// edit when the range no longer holds it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EditApplier: Send + Sync {
    async fn apply(
        &self,
        path: &Path,
        range: &TextRange,
        expected: &str,
        replacement: &str,
    ) -> Result<(), EditError>;
}

/// Edits files on the local filesystem through a temporary file renamed over the original.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsEditApplier;

#[async_trait]
impl EditApplier for FsEditApplier {
    async fn apply(
        &self,
        path: &Path,
        range: &TextRange,
        expected: &str,
        replacement: &str,
    ) -> Result<(), EditError> {
        let io_err = |source| EditError::Io {
            path: path.to_path_buf(),
            source,
        };

        let original = tokio::fs::read_to_string(path).await.map_err(io_err)?;
        let current = text_at(&original, range).ok_or_else(|| EditError::OutOfBounds {
            path: path.to_path_buf(),
            range: range.to_string(),
        })?;
        if !same_comment(current, expected) {
            return Err(EditError::Conflict {
                path: path.to_path_buf(),
                range: range.to_string(),
            });
        }
        let updated = splice(&original, range, replacement).ok_or_else(|| EditError::OutOfBounds {
            path: path.to_path_buf(),
            range: range.to_string(),
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{}.stale-comments.tmp", file_name));
        tokio::fs::write(&tmp, updated).await.map_err(io_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }

        debug!(path = %path.display(), range = %range, "replaced comment");
        Ok(())
    }
}

/// Byte offset of a character position, or `None` when it lies outside `text`.
fn byte_offset(text: &str, position: Position) -> Option<usize> {
    let mut line_start = 0;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if idx == position.line as usize {
            let content = line.trim_end_matches('\n').trim_end_matches('\r');
            let column = position.column as usize;
            if column == content.chars().count() {
                return Some(line_start + content.len());
            }
            return content
                .char_indices()
                .nth(column)
                .map(|(byte, _)| line_start + byte);
        }
        line_start += line.len();
    }
    // Position just past a file that does not end in a newline
    if position.column == 0 && position.line as usize == text.split_inclusive('\n').count() {
        return Some(text.len());
    }
    None
}

fn byte_range(text: &str, range: &TextRange) -> Option<(usize, usize)> {
    let start = byte_offset(text, range.start)?;
    let end = byte_offset(text, range.end)?;
    (start <= end).then_some((start, end))
}

/// The slice of `text` covered by `range`.
pub fn text_at<'a>(text: &'a str, range: &TextRange) -> Option<&'a str> {
    let (start, end) = byte_range(text, range)?;
    Some(&text[start..end])
}

// Comment text is recorded with each line trimmed
fn same_comment(found: &str, expected: &str) -> bool {
    let normalize = |s: &str| -> Vec<String> { s.lines().map(|l| l.trim().to_string()).collect() };
    normalize(found) == normalize(expected)
}

/// `text` with `range` replaced.
///
/// The replacement keeps its own relative indentation: the indent shared by all of its lines is
/// swapped for the indentation of the range's first line.
pub fn splice(text: &str, range: &TextRange, replacement: &str) -> Option<String> {
    let (start, end) = byte_range(text, range)?;

    let line_begin = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &text[line_begin..start];
    let indent: String = if prefix.chars().all(char::is_whitespace) {
        prefix.to_string()
    } else {
        String::new()
    };

    let lines: Vec<&str> = replacement.trim_end_matches('\n').lines().collect();
    let common = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut body = lines.first().map(|l| l.trim_start()).unwrap_or_default().to_string();
    for line in lines.iter().skip(1) {
        body.push('\n');
        if line.trim().is_empty() {
            continue;
        }
        body.push_str(&indent);
        body.push_str(line.get(common..).unwrap_or_else(|| line.trim_start()));
    }

    let mut out = String::with_capacity(text.len() + body.len());
    out.push_str(&text[..start]);
    out.push_str(&body);
    out.push_str(&text[end..]);
    Some(out)
}
