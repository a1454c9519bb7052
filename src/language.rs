//! Per-language comment tokens and file-extension based language detection.

use std::path::Path;

/// Comment delimiters for a language. Languages without a line token only have block comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentTokens {
    pub line: Option<&'static str>,
    pub block: Option<(&'static str, &'static str)>,
}

const SLASH_ONLY: CommentTokens = CommentTokens {
    line: Some("//"),
    block: None,
};
const SLASH_AND_BLOCK: CommentTokens = CommentTokens {
    line: Some("//"),
    block: Some(("/*", "*/")),
};
const HASH_ONLY: CommentTokens = CommentTokens {
    line: Some("#"),
    block: None,
};
const MARKUP: CommentTokens = CommentTokens {
    line: None,
    block: Some(("<!--", "-->")),
};
const CSS: CommentTokens = CommentTokens {
    line: None,
    block: Some(("/*", "*/")),
};

pub const PLAINTEXT: &str = "plaintext";

impl CommentTokens {
    /// Token table lookup. Unknown languages fall back to a generic `//` line token.
    pub fn for_language(language_id: &str) -> Self {
        match language_id {
            "sass" => SLASH_ONLY,
            "python" | "ruby" => HASH_ONLY,
            "typescript" | "javascript" | "csharp" | "java" | "c" | "cpp" | "go" | "rust"
            | "php" | "swift" | "kotlin" | "scala" | "dart" | "scss" | "less" => SLASH_AND_BLOCK,
            "html" | "xml" => MARKUP,
            "css" => CSS,
            _ => SLASH_ONLY,
        }
    }

    /// Whether a trimmed line looks like part of a comment in this language.
    pub fn is_comment_shaped(&self, trimmed: &str) -> bool {
        if let Some(line) = self.line {
            if trimmed.starts_with(line) {
                return true;
            }
        }
        if let Some((start, end)) = self.block {
            if trimmed.starts_with(start) || trimmed.ends_with(end) {
                return true;
            }
        }
        false
    }
}

/// Map a file path to a language id, based on its extension.
pub fn detect_language(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return PLAINTEXT;
    };
    match ext.to_ascii_lowercase().as_str() {
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" | "pyi" => "python",
        "java" => "java",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "scala" | "sc" => "scala",
        "dart" => "dart",
        "html" | "htm" => "html",
        "xml" | "svg" => "xml",
        "css" => "css",
        "scss" => "scss",
        "sass" => "sass",
        "less" => "less",
        _ => PLAINTEXT,
    }
}

/// Languages whose blocks are delimited by indentation rather than braces.
pub fn is_indent_scoped(language_id: &str) -> bool {
    matches!(language_id, "python" | "ruby" | "sass")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_table() {
        assert_eq!(CommentTokens::for_language("python").line, Some("#"));
        assert_eq!(CommentTokens::for_language("rust").block, Some(("/*", "*/")));
        assert_eq!(CommentTokens::for_language("html").line, None);
        assert_eq!(CommentTokens::for_language("typescript").block, Some(("/*", "*/")));
        assert_eq!(CommentTokens::for_language("sass").block, None);
    }

    #[test]
    fn test_unknown_language_defaults_to_slash() {
        let tokens = CommentTokens::for_language("brainfuck");
        assert_eq!(tokens.line, Some("//"));
        assert_eq!(tokens.block, None);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("src/main.rs")), "rust");
        assert_eq!(detect_language(Path::new("app/index.TSX")), "typescript");
        assert_eq!(detect_language(Path::new("tool.py")), "python");
        assert_eq!(detect_language(Path::new("Makefile")), PLAINTEXT);
        assert_eq!(detect_language(Path::new("notes.txt")), PLAINTEXT);
    }

    #[test]
    fn test_comment_shaped_lines() {
        let rust = CommentTokens::for_language("rust");
        assert!(rust.is_comment_shaped("// hello"));
        assert!(rust.is_comment_shaped("/* start"));
        assert!(rust.is_comment_shaped("end */"));
        assert!(!rust.is_comment_shaped("let x = 1;"));
    }
}
