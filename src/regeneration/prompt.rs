use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::{CommentStyle, StyleOptions};
use crate::types::StaleCommentItem;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex"));

pub const DEFAULT_TEMPLATE: &str = "\
You are a senior developer helping update stale code comments.
The following comment appears to be stale or outdated:
Original comment: \"{original}\"

Current code context:
{code}

Update the comment to accurately reflect the current code in {language}.
{style}
{emoji}
Ensure the comment is relevant, accurate, and adds value.
{output}

Stale comment reasons:
{reasons}";

/// The values a template may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Language,
    Original,
    Code,
    Reasons,
    Style,
    Emoji,
    Output,
}

impl Placeholder {
    pub fn parse(name: &str) -> Option<Self> {
        let placeholder = match name {
            "language" | "languageId" => Placeholder::Language,
            "original" | "originalComment" => Placeholder::Original,
            "code" => Placeholder::Code,
            "reasons" => Placeholder::Reasons,
            "style" | "styleInstruction" => Placeholder::Style,
            "emoji" | "emojiInstruction" => Placeholder::Emoji,
            "output" | "outputInstruction" => Placeholder::Output,
            _ => return None,
        };
        Some(placeholder)
    }
}

/// Regeneration prompt with `{name}` placeholders. Unrecognized placeholders are left as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// A configured template, falling back to the default when unset or blank.
    pub fn from_config(template: Option<&str>) -> Self {
        match template {
            Some(t) if !t.trim().is_empty() => Self::new(t),
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn render(&self, item: &StaleCommentItem, style: &StyleOptions) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures| {
                match Placeholder::parse(&caps[1]) {
                    Some(placeholder) => value_of(placeholder, item, style),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn value_of(placeholder: Placeholder, item: &StaleCommentItem, style: &StyleOptions) -> String {
    let fixed = match placeholder {
        Placeholder::Language => return item.language_id.clone(),
        Placeholder::Original => return item.original_comment_text.clone(),
        Placeholder::Code => return item.surrounding_code.clone(),
        Placeholder::Reasons => {
            return item
                .reasons
                .iter()
                .map(|reason| format!("- {}", reason))
                .collect::<Vec<_>>()
                .join("\n")
        }
        Placeholder::Style => match style.comment_style {
            CommentStyle::Detailed => "Make comments more detailed and explanatory, including rationale and context where helpful.",
            CommentStyle::Succinct => "Keep comments succinct and focused only on key logic.",
        },
        Placeholder::Emoji if style.use_emojis => "You MAY add occasional emojis in comments.",
        Placeholder::Emoji => "Do not use emojis.",
        Placeholder::Output if style.comment_only => {
            "Return ONLY the updated comment text (no code, no markdown fences)."
        }
        Placeholder::Output => "Return the code block with the updated comment in place.",
    };
    fixed.to_string()
}
