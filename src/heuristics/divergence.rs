use crate::context::FileContext;
use crate::error::HeuristicError;
use crate::tokens::words;
use crate::types::CommentCandidate;

use super::{Heuristic, Signal};

/// Share of the comment's content words that appear nowhere in the code it describes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Divergence;

impl Heuristic for Divergence {
    fn name(&self) -> &str {
        "Divergence"
    }

    fn evaluate(
        &self,
        candidate: &CommentCandidate,
        _context: &FileContext,
    ) -> Result<Signal, HeuristicError> {
        if candidate.window.is_empty() {
            return Ok(Signal::none());
        }

        let comment_words = words(&candidate.body());
        if comment_words.is_empty() {
            return Ok(Signal::none());
        }
        let code_words = words(&candidate.window.text);

        let mut unmatched: Vec<&String> = comment_words
            .iter()
            .filter(|w| !code_words.contains(w.as_str()))
            .collect();
        if unmatched.is_empty() {
            return Ok(Signal::none());
        }
        unmatched.sort();

        let score = unmatched.len() as f64 / comment_words.len() as f64;
        Ok(Signal::new(
            score,
            format!(
                "{} of {} comment terms are absent from the code ({})",
                unmatched.len(),
                comment_words.len(),
                unmatched
                    .iter()
                    .take(5)
                    .map(|w| w.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ))
    }
}
