use crate::context::FileContext;
use crate::error::HeuristicError;
use crate::tokens::complexity;
use crate::types::CommentCandidate;

use super::{Heuristic, Signal};

/// Relative change in branch count of the commented block since the last revision touching the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComplexityDelta;

impl Heuristic for ComplexityDelta {
    fn name(&self) -> &str {
        "Complexity Delta"
    }

    fn evaluate(
        &self,
        candidate: &CommentCandidate,
        context: &FileContext,
    ) -> Result<Signal, HeuristicError> {
        let Some(baseline) = context.baseline_window.as_deref() else {
            return Ok(Signal::none());
        };
        if candidate.window.is_empty() {
            return Ok(Signal::none());
        }

        let before = complexity(baseline);
        let now = complexity(&candidate.window.text);
        if before == now {
            return Ok(Signal::none());
        }

        let score = f64::from(before.abs_diff(now)) / f64::from(before.max(now));
        Ok(Signal::new(
            score,
            format!("block complexity went from {} to {}", before, now),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::CommentExtractor;

    fn evaluate(source: &str, baseline: Option<&str>) -> Signal {
        let candidate = CommentExtractor::default().extract(source, "rust").remove(0);
        let mut context = FileContext::detached("lib.rs", "rust", &candidate.window.text);
        context.baseline_window = baseline.map(str::to_string);
        ComplexityDelta.evaluate(&candidate, &context).unwrap()
    }

    const CURRENT: &str = "// Clamp the value\nfn clamp(v: i32) -> i32 {\n    if v < 0 { return 0; }\n    if v > 9 && v != 42 { return 9; }\n    v\n}\n";

    #[test]
    fn test_without_baseline_scores_zero() {
        assert_eq!(evaluate(CURRENT, None), Signal::none());
    }

    #[test]
    fn test_unchanged_complexity_scores_zero() {
        let baseline = "fn clamp(v: i32) -> i32 {\n    if v < 0 { return 0; }\n    if v > 9 && v != 42 { return 9; }\n    v\n}";
        assert_eq!(evaluate(CURRENT, Some(baseline)).score, 0.0);
    }

    #[test]
    fn test_added_branches_raise_score() {
        let baseline = "fn clamp(v: i32) -> i32 {\n    v\n}";
        let signal = evaluate(CURRENT, Some(baseline));
        // 1 -> 4
        assert_eq!(signal.score, 0.75);
        assert_eq!(signal.reason.as_deref(), Some("block complexity went from 1 to 4"));
    }
}
