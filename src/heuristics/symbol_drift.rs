use crate::context::FileContext;
use crate::error::HeuristicError;
use crate::tokens::referenced_identifiers;
use crate::types::CommentCandidate;

use super::{Heuristic, Signal};

/// Fraction of identifiers named in the comment that no longer appear in its code window.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolDrift;

impl Heuristic for SymbolDrift {
    fn name(&self) -> &str {
        "Symbol Drift"
    }

    fn evaluate(
        &self,
        candidate: &CommentCandidate,
        context: &FileContext,
    ) -> Result<Signal, HeuristicError> {
        if candidate.window.is_empty() {
            return Ok(Signal::none());
        }

        let named = referenced_identifiers(&candidate.body());
        if named.is_empty() {
            return Ok(Signal::none());
        }

        let missing: Vec<&String> = named
            .iter()
            .filter(|ident| !context.symbols.contains(ident.as_str()))
            .collect();
        if missing.is_empty() {
            return Ok(Signal::none());
        }

        let score = missing.len() as f64 / named.len() as f64;
        let listed = missing
            .iter()
            .map(|m| format!("`{}`", m))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Signal::new(
            score,
            format!("mentions {} which no longer appear in the code below", listed),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::CommentExtractor;

    fn evaluate(source: &str) -> Signal {
        let candidate = CommentExtractor::default().extract(source, "rust").remove(0);
        let context = FileContext::detached("lib.rs", "rust", &candidate.window.text);
        SymbolDrift.evaluate(&candidate, &context).unwrap()
    }

    #[test]
    fn test_all_symbols_present() {
        let signal = evaluate("// Delegates to `load_config`\nfn start() {\n    load_config();\n}\n");
        assert_eq!(signal.score, 0.0);
    }

    #[test]
    fn test_renamed_symbol_drifts() {
        let signal = evaluate("// Delegates to `load_config`\nfn start() {\n    read_settings();\n}\n");
        assert_eq!(signal.score, 1.0);
        assert!(signal.reason.unwrap().contains("`load_config`"));
    }

    #[test]
    fn test_partial_drift() {
        let signal = evaluate("// Calls parse_args() then run_app()\nfn main() {\n    parse_args();\n    start_app();\n}\n");
        assert_eq!(signal.score, 0.5);
    }

    #[test]
    fn test_plain_prose_has_no_symbols() {
        assert_eq!(evaluate("// Start the server\nfn main() {}\n").score, 0.0);
    }
}
