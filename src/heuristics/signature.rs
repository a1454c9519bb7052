use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::FileContext;
use crate::error::HeuristicError;
use crate::tokens::{identifiers, is_stopword, normalize_word, words};
use crate::types::CommentCandidate;

use super::{Heuristic, Signal};

static PARAM_CLAIM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)(?:@param\s+(?:\{[^}]*\}\s*)?\[?([A-Za-z_$][A-Za-z0-9_$]*)|:param\s+(?:\w+\s+)?(\w+)\s*:|^\s*\*\s+`(\w+)`\s*[-:])",
    )
    .expect("valid param regex")
});

static RETURN_CLAIM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:@returns?|:returns?:|\breturns?\b)[:\s]*(?:\{[^}]*\}\s*)?(?:(?:the|a|an)\s+)?([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("valid return regex")
});

/// Compares what a comment says about parameters and return value with the declaration below it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureMismatch;

impl SignatureMismatch {
    fn parameters(declaration: &str) -> Option<HashSet<String>> {
        let open = declaration.find('(')?;
        let rest = &declaration[open + 1..];
        let inner = rest.find(')').map(|close| &rest[..close]).unwrap_or(rest);
        Some(identifiers(inner).map(str::to_string).collect())
    }

    fn return_evidence(declaration: &str, window: &str) -> (HashSet<String>, HashSet<String>) {
        let mut evidence = vec![declaration];
        let code_lines: Vec<&str> = window
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && *l != "}" && *l != "};")
            .collect();

        for line in &code_lines {
            if line.starts_with("return") || line.contains(" return ") || line.contains("=>") || line.starts_with("yield") {
                evidence.push(line);
            }
        }
        // Tail expression of expression-bodied languages
        if let Some(last) = code_lines.last() {
            evidence.push(last);
        }

        let joined = evidence.join("\n");
        let lowered = identifiers(&joined).map(|i| i.to_lowercase()).collect();
        (words(&joined), lowered)
    }
}

impl Heuristic for SignatureMismatch {
    fn name(&self) -> &str {
        "Signature Mismatch"
    }

    fn evaluate(
        &self,
        candidate: &CommentCandidate,
        _context: &FileContext,
    ) -> Result<Signal, HeuristicError> {
        let Some(declaration) = candidate.window.declaration.as_deref() else {
            return Ok(Signal::none());
        };
        let body = candidate.body();

        let mut claims = 0usize;
        let mut mismatches = Vec::new();

        if let Some(params) = Self::parameters(declaration) {
            for cap in PARAM_CLAIM.captures_iter(&body) {
                let Some(name) = cap.iter().skip(1).flatten().next() else {
                    continue;
                };
                claims += 1;
                if !params.contains(name.as_str()) {
                    mismatches.push(format!("documents parameter `{}` missing from the signature", name.as_str()));
                }
            }
        }

        let (evidence_words, evidence_idents) = Self::return_evidence(declaration, &candidate.window.text);
        for cap in RETURN_CLAIM.captures_iter(&body) {
            let noun = cap[1].to_lowercase();
            if noun.len() < 3 || is_stopword(&noun) {
                continue;
            }
            claims += 1;
            let normalized = normalize_word(&noun);
            if !evidence_words.contains(&normalized) && !evidence_idents.contains(&noun) {
                mismatches.push(format!("says it returns `{}` but the code does not", &cap[1]));
            }
        }

        if claims == 0 || mismatches.is_empty() {
            return Ok(Signal::none());
        }
        Ok(Signal::new(
            mismatches.len() as f64 / claims as f64,
            mismatches.join("; "),
        ))
    }
}
