//! Weighted staleness heuristics and the engine that aggregates them.

pub mod age;
pub mod complexity;
pub mod dead_reference;
pub mod divergence;
pub mod signature;
pub mod symbol_drift;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::config::HeuristicWeights;
use crate::context::FileContext;
use crate::error::HeuristicError;
use crate::types::{CommentCandidate, Reason};

pub use age::Age;
pub use complexity::ComplexityDelta;
pub use dead_reference::DeadReference;
pub use divergence::Divergence;
pub use signature::SignatureMismatch;
pub use symbol_drift::SymbolDrift;

/// A heuristic only shows up in `reasons` when its subscore exceeds this floor.
pub const SIGNIFICANCE_FLOOR: f64 = 0.2;

pub const MAX_SCORE: f64 = 100.0;

/// Output of a single heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Subscore in `[0, 1]`.
    pub score: f64,
    pub reason: Option<String>,
}

impl Signal {
    pub fn none() -> Self {
        Self {
            score: 0.0,
            reason: None,
        }
    }

    pub fn new(score: f64, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: Some(reason.into()),
        }
    }
}

pub trait Heuristic: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        candidate: &CommentCandidate,
        context: &FileContext,
    ) -> Result<Signal, HeuristicError>;
}

#[derive(Clone)]
pub struct WeightedHeuristic {
    pub heuristic: Arc<dyn Heuristic>,
    pub weight: f64,
}

impl WeightedHeuristic {
    pub fn new(heuristic: impl Heuristic + 'static, weight: f64) -> Self {
        Self {
            heuristic: Arc::new(heuristic),
            weight: if weight.is_finite() { weight.max(0.0) } else { 0.0 },
        }
    }
}

impl std::fmt::Debug for WeightedHeuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedHeuristic")
            .field("name", &self.heuristic.name())
            .field("weight", &self.weight)
            .finish()
    }
}

/// Aggregate score plus the heuristics that explain it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub score: f64,
    pub reasons: Vec<Reason>,
}

#[derive(Debug)]
pub struct HeuristicEngine {
    heuristics: Vec<WeightedHeuristic>,
    assessments: AtomicU64,
}

impl HeuristicEngine {
    pub fn new(heuristics: Vec<WeightedHeuristic>) -> Self {
        Self {
            heuristics,
            assessments: AtomicU64::new(0),
        }
    }

    /// The six built-in heuristics with the configured weights.
    pub fn standard(weights: &HeuristicWeights, age_half_life_days: f64) -> Self {
        Self::new(vec![
            WeightedHeuristic::new(SymbolDrift, weights.symbol_drift),
            WeightedHeuristic::new(SignatureMismatch, weights.signature_mismatch),
            WeightedHeuristic::new(Divergence, weights.divergence),
            WeightedHeuristic::new(Age::new(age_half_life_days), weights.age),
            WeightedHeuristic::new(DeadReference, weights.dead_reference),
            WeightedHeuristic::new(ComplexityDelta, weights.complexity_delta),
        ])
    }

    pub fn heuristics(&self) -> &[WeightedHeuristic] {
        &self.heuristics
    }

    /// Number of comments assessed so far.
    pub fn assessment_count(&self) -> u64 {
        self.assessments.load(Ordering::Relaxed)
    }

    /// Score a candidate. A failing heuristic counts as zero and never aborts the assessment.
    pub fn assess(&self, candidate: &CommentCandidate, context: &FileContext) -> Assessment {
        self.assessments.fetch_add(1, Ordering::Relaxed);

        let mut total = 0.0;
        let mut reasons = Vec::new();

        for weighted in &self.heuristics {
            let name = weighted.heuristic.name();
            let signal = match weighted.heuristic.evaluate(candidate, context) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(
                        heuristic = name,
                        path = %context.file_path.display(),
                        error = %e,
                        "heuristic failed, scoring it as zero"
                    );
                    Signal::none()
                }
            };

            let subscore = clamp_unit(signal.score);
            let contribution = weighted.weight * subscore;
            total += contribution;

            if subscore > SIGNIFICANCE_FLOOR && contribution > 0.0 {
                reasons.push(Reason {
                    heuristic: name.to_string(),
                    message: signal.reason,
                    contribution,
                });
            }
        }

        // Stable sort keeps registration order for equal contributions
        reasons.sort_by(|a, b| {
            b.contribution
                .partial_cmp(&a.contribution)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Assessment {
            score: round_score(total.clamp(0.0, MAX_SCORE)),
            reasons,
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Scores are reported with two decimals.
fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}
