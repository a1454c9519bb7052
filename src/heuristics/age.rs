use crate::context::FileContext;
use crate::error::HeuristicError;
use crate::types::CommentCandidate;

use super::{Heuristic, Signal};

/// Time since the code last changed, as `1 - 0.5^(days / half_life)`.
#[derive(Debug, Clone, Copy)]
pub struct Age {
    half_life_days: f64,
}

impl Age {
    pub fn new(half_life_days: f64) -> Self {
        Self { half_life_days }
    }

    pub fn half_life_days(&self) -> f64 {
        self.half_life_days
    }
}

impl Default for Age {
    fn default() -> Self {
        Self::new(180.0)
    }
}

impl Heuristic for Age {
    fn name(&self) -> &str {
        "Age"
    }

    fn evaluate(
        &self,
        _candidate: &CommentCandidate,
        context: &FileContext,
    ) -> Result<Signal, HeuristicError> {
        let Some(vcs) = &context.vcs else {
            return Ok(Signal::none());
        };
        if !(self.half_life_days.is_finite() && self.half_life_days > 0.0) {
            return Err(HeuristicError::Failed {
                heuristic: self.name().to_string(),
                reason: format!("invalid half-life {}", self.half_life_days),
            });
        }

        let elapsed = context.now.signed_duration_since(vcs.last_modified);
        let days = (elapsed.num_seconds().max(0) as f64) / 86_400.0;
        let score = 1.0 - 0.5f64.powf(days / self.half_life_days);

        Ok(Signal::new(
            score,
            format!("code last changed {} days ago", days.floor() as i64),
        ))
    }
}
