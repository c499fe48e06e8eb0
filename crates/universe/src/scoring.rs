// crates/universe/src/scoring.rs
use common::{round1, FactorScores, WeightVector};

/// Upside at which the bonus saturates
pub const UPSIDE_SATURATION_PCT: f64 = 30.0;
/// Largest bonus the analyst upside can add
pub const MAX_UPSIDE_BONUS: f64 = 15.0;

/// Weighted blend of the three factor scores
pub struct CompositeScorer {
    momentum_weight: f64,
    value_weight: f64,
    quality_weight: f64,
}

impl CompositeScorer {
    /// Weights are given in percent
    pub fn new(weights: &WeightVector) -> Self {
        Self {
            momentum_weight: weights.momentum / 100.0,
            value_weight: weights.value / 100.0,
            quality_weight: weights.quality / 100.0,
        }
    }

    /// Composite factor score, rounded to one decimal
    pub fn score(&self, factors: &FactorScores) -> f64 {
        round1(
            factors.momentum * self.momentum_weight
                + factors.value * self.value_weight
                + factors.quality * self.quality_weight,
        )
    }
}

/// Linear in upside up to the saturation point, zero for no upside
pub fn upside_bonus(upside_pct: f64) -> f64 {
    if upside_pct <= 0.0 {
        return 0.0;
    }
    round1(MAX_UPSIDE_BONUS.min(upside_pct / UPSIDE_SATURATION_PCT * MAX_UPSIDE_BONUS))
}

pub fn final_score(factor_score: f64, bonus: f64) -> f64 {
    round1(factor_score + bonus)
}
