// crates/universe/src/factors.rs
use common::{Factor, FactorScores};
use md5::{Digest, Md5};

/// Lowest score a factor can take
pub const FACTOR_FLOOR: f64 = 40.0;
const FACTOR_BUCKETS: u128 = 61;

/// Per-instrument factor scores
pub trait FactorSource: Send + Sync {
    fn score(&self, ticker: &str, factor: Factor) -> f64;

    fn scores(&self, ticker: &str) -> FactorScores {
        FactorScores {
            momentum: self.score(ticker, Factor::Momentum),
            value: self.score(ticker, Factor::Value),
            quality: self.score(ticker, Factor::Quality),
        }
    }
}

/// Stand-in for a fundamentals feed: a fixed hash of ticker and factor
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedFactors;

impl FactorSource for SimulatedFactors {
    fn score(&self, ticker: &str, factor: Factor) -> f64 {
        simulated_score(ticker, factor.seed())
    }
}

/// MD5 of `"{ticker}_{seed}"` as a big-endian integer, mod 61, plus 40.
///
/// Integer-valued and within [40, 100]; identical across processes.
pub fn simulated_score(ticker: &str, seed: &str) -> f64 {
    let digest = Md5::digest(format!("{}_{}", ticker, seed).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);

    let bucket = u128::from_be_bytes(bytes) % FACTOR_BUCKETS;
    FACTOR_FLOOR + bucket as f64
}
