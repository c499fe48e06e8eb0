// crates/common/src/lib.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod config;
pub mod error;
pub mod security;

pub use error::{Error, Result};

/// Smallest universe a run may request
pub const MIN_LIMIT: usize = 10;
/// Largest universe a run may request
pub const MAX_LIMIT: usize = 100;

/// Market segments the universe can be drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    /// KOSPI and KOSDAQ combined
    All,
    #[serde(alias = "segment_a")]
    Kospi,
    #[serde(alias = "segment_b")]
    Kosdaq,
    #[serde(alias = "fund")]
    Etf,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::All => "all",
            Segment::Kospi => "kospi",
            Segment::Kosdaq => "kosdaq",
            Segment::Etf => "etf",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Segment::All),
            "kospi" | "segment_a" => Ok(Segment::Kospi),
            "kosdaq" | "segment_b" => Ok(Segment::Kosdaq),
            "etf" | "fund" => Ok(Segment::Etf),
            other => Err(Error::Config(format!("Unknown segment: {}", other))),
        }
    }
}

/// Check a requested universe size against the supported range
pub fn validate_limit(limit: usize) -> Result<usize> {
    if (MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(Error::Config(format!(
            "Universe limit {} outside [{}, {}]",
            limit, MIN_LIMIT, MAX_LIMIT
        )))
    }
}

/// A tradable instrument as listed by the venue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub name: String,
}

impl Instrument {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
        }
    }
}

/// Factors the composite score is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Factor {
    Momentum,
    Value,
    Quality,
}

impl Factor {
    pub const ALL: [Factor; 3] = [Factor::Momentum, Factor::Value, Factor::Quality];

    /// Seed string used by the simulated factor source
    pub fn seed(&self) -> &'static str {
        match self {
            Factor::Momentum => "mom",
            Factor::Value => "val",
            Factor::Quality => "qual",
        }
    }

    /// Key used in the weight payload
    pub fn key(&self) -> &'static str {
        match self {
            Factor::Momentum => "Momentum",
            Factor::Value => "Value",
            Factor::Quality => "Quality",
        }
    }
}

/// Factor weights in percent, nominally summing to 100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    #[serde(rename = "Momentum")]
    pub momentum: f64,
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Quality")]
    pub quality: f64,
}

impl WeightVector {
    pub const fn new(momentum: f64, value: f64, quality: f64) -> Self {
        Self {
            momentum,
            value,
            quality,
        }
    }

    pub fn sum(&self) -> f64 {
        self.momentum + self.value + self.quality
    }
}

impl Default for WeightVector {
    /// Near-equal thirds, summing to exactly 100
    fn default() -> Self {
        Self::new(33.3, 33.3, 33.4)
    }
}

impl fmt::Display for WeightVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Momentum {}% | Value {}% | Quality {}%",
            self.momentum, self.value, self.quality
        )
    }
}

/// Per-instrument factor sub-scores, each in [40, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub momentum: f64,
    pub value: f64,
    pub quality: f64,
}

/// Price snapshot with analyst target. Zero means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub current_price: u64,
    pub target_price: u64,
    pub upside_pct: f64,
}

impl Quote {
    /// Canonical value for a missing or failed lookup
    pub const ZERO: Quote = Quote {
        current_price: 0,
        target_price: 0,
        upside_pct: 0.0,
    };
}

/// One row of the ranked table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredInstrument {
    pub rank: usize,
    pub instrument: Instrument,
    pub quote: Quote,
    pub factors: FactorScores,
    pub upside_bonus: f64,
    pub factor_score: f64,
    pub final_score: f64,
}

/// Scored instruments ordered by final score, ranked 1..N
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedTable {
    pub rows: Vec<ScoredInstrument>,
}

impl RankedTable {
    /// Sort by final score descending and assign dense ranks.
    ///
    /// Equal scores keep their input order.
    pub fn from_unranked(mut rows: Vec<ScoredInstrument>) -> Self {
        rows.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Nearest tenth of the exact binary value, exact ties to even.
///
/// Scaling by 10 first would round twice: 7.35 is stored just below 7.35
/// and must give 7.3.
pub fn round1(x: f64) -> f64 {
    format!("{:.1}", x).parse().unwrap_or(x)
}
