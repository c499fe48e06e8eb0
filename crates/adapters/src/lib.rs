// crates/adapters/src/lib.rs
use async_trait::async_trait;
use common::*;
use serde::{Deserialize, Serialize};

pub mod gemini;
pub mod naver;
mod rate_limiter;

pub use gemini::GeminiClient;
pub use naver::NaverFinance;
pub use rate_limiter::RateLimiter;

/// Stock boards with a market-cap listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Board {
    Kospi,
    Kosdaq,
}

impl Board {
    /// Board index used by the listing endpoint
    pub fn sosok(&self) -> u8 {
        match self {
            Board::Kospi => 0,
            Board::Kosdaq => 1,
        }
    }
}

/// Fund listing entry with its size metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundListing {
    pub instrument: Instrument,
    pub market_sum: f64,
}

/// Raw prices scraped for one ticker; `None` when the markup is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub current_price: Option<u64>,
    pub target_price: Option<u64>,
}

/// Market-cap ordered listings
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// One page of a board's market-cap ranking (1-based).
    ///
    /// An empty page means the listing has no more rows.
    async fn market_cap_page(&self, board: Board, page: u32) -> Result<Vec<Instrument>>;

    /// Full fund listing, in whatever order the venue returns it
    async fn fund_listing(&self) -> Result<Vec<FundListing>>;
}

/// Current and analyst target price per ticker
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_prices(&self, ticker: &str) -> Result<PriceSnapshot>;
}

/// Text-generation service producing the factor analysis report
#[async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model(&self) -> &str;
}
