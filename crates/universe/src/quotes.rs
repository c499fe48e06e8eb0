// crates/universe/src/quotes.rs
use crate::cache::TtlCache;
use adapters::{PriceSnapshot, QuoteSource};
use common::{round1, Quote};
use std::sync::Arc;
use std::time::Duration;

/// Quote lookups that never fail: misses become [`Quote::ZERO`]
pub struct QuoteBook {
    source: Arc<dyn QuoteSource>,
    cache: TtlCache<String, Quote>,
}

impl QuoteBook {
    pub fn new(source: Arc<dyn QuoteSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: TtlCache::new(ttl),
        }
    }

    pub async fn quote(&self, ticker: &str) -> Quote {
        if let Some(quote) = self.cache.get(ticker) {
            metrics::counter!("quote_cache_hits").increment(1);
            return quote;
        }

        match self.source.fetch_prices(ticker).await {
            Ok(prices) => {
                let quote = quote_from_prices(prices);
                tracing::debug!(
                    "{}: current={} target={} upside={}%",
                    ticker, quote.current_price, quote.target_price, quote.upside_pct
                );
                self.cache.insert(ticker.to_string(), quote);
                quote
            }
            Err(e) => {
                tracing::warn!("Quote lookup failed for {}: {}", ticker, e);
                metrics::counter!("quote_fetch_failures").increment(1);
                Quote::ZERO
            }
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Known prices are kept; upside only when both are known
pub fn quote_from_prices(prices: PriceSnapshot) -> Quote {
    let current_price = prices.current_price.unwrap_or(0);
    let target_price = prices.target_price.unwrap_or(0);

    Quote {
        current_price,
        target_price,
        upside_pct: upside_pct(current_price, target_price),
    }
}

/// Percent by which the target exceeds the current price, one decimal
pub fn upside_pct(current_price: u64, target_price: u64) -> f64 {
    if current_price == 0 || target_price <= current_price {
        return 0.0;
    }
    round1((target_price as f64 / current_price as f64 - 1.0) * 100.0)
}
