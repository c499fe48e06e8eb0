// crates/universe/src/builder.rs
use crate::cache::TtlCache;
use adapters::{Board, ListingSource};
use common::{Instrument, Segment};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Assembles the candidate set for a segment, largest names first
pub struct UniverseBuilder {
    source: Arc<dyn ListingSource>,
    max_pages: u32,
    cache: TtlCache<(Segment, usize), Vec<Instrument>>,
}

impl UniverseBuilder {
    pub fn new(source: Arc<dyn ListingSource>, max_pages: u32, ttl: Duration) -> Self {
        Self {
            source,
            max_pages,
            cache: TtlCache::new(ttl),
        }
    }

    /// At most `limit` instruments; listing failures shorten the result.
    ///
    /// `Segment::All` takes `limit` from each board and truncates the
    /// concatenation, so KOSPI names fill the universe first.
    pub async fn build(&self, segment: Segment, limit: usize) -> Vec<Instrument> {
        if let Some(universe) = self.cache.get(&(segment, limit)) {
            tracing::debug!("Universe {} top {} served from cache", segment, limit);
            return universe;
        }

        let start = Instant::now();

        let universe = match segment {
            Segment::Kospi => self.board_top(Board::Kospi, limit).await,
            Segment::Kosdaq => self.board_top(Board::Kosdaq, limit).await,
            Segment::Etf => self.fund_top(limit).await,
            Segment::All => {
                let (mut kospi, kosdaq) = tokio::join!(
                    self.board_top(Board::Kospi, limit),
                    self.board_top(Board::Kosdaq, limit)
                );
                kospi.extend(kosdaq);
                kospi.truncate(limit);
                kospi
            }
        };

        tracing::info!(
            "Universe {} top {}: {} instruments in {:?}",
            segment,
            limit,
            universe.len(),
            start.elapsed()
        );

        if universe.is_empty() {
            tracing::warn!("Universe {} is empty", segment);
        } else {
            self.cache.insert((segment, limit), universe.clone());
        }

        universe
    }

    /// Page through a board's market-cap ranking until `limit` distinct tickers
    async fn board_top(&self, board: Board, limit: usize) -> Vec<Instrument> {
        let mut seen = HashSet::new();
        let mut instruments = Vec::with_capacity(limit);

        for page in 1..=self.max_pages {
            if instruments.len() >= limit {
                break;
            }

            let rows = match self.source.market_cap_page(board, page).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!("Listing {:?} page {} failed: {}", board, page, e);
                    metrics::counter!("listing_page_failures").increment(1);
                    break;
                }
            };

            if rows.is_empty() {
                break;
            }

            for instrument in rows {
                if seen.insert(instrument.ticker.clone()) {
                    instruments.push(instrument);
                    if instruments.len() >= limit {
                        break;
                    }
                }
            }
        }

        instruments
    }

    /// Fund listing ordered by market cap, largest first
    async fn fund_top(&self, limit: usize) -> Vec<Instrument> {
        match self.source.fund_listing().await {
            Ok(mut funds) => {
                funds.sort_by(|a, b| b.market_sum.total_cmp(&a.market_sum));
                funds.into_iter().take(limit).map(|f| f.instrument).collect()
            }
            Err(e) => {
                tracing::warn!("Fund listing failed: {}", e);
                metrics::counter!("listing_page_failures").increment(1);
                Vec::new()
            }
        }
    }
}
