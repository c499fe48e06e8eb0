// crates/engine/src/lib.rs
//! Scoring pipeline: universe, factors and quotes folded into a ranked table.

pub mod advisor;
pub mod report;

use adapters::{ListingSource, QuoteSource};
use common::config::EngineConfig;
use common::*;
use futures::StreamExt;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use universe::{final_score, upside_bonus, CompositeScorer, FactorSource, QuoteBook, UniverseBuilder};

pub use advisor::{Advisor, Analysis};

/// Snapshot of a scoring pass for observers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringProgress {
    pub completed: usize,
    pub total: usize,
    /// Instrument whose quote is being fetched, or the last one started
    pub current: Option<String>,
}

impl ScoringProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

pub struct ScoringEngine {
    universe: UniverseBuilder,
    quotes: QuoteBook,
    factors: Arc<dyn FactorSource>,
    quote_concurrency: usize,
    throttle: Duration,
    progress_tx: watch::Sender<ScoringProgress>,
}

impl ScoringEngine {
    pub fn new(
        universe: UniverseBuilder,
        quotes: QuoteBook,
        factors: Arc<dyn FactorSource>,
        quote_concurrency: usize,
        throttle: Duration,
    ) -> Self {
        let (progress_tx, _) = watch::channel(ScoringProgress::default());
        Self {
            universe,
            quotes,
            factors,
            quote_concurrency: quote_concurrency.max(1),
            throttle,
            progress_tx,
        }
    }

    /// Wire listing and quote collaborators with the configured caches and pacing
    pub fn from_config(
        config: &EngineConfig,
        listings: Arc<dyn ListingSource>,
        quotes: Arc<dyn QuoteSource>,
        factors: Arc<dyn FactorSource>,
    ) -> Self {
        Self::new(
            UniverseBuilder::new(listings, config.naver.max_pages, config.cache.universe_ttl()),
            QuoteBook::new(quotes, config.cache.quote_ttl()),
            factors,
            config.run.quote_concurrency,
            config.run.throttle(),
        )
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ScoringProgress> {
        self.progress_tx.subscribe()
    }

    /// Score the top `limit` instruments of `segment` and rank them.
    ///
    /// Listing and quote failures degrade the table; only invalid arguments
    /// or a non-finite score fail the run.
    pub async fn run(&self, weights: &WeightVector, segment: Segment, limit: usize) -> Result<RankedTable> {
        let limit = validate_limit(limit)?;
        let start = Instant::now();

        tracing::info!("Scoring {} top {} with weights {}", segment, limit, weights);

        let universe = self.universe.build(segment, limit).await;
        let total = universe.len();
        self.progress_tx.send_replace(ScoringProgress {
            completed: 0,
            total,
            current: None,
        });

        if universe.is_empty() {
            tracing::warn!("No instruments to score for {}", segment);
            return Ok(RankedTable::default());
        }

        let scorer = CompositeScorer::new(weights);
        let throttle = self.throttle;
        let progress = &self.progress_tx;

        let quoted = futures::stream::iter(universe.into_iter().enumerate())
            .map(|(i, instrument)| async move {
                if i > 0 && !throttle.is_zero() {
                    tokio::time::sleep(throttle).await;
                }
                // announce before the fetch, which may take seconds
                progress.send_modify(|p| p.current = Some(instrument.name.clone()));
                let quote = self.quotes.quote(&instrument.ticker).await;
                (instrument, quote)
            })
            .buffered(self.quote_concurrency);
        let mut quoted = pin!(quoted);

        let mut rows = Vec::with_capacity(total);
        while let Some((instrument, quote)) = quoted.next().await {
            let factors = self.factors.scores(&instrument.ticker);
            let factor_score = scorer.score(&factors);
            let bonus = upside_bonus(quote.upside_pct);
            let final_score = final_score(factor_score, bonus);

            if !final_score.is_finite() {
                return Err(Error::Internal(format!(
                    "Non-finite score for {} ({})",
                    instrument.ticker, instrument.name
                )));
            }

            tracing::debug!(
                "{} {}: factors={:.1} bonus={:.1} final={:.1}",
                instrument.ticker,
                instrument.name,
                factor_score,
                bonus,
                final_score
            );

            self.progress_tx.send_modify(|p| p.completed += 1);

            rows.push(ScoredInstrument {
                rank: 0,
                instrument,
                quote,
                factors,
                upside_bonus: bonus,
                factor_score,
                final_score,
            });
        }

        let table = RankedTable::from_unranked(rows);

        let elapsed = start.elapsed();
        metrics::histogram!("scoring_run_duration_ms").record(elapsed.as_millis() as f64);
        tracing::info!("Scored {} instruments in {:?}", table.len(), elapsed);
        tracing::debug!("{} quotes cached", self.quotes.cached());

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::{Board, FundListing, PriceSnapshot};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedListing(Vec<Instrument>);

    #[async_trait]
    impl ListingSource for FixedListing {
        async fn market_cap_page(&self, board: Board, page: u32) -> Result<Vec<Instrument>> {
            if board == Board::Kospi && page == 1 {
                Ok(self.0.clone())
            } else {
                Ok(Vec::new())
            }
        }

        async fn fund_listing(&self) -> Result<Vec<FundListing>> {
            Err(Error::Listing("no funds".to_string()))
        }
    }

    struct FixedQuotes {
        prices: HashMap<&'static str, (u64, u64)>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteSource for FixedQuotes {
        async fn fetch_prices(&self, ticker: &str) -> Result<PriceSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (current, target) = self
                .prices
                .get(ticker)
                .copied()
                .ok_or_else(|| Error::Quote(format!("{}: no page", ticker)))?;
            Ok(PriceSnapshot {
                current_price: Some(current),
                target_price: Some(target),
            })
        }
    }

    struct FixedFactors(HashMap<&'static str, FactorScores>);

    impl FactorSource for FixedFactors {
        fn score(&self, ticker: &str, factor: Factor) -> f64 {
            let scores = self.0.get(ticker).copied().unwrap_or(FactorScores {
                momentum: 50.0,
                value: 50.0,
                quality: 50.0,
            });
            match factor {
                Factor::Momentum => scores.momentum,
                Factor::Value => scores.value,
                Factor::Quality => scores.quality,
            }
        }
    }

    fn factors(momentum: f64, value: f64, quality: f64) -> FactorScores {
        FactorScores {
            momentum,
            value,
            quality,
        }
    }

    fn engine(
        instruments: Vec<Instrument>,
        prices: Vec<(&'static str, (u64, u64))>,
        scores: Vec<(&'static str, FactorScores)>,
        concurrency: usize,
    ) -> (ScoringEngine, Arc<FixedQuotes>) {
        let quotes = Arc::new(FixedQuotes {
            prices: prices.into_iter().collect(),
            calls: AtomicUsize::new(0),
        });
        let engine = ScoringEngine::new(
            UniverseBuilder::new(Arc::new(FixedListing(instruments)), 5, Duration::from_secs(3_600)),
            QuoteBook::new(quotes.clone(), Duration::from_secs(86_400)),
            Arc::new(FixedFactors(scores.into_iter().collect())),
            concurrency,
            Duration::ZERO,
        );
        (engine, quotes)
    }

    fn three_instrument_engine(concurrency: usize) -> (ScoringEngine, Arc<FixedQuotes>) {
        engine(
            vec![
                Instrument::new("C", "Gamma"),
                Instrument::new("B", "Beta"),
                Instrument::new("A", "Alpha"),
            ],
            vec![("A", (50_000, 65_000)), ("B", (10_000, 11_000))],
            vec![
                ("A", factors(99.0, 86.0, 49.0)),
                ("B", factors(60.0, 90.0, 80.0)),
                ("C", factors(70.0, 70.0, 70.0)),
            ],
            concurrency,
        )
    }

    fn tickers(table: &RankedTable) -> Vec<&str> {
        table.rows.iter().map(|r| r.instrument.ticker.as_str()).collect()
    }

    #[tokio::test]
    async fn test_end_to_end_scores() {
        let (engine, _) = three_instrument_engine(1);
        let weights = WeightVector::new(50.0, 30.0, 20.0);

        let table = engine.run(&weights, Segment::Kospi, 10).await.unwrap();
        assert_eq!(tickers(&table), vec!["A", "B", "C"]);

        let a = &table.rows[0];
        assert_eq!(a.rank, 1);
        assert_eq!(a.factor_score, 85.1);
        assert_eq!(a.quote.upside_pct, 30.0);
        assert_eq!(a.upside_bonus, 15.0);
        assert_eq!(a.final_score, 100.1);

        let b = &table.rows[1];
        assert_eq!(b.rank, 2);
        assert_eq!(b.factor_score, 73.0);
        assert_eq!(b.quote.upside_pct, 10.0);
        assert_eq!(b.upside_bonus, 5.0);
        assert_eq!(b.final_score, 78.0);

        let c = &table.rows[2];
        assert_eq!(c.rank, 3);
        assert_eq!(c.quote, Quote::ZERO);
        assert_eq!(c.upside_bonus, 0.0);
        assert_eq!(c.final_score, 70.0);
    }

    #[tokio::test]
    async fn test_concurrent_quotes_same_table() {
        let weights = WeightVector::new(50.0, 30.0, 20.0);
        let (sequential, _) = three_instrument_engine(1);
        let (concurrent, _) = three_instrument_engine(4);

        let expected = sequential.run(&weights, Segment::Kospi, 10).await.unwrap();
        let actual = concurrent.run(&weights, Segment::Kospi, 10).await.unwrap();
        assert_eq!(expected, actual);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let (engine, quotes) = three_instrument_engine(1);
        let weights = WeightVector::default();

        let first = engine.run(&weights, Segment::Kospi, 10).await.unwrap();
        let calls = quotes.calls.load(Ordering::SeqCst);
        let second = engine.run(&weights, Segment::Kospi, 10).await.unwrap();

        assert_eq!(first, second);
        // C never resolves, so only its lookup repeats
        assert_eq!(quotes.calls.load(Ordering::SeqCst), calls + 1);
    }

    #[tokio::test]
    async fn test_ties_keep_universe_order() {
        let (engine, _) = engine(
            vec![
                Instrument::new("X", "First"),
                Instrument::new("Y", "Second"),
                Instrument::new("Z", "Third"),
            ],
            vec![],
            vec![],
            1,
        );

        let table = engine.run(&WeightVector::default(), Segment::Kospi, 10).await.unwrap();
        assert_eq!(tickers(&table), vec!["X", "Y", "Z"]);
        assert!(table.rows.iter().all(|r| r.final_score == 50.0));
        assert_eq!(table.rows.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_universe() {
        let (engine, _) = engine(vec![], vec![], vec![], 1);

        let table = engine.run(&WeightVector::default(), Segment::All, 30).await.unwrap();
        assert!(table.is_empty());
        assert_eq!(engine.subscribe_progress().borrow().total, 0);
    }

    #[tokio::test]
    async fn test_failed_fund_listing_is_empty_table() {
        let (engine, _) = three_instrument_engine(1);
        let table = engine.run(&WeightVector::default(), Segment::Etf, 10).await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_limit_out_of_range() {
        let (engine, _) = three_instrument_engine(1);
        let err = engine.run(&WeightVector::default(), Segment::Kospi, 5).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_overflowing_weights_fail_run() {
        let (engine, _) = three_instrument_engine(1);
        let weights = WeightVector::new(1.7e308, 1.7e308, 1.7e308);

        let err = engine.run(&weights, Segment::Kospi, 10).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let (engine, _) = three_instrument_engine(1);
        let progress = engine.subscribe_progress();

        engine.run(&WeightVector::default(), Segment::Kospi, 10).await.unwrap();

        let last = progress.borrow().clone();
        assert_eq!(last.completed, 3);
        assert_eq!(last.total, 3);
        assert_eq!(last.current.as_deref(), Some("Alpha"));
        assert_eq!(last.fraction(), 1.0);
    }

    /// Records the progress snapshot visible while each quote is in flight
    struct ObservedQuotes {
        progress: std::sync::Mutex<Option<watch::Receiver<ScoringProgress>>>,
        seen: std::sync::Mutex<Vec<(String, Option<String>, usize)>>,
    }

    #[async_trait]
    impl QuoteSource for ObservedQuotes {
        async fn fetch_prices(&self, ticker: &str) -> Result<PriceSnapshot> {
            let snapshot = self
                .progress
                .lock()
                .unwrap()
                .as_ref()
                .map(|rx| rx.borrow().clone())
                .unwrap_or_default();
            self.seen
                .lock()
                .unwrap()
                .push((ticker.to_string(), snapshot.current, snapshot.completed));
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(PriceSnapshot::default())
        }
    }

    #[tokio::test]
    async fn test_progress_names_instrument_before_fetch() {
        let quotes = Arc::new(ObservedQuotes {
            progress: std::sync::Mutex::new(None),
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let engine = ScoringEngine::new(
            UniverseBuilder::new(
                Arc::new(FixedListing(vec![
                    Instrument::new("C", "Gamma"),
                    Instrument::new("B", "Beta"),
                ])),
                5,
                Duration::from_secs(3_600),
            ),
            QuoteBook::new(quotes.clone(), Duration::from_secs(86_400)),
            Arc::new(FixedFactors(HashMap::new())),
            1,
            Duration::ZERO,
        );
        *quotes.progress.lock().unwrap() = Some(engine.subscribe_progress());

        engine.run(&WeightVector::default(), Segment::Kospi, 10).await.unwrap();

        let seen = quotes.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("C".to_string(), Some("Gamma".to_string()), 0),
                ("B".to_string(), Some("Beta".to_string()), 1),
            ]
        );
    }
}
