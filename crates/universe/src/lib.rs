// crates/universe/src/lib.rs
//! Universe construction and per-instrument scoring inputs.

pub mod builder;
pub mod cache;
pub mod factors;
pub mod quotes;
pub mod scoring;
pub mod weights;

pub use builder::UniverseBuilder;
pub use cache::TtlCache;
pub use factors::{FactorSource, SimulatedFactors};
pub use quotes::QuoteBook;
pub use scoring::{final_score, upside_bonus, CompositeScorer};
pub use weights::{resolve, resolve_from_text, FallbackReason, WeightResolution, WeightSource};
