// crates/common/src/config.rs
use crate::{validate_limit, Error, Result, Segment};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.toml";
pub const CONFIG_PATH_ENV: &str = "RANKER_CONFIG";
pub const ENV_PREFIX: &str = "RANKER";

/// Top-level configuration for a ranking run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub run: RunConfig,
    pub naver: NaverConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub log: LogConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub segment: Segment,
    pub limit: usize,
    /// Quote lookups in flight at once; 1 keeps the pass strictly sequential
    pub quote_concurrency: usize,
    /// Pause between sequential quote fetches
    pub throttle_ms: u64,
    pub output: OutputFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            segment: Segment::All,
            limit: 30,
            quote_concurrency: 1,
            throttle_ms: 50,
            output: OutputFormat::Table,
        }
    }
}

impl RunConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NaverConfig {
    pub base_url: String,
    pub user_agent: String,
    pub quote_timeout_ms: u64,
    pub listing_timeout_ms: u64,
    /// Listing pages fetched per segment before giving up
    pub max_pages: u32,
    pub rate_limit_per_sec: f64,
    pub rate_limit_burst: usize,
}

impl Default for NaverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://finance.naver.com".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            quote_timeout_ms: 3_000,
            listing_timeout_ms: 10_000,
            max_pages: 5,
            rate_limit_per_sec: 20.0,
            rate_limit_burst: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub universe_ttl_secs: u64,
    pub quote_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            universe_ttl_secs: 3_600,
            quote_ttl_secs: 24 * 3_600,
        }
    }
}

impl CacheConfig {
    pub fn universe_ttl(&self) -> Duration {
        Duration::from_secs(self.universe_ttl_secs)
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-pro".to_string(),
            timeout_ms: 180_000,
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Fallback filter when RUST_LOG is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub prometheus: bool,
}

impl EngineConfig {
    /// Load from the config file (if present) layered under `RANKER__*` env vars.
    ///
    /// The file path comes from `path`, then `RANKER_CONFIG`, then the default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        tracing::debug!("Loading config from {}", path.display());

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: EngineConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse from a TOML string, without environment overrides
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?;

        let cfg: EngineConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        validate_limit(self.run.limit)?;

        if self.run.quote_concurrency == 0 {
            return Err(Error::Config("run.quote_concurrency must be at least 1".to_string()));
        }
        if self.naver.max_pages == 0 {
            return Err(Error::Config("naver.max_pages must be at least 1".to_string()));
        }
        if self.naver.rate_limit_per_sec <= 0.0 || self.naver.rate_limit_burst == 0 {
            return Err(Error::Config("naver rate limit must be positive".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::Config("llm.model is empty".to_string()));
        }

        Ok(())
    }
}
