// crates/engine/src/main.rs
use adapters::{GeminiClient, NaverFinance};
use anyhow::Context;
use common::config::{EngineConfig, LogConfig, OutputFormat};
use common::security::{ApiKey, ChainedCredentialLoader, CredentialLoader, KeyringCredentialStore};
use common::{validate_limit, Segment};
use engine::{report, Advisor, ScoringEngine};
use std::io::BufRead;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use universe::SimulatedFactors;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = EngineConfig::load(None).context("Failed to load configuration")?;
    init_logging(&config.log);

    match Command::parse(std::env::args().skip(1)) {
        Command::SetKey => return store_api_key(&config),
        Command::Rank(args) => apply_args(&mut config, args.into_iter()).context("Invalid arguments")?,
    }

    tracing::info!("Universe ranker starting");

    let prometheus = if config.telemetry.prometheus {
        Some(
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .context("Failed to install Prometheus recorder")?,
        )
    } else {
        None
    };

    // Missing credentials stop the run before any listing or quote traffic
    let credentials = ChainedCredentialLoader::standard(&config.llm.api_key_env);
    let api_key = credentials
        .load()
        .with_context(|| format!("Set {} or store a key in the OS keychain", config.llm.api_key_env))?;

    let naver = Arc::new(NaverFinance::new(&config.naver).context("Failed to build market data client")?);
    let gemini = GeminiClient::new(&config.llm, api_key).context("Failed to build analysis client")?;
    let advisor = Advisor::new(Arc::new(gemini));
    let engine = ScoringEngine::from_config(&config, naver.clone(), naver, Arc::new(SimulatedFactors));

    let today = chrono::Local::now().date_naive();
    let analysis = match advisor.analyze(today).await {
        Ok(analysis) => analysis,
        Err(e) if e.is_fatal() => {
            return Err(anyhow::Error::new(e)
                .context(format!("Replace the key with `ranker {}`", SET_KEY_COMMAND)));
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Factor analysis failed")),
    };

    if config.run.output == OutputFormat::Table {
        println!("Strategy report ({})\n", today.format("%Y.%m.%d"));
        println!("{}\n", analysis.report);
    }

    let mut progress = engine.subscribe_progress();
    let progress_task = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = progress.borrow_and_update().clone();
            if let Some(ref name) = p.current {
                tracing::info!("[{}/{}] {:.0}% {}", p.completed, p.total, p.fraction() * 100.0, name);
            }
        }
    });

    let table = engine
        .run(&analysis.resolution.weights, config.run.segment, config.run.limit)
        .await
        .context("Scoring run failed")?;
    progress_task.abort();

    match config.run.output {
        OutputFormat::Table => print!("{}", report::render_table(&table, &analysis.resolution)),
        OutputFormat::Json => println!("{}", report::render_json(&table, &analysis.resolution)?),
    }

    if let Some(handle) = prometheus {
        tracing::info!("Metrics snapshot:\n{}", handle.render());
    }

    tracing::info!("Ranked {} instruments", table.len());
    Ok(())
}

const SET_KEY_COMMAND: &str = "set-key";

#[derive(Debug, PartialEq)]
enum Command {
    /// `ranker [segment] [limit]`
    Rank(Vec<String>),
    /// `ranker set-key`, key read from stdin
    SetKey,
}

impl Command {
    fn parse(args: impl Iterator<Item = String>) -> Self {
        let args: Vec<String> = args.collect();
        if args.first().map(String::as_str) == Some(SET_KEY_COMMAND) {
            Command::SetKey
        } else {
            Command::Rank(args)
        }
    }
}

/// Save the key from the first stdin line to the OS keychain
fn store_api_key(config: &EngineConfig) -> anyhow::Result<()> {
    eprintln!("Paste the {} value and press Enter:", config.llm.api_key_env);

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read the key from stdin")?;
    let key = ApiKey::new(line)?;

    KeyringCredentialStore::for_env_var(&config.llm.api_key_env)
        .save(&key)
        .context("Failed to store the key")?;
    Ok(())
}

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn apply_args(config: &mut EngineConfig, mut args: impl Iterator<Item = String>) -> common::Result<()> {
    if let Some(segment) = args.next() {
        config.run.segment = segment.parse::<Segment>()?;
    }
    if let Some(limit) = args.next() {
        let limit = limit
            .parse::<usize>()
            .map_err(|e| common::Error::Config(format!("limit '{}': {}", limit, e)))?;
        config.run.limit = validate_limit(limit)?;
    }
    Ok(())
}
