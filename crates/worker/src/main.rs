use anyhow::Context;
use clap::Parser;
use rs_rating_core::config::Settings;
use rs_rating_core::domain::rating::percentile_ratings;
use rs_rating_core::ingest::provider::HttpJsonMarketData;
use rs_rating_core::pipeline::{run_pipeline, PipelineConfig};
use rs_rating_core::storage::checkpoint::{CheckpointState, CheckpointStore};
use rs_rating_core::storage::output::{build_run_output, write_output};
use rs_rating_core::universe;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Logged at the end of a run as a sanity spot-check of the ratings.
const SPOTLIGHT_TICKERS: [&str; 7] = ["AAPL", "MSFT", "NVDA", "TSLA", "GOOGL", "AMZN", "META"];

#[derive(Debug, Parser)]
#[command(name = "rs_rating_worker")]
struct Args {
    /// Universe cache file (sector -> group -> stocks JSON document).
    #[arg(long, default_value = ".finviz-cache.json")]
    universe: PathBuf,

    /// Final ratings output file.
    #[arg(long, default_value = "market_rs_ratings.json")]
    output: PathBuf,

    /// Partial-progress checkpoint file.
    #[arg(long, default_value = ".rs_partial_scores.json")]
    checkpoint: PathBuf,

    /// Continue from an existing checkpoint instead of starting fresh.
    #[arg(long)]
    resume: bool,

    /// Tickers per data-provider request.
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Do everything except writing the output file.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(args, settings).await {
        sentry_anyhow::capture_anyhow(&err);
        return Err(err);
    }
    Ok(())
}

async fn run(args: Args, settings: Settings) -> anyhow::Result<()> {
    let started = std::time::Instant::now();

    let universe = universe::load_universe(&args.universe)
        .context("universe load failed; run the screener cache refresh first")?;
    tracing::info!(
        tickers = universe.len(),
        path = %args.universe.display(),
        "loaded universe"
    );

    let store = CheckpointStore::new(args.checkpoint.clone());
    let state = if args.resume {
        match store.load().await {
            Ok(Some(state)) => {
                tracing::info!(
                    scores = state.scores.len(),
                    processed = state.processed.len(),
                    "resuming from checkpoint"
                );
                state
            }
            Ok(None) => {
                tracing::info!("no checkpoint found; starting fresh");
                CheckpointState::default()
            }
            Err(err) => {
                tracing::warn!(error = %err, "checkpoint unreadable; starting fresh");
                CheckpointState::default()
            }
        }
    } else {
        CheckpointState::default()
    };

    let provider = HttpJsonMarketData::from_settings(&settings)?;
    let config = PipelineConfig {
        batch_size: args.batch_size,
        pace: Duration::from_millis(pace_ms_from_env()),
        ..PipelineConfig::default()
    };

    let state = run_pipeline(&universe, &provider, &store, &config, state).await?;
    let ratings = percentile_ratings(&state.scores);

    for sym in SPOTLIGHT_TICKERS {
        if let Some(rating) = ratings.get(sym) {
            tracing::info!(
                ticker = sym,
                rating,
                raw = state.scores.get(sym).copied().unwrap_or(0.0),
                "spotlight rating"
            );
        }
    }

    let output = build_run_output(ratings, universe.len(), started.elapsed());

    if args.dry_run {
        tracing::info!(
            rated = output.metadata.total_stocks_scored,
            skipped = output.metadata.total_skipped,
            dry_run = true,
            "dry run: skipping output write"
        );
        return Ok(());
    }

    write_output(&args.output, &output)
        .await
        .with_context(|| format!("failed to write ratings to {}", args.output.display()))?;
    store.clear().await?;

    tracing::info!(
        rated = output.metadata.total_stocks_scored,
        skipped = output.metadata.total_skipped,
        elapsed_secs = output.metadata.compute_time_seconds,
        path = %args.output.display(),
        "ratings run complete"
    );
    Ok(())
}

fn pace_ms_from_env() -> u64 {
    std::env::var("MARKET_DATA_PACE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(150)
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
