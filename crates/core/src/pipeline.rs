use crate::domain::score::{score_series, ScoreOutcome};
use crate::ingest::provider::MarketDataProvider;
use crate::storage::checkpoint::{CheckpointState, CheckpointStore};
use anyhow::Result;
use std::time::Duration;

/// Immutable knobs for one pipeline run, passed in explicitly rather than
/// read from ambient globals.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tickers per data-provider request.
    pub batch_size: usize,

    /// Persist the checkpoint after every Nth batch.
    pub checkpoint_every: usize,

    /// Fixed delay between batches, honoring the provider's rate limits.
    pub pace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            checkpoint_every: 5,
            pace: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BatchStats {
    scored: usize,
    filtered: usize,
    insufficient: usize,
    malformed: usize,
    unavailable: usize,
}

/// Drive the batch pipeline over every universe ticker not already in
/// `state.processed`, in sorted order, and return the accumulated state.
///
/// The state is the single mutable accumulator and this loop is its only
/// writer. A batch-level fetch failure contributes zero scores but still
/// marks the whole batch processed; those tickers are not retried within
/// this run. Checkpoint saves are best-effort: a failed save is logged and
/// the run continues.
pub async fn run_pipeline(
    universe: &[String],
    provider: &dyn MarketDataProvider,
    store: &CheckpointStore,
    config: &PipelineConfig,
    mut state: CheckpointState,
) -> Result<CheckpointState> {
    anyhow::ensure!(config.batch_size >= 1, "batch_size must be >= 1");
    anyhow::ensure!(
        config.checkpoint_every >= 1,
        "checkpoint_every must be >= 1"
    );

    let remaining: Vec<String> = universe
        .iter()
        .filter(|t| !state.processed.contains(*t))
        .cloned()
        .collect();
    let total_batches = remaining.len().div_ceil(config.batch_size);

    tracing::info!(
        universe = universe.len(),
        remaining = remaining.len(),
        total_batches,
        provider = provider.provider_name(),
        "starting rating pipeline"
    );

    for (idx, batch) in remaining.chunks(config.batch_size).enumerate() {
        let batch_num = idx + 1;
        let mut stats = BatchStats::default();

        match provider.fetch_daily_history(batch).await {
            Ok(mut resp) => {
                for symbol in batch {
                    match resp.bars.remove(symbol) {
                        Some(mut bars) => {
                            bars.sort_by_key(|b| b.date);
                            match score_series(&bars) {
                                ScoreOutcome::Scored(score) => {
                                    state.scores.insert(symbol.clone(), score);
                                    stats.scored += 1;
                                }
                                ScoreOutcome::Filtered => stats.filtered += 1,
                                ScoreOutcome::InsufficientHistory => stats.insufficient += 1,
                            }
                        }
                        None if resp.malformed.contains(symbol) => stats.malformed += 1,
                        None => stats.unavailable += 1,
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    batch = batch_num,
                    total_batches,
                    tickers = batch.len(),
                    error = %err,
                    "batch fetch failed; marking batch processed without scores"
                );
            }
        }

        // Scored or not, every batch ticker counts as processed this run.
        for symbol in batch {
            state.processed.insert(symbol.clone());
        }

        tracing::info!(
            batch = batch_num,
            total_batches,
            scored = stats.scored,
            filtered = stats.filtered,
            insufficient = stats.insufficient,
            malformed = stats.malformed,
            unavailable = stats.unavailable,
            total_scored = state.scores.len(),
            total_processed = state.processed.len(),
            "batch complete"
        );

        if batch_num % config.checkpoint_every == 0 {
            if let Err(err) = store.save(&state).await {
                tracing::warn!(batch = batch_num, error = %err, "checkpoint save failed; continuing");
            }
        }

        if batch_num < total_batches {
            tokio::time::sleep(config.pace).await;
        }
    }

    Ok(state)
}
