use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// The sole durable artifact of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub ratings: BTreeMap<String, u8>,
    pub metadata: RunMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub computed_at: DateTime<Utc>,
    pub total_stocks_scored: usize,
    pub total_tickers_in_universe: usize,
    pub total_skipped: usize,
    pub compute_time_seconds: f64,
}

pub fn build_run_output(
    ratings: BTreeMap<String, u8>,
    universe_total: usize,
    elapsed: Duration,
) -> RunOutput {
    let total_stocks_scored = ratings.len();
    RunOutput {
        metadata: RunMetadata {
            computed_at: Utc::now(),
            total_stocks_scored,
            total_tickers_in_universe: universe_total,
            total_skipped: universe_total.saturating_sub(total_stocks_scored),
            compute_time_seconds: (elapsed.as_secs_f64() * 10.0).round() / 10.0,
        },
        ratings,
    }
}

pub async fn write_output(path: &Path, output: &RunOutput) -> Result<()> {
    super::write_json_atomic(path, output).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ratings() -> BTreeMap<String, u8> {
        [("AAPL", 99u8), ("MSFT", 50u8)]
            .into_iter()
            .map(|(t, r)| (t.to_string(), r))
            .collect()
    }

    #[test]
    fn counts_and_elapsed_rounding() {
        let out = build_run_output(sample_ratings(), 5, Duration::from_millis(12_345));
        assert_eq!(out.metadata.total_stocks_scored, 2);
        assert_eq!(out.metadata.total_tickers_in_universe, 5);
        assert_eq!(out.metadata.total_skipped, 3);
        assert_eq!(out.metadata.compute_time_seconds, 12.3);
    }

    #[test]
    fn serializes_with_camel_case_metadata_keys() {
        let out = build_run_output(sample_ratings(), 2, Duration::from_secs(1));
        let v = serde_json::to_value(&out).unwrap();
        let meta = v.get("metadata").unwrap();
        for key in [
            "computedAt",
            "totalStocksScored",
            "totalTickersInUniverse",
            "totalSkipped",
            "computeTimeSeconds",
        ] {
            assert!(meta.get(key).is_some(), "missing metadata key {key}");
        }
        assert_eq!(v["ratings"]["AAPL"], 99);
    }

    #[tokio::test]
    async fn writes_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market_rs_ratings.json");
        let out = build_run_output(sample_ratings(), 3, Duration::from_secs(2));

        write_output(&path, &out).await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let loaded: RunOutput = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.ratings, out.ratings);
        assert_eq!(loaded.metadata.total_skipped, 1);
    }
}
