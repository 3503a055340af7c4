use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One batch of daily histories keyed by symbol. A symbol that was requested
/// but is absent from both `bars` and `malformed` had no data available at
/// the provider.
#[derive(Debug, Clone, Default)]
pub struct BatchHistoryResponse {
    pub bars: BTreeMap<String, Vec<DailyBar>>,

    /// Symbols whose series could not be decoded. Damage to one symbol's
    /// rows costs only that symbol, never the batch.
    pub malformed: BTreeSet<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBatchHistory {
    #[serde(default)]
    bars: BTreeMap<String, serde_json::Value>,
}

impl BatchHistoryResponse {
    /// Decode the wire document. The outer shape must parse; individual
    /// symbol series are decoded independently and failures land in
    /// `malformed` instead of poisoning the rest of the batch.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawBatchHistory = serde_json::from_str(text)
            .context("failed to parse market data response document")?;

        let mut out = Self::default();
        for (symbol, series) in raw.bars {
            match serde_json::from_value::<Vec<DailyBar>>(series) {
                Ok(bars) => {
                    out.bars.insert(symbol, bars);
                }
                Err(_) => {
                    out.malformed.insert(symbol);
                }
            }
        }
        Ok(out)
    }
}

/// One trading day for one symbol. Close or volume may be missing for
/// gap/halt days; such rows are dropped before filtering and scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl DailyBar {
    pub fn is_valid(&self) -> bool {
        matches!(self.close, Some(c) if c.is_finite())
            && matches!(self.volume, Some(v) if v.is_finite() && v >= 0.0)
    }
}
