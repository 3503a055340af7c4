use crate::ingest::types::DailyBar;

/// Minimum number of valid trading-day rows a ticker needs before it is
/// eligible for scoring at all.
pub const MIN_HISTORY_DAYS: usize = 63;

/// Liquidity gates: last close and mean volume over the most recent
/// `VOLUME_WINDOW` valid rows.
pub const MIN_PRICE: f64 = 1.0;
pub const MIN_AVG_VOLUME: f64 = 100_000.0;
const VOLUME_WINDOW: usize = 20;

// Trading-day lookbacks for the 3/6/9/12-month horizons.
const HORIZON_3M: usize = 63;
const HORIZON_6M: usize = 126;
const HORIZON_9M: usize = 189;
const HORIZON_12M: usize = 252;

const WEIGHT_3M: f64 = 0.4;
const WEIGHT_LONG: f64 = 0.2;

/// Per-ticker scoring outcome. `Filtered` and `InsufficientHistory` both
/// leave the ticker without a score; they are kept apart so the pipeline can
/// count why tickers dropped out instead of swallowing them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreOutcome {
    Scored(f64),
    Filtered,
    InsufficientHistory,
}

/// Clean, filter and score one ticker's daily series.
///
/// Rows with a missing or non-finite close/volume are dropped first. The
/// liquidity gates (row count, last price, recent mean volume) apply to the
/// cleaned series; only tickers that pass them reach the momentum formula.
pub fn score_series(bars: &[DailyBar]) -> ScoreOutcome {
    let clean: Vec<&DailyBar> = bars.iter().filter(|b| b.is_valid()).collect();
    if clean.len() < MIN_HISTORY_DAYS {
        return ScoreOutcome::InsufficientHistory;
    }

    let last_close = clean[clean.len() - 1].close.unwrap_or(0.0);
    let window = &clean[clean.len() - VOLUME_WINDOW.min(clean.len())..];
    let recent_avg_volume =
        window.iter().filter_map(|b| b.volume).sum::<f64>() / window.len() as f64;

    if last_close < MIN_PRICE || recent_avg_volume < MIN_AVG_VOLUME {
        return ScoreOutcome::Filtered;
    }

    let closes: Vec<f64> = clean.iter().filter_map(|b| b.close).collect();
    match raw_score(&closes) {
        Some(score) => ScoreOutcome::Scored(round4(score)),
        None => ScoreOutcome::InsufficientHistory,
    }
}

/// Weighted multi-horizon momentum score over a chronological close series.
///
/// The 3-month performance is mandatory (weight 0.4); 6/9/12-month
/// performances contribute 0.2 each when the series reaches back far enough.
/// Missing long horizons shrink the denominator rather than counting as
/// zero, so scores stay in percentage-change units regardless of history
/// length.
pub fn raw_score(closes: &[f64]) -> Option<f64> {
    if closes.len() < MIN_HISTORY_DAYS {
        return None;
    }

    let current = *closes.last()?;
    if current <= 0.0 {
        return None;
    }

    let p3 = perf(closes, current, HORIZON_3M)?;

    let mut weighted_sum = WEIGHT_3M * p3;
    let mut total_weight = WEIGHT_3M;
    for horizon in [HORIZON_6M, HORIZON_9M, HORIZON_12M] {
        if let Some(p) = perf(closes, current, horizon) {
            weighted_sum += WEIGHT_LONG * p;
            total_weight += WEIGHT_LONG;
        }
    }

    Some(weighted_sum / total_weight)
}

/// Percent change from the close `days_back` entries before the last one to
/// the current close. None when the series is too short or the past close is
/// non-positive.
fn perf(closes: &[f64], current: f64, days_back: usize) -> Option<f64> {
    let idx = closes.len().checked_sub(1 + days_back)?;
    let past = closes[idx];
    if past <= 0.0 {
        return None;
    }
    Some(((current - past) / past) * 100.0)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::DailyBar;
    use chrono::{Duration, NaiveDate};

    fn bars(closes: &[f64], volume: f64) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| DailyBar {
                date: start + Duration::days(i as i64),
                close: Some(*c),
                volume: Some(volume),
            })
            .collect()
    }

    #[test]
    fn rejects_short_series() {
        assert_eq!(raw_score(&vec![10.0; 62]), None);
        assert_eq!(
            score_series(&bars(&vec![10.0; 62], 200_000.0)),
            ScoreOutcome::InsufficientHistory
        );
    }

    #[test]
    fn rejects_non_positive_current_close() {
        let mut closes = vec![10.0; 64];
        *closes.last_mut().unwrap() = 0.0;
        assert_eq!(raw_score(&closes), None);
    }

    #[test]
    fn exactly_min_history_has_no_three_month_reference() {
        // 63 rows pass the gates, but perf(63) needs a 64th row.
        assert_eq!(raw_score(&vec![10.0; 63]), None);
    }

    #[test]
    fn filters_low_price() {
        assert_eq!(
            score_series(&bars(&vec![0.5; 70], 200_000.0)),
            ScoreOutcome::Filtered
        );
    }

    #[test]
    fn filters_thin_volume() {
        assert_eq!(
            score_series(&bars(&vec![5.0; 70], 50_000.0)),
            ScoreOutcome::Filtered
        );
    }

    #[test]
    fn short_history_collapses_to_three_month_performance() {
        // 64 closes: only perf(63) is defined, so the 0.4 weight cancels.
        let mut closes = vec![105.0; 64];
        closes[0] = 100.0;
        *closes.last_mut().unwrap() = 110.0;
        let score = raw_score(&closes).unwrap();
        assert!((score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn weights_all_four_horizons() {
        let mut closes = vec![10.0; 253];
        let last = closes.len() - 1;
        closes[last] = 200.0;
        closes[last - 63] = 100.0; // +100%
        closes[last - 126] = 160.0; // +25%
        closes[last - 189] = 80.0; // +150%
        closes[last - 252] = 50.0; // +300%
        let score = raw_score(&closes).unwrap();
        let expected = 0.4 * 100.0 + 0.2 * 25.0 + 0.2 * 150.0 + 0.2 * 300.0;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn skips_invalid_rows_before_scoring() {
        let mut series = bars(&vec![105.0; 64], 200_000.0);
        series[0].close = Some(100.0);
        series.last_mut().unwrap().close = Some(110.0);
        // Interleave rows with missing fields; they must not count as history.
        series.insert(
            10,
            DailyBar {
                date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
                close: None,
                volume: Some(1.0),
            },
        );
        series.insert(
            20,
            DailyBar {
                date: NaiveDate::from_ymd_opt(2024, 12, 30).unwrap(),
                close: Some(f64::NAN),
                volume: Some(1.0),
            },
        );
        assert_eq!(score_series(&series), ScoreOutcome::Scored(10.0));
    }
}
