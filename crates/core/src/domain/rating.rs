use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Convert the final raw-score map into 1-99 percentile ratings.
///
/// Pairs are sorted ascending by score with a lexicographic ticker
/// tie-break, so equal scores rank the same way on every run. The ticker at
/// 1-indexed rank r of N receives ceil(r / N * 99) clamped to [1, 99]:
/// the weakest scored ticker can land on 1 and the strongest always lands
/// on 99.
pub fn percentile_ratings(scores: &BTreeMap<String, f64>) -> BTreeMap<String, u8> {
    let mut pairs: Vec<(&str, f64)> = scores.iter().map(|(t, s)| (t.as_str(), *s)).collect();
    pairs.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let total = pairs.len();
    pairs
        .iter()
        .enumerate()
        .map(|(idx, (ticker, _))| {
            let rank = idx + 1;
            let pct = ((rank as f64 / total as f64) * 99.0).ceil() as i64;
            (ticker.to_string(), pct.clamp(1, 99) as u8)
        })
        .collect()
}
