use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Cached screener document: sectors keyed by name, each holding groups of
/// stock entries. Only `symbol` matters here; everything else is ignored.
#[derive(Debug, Deserialize)]
struct UniverseDocument {
    #[serde(default)]
    data: BTreeMap<String, SectorEntry>,
}

#[derive(Debug, Deserialize)]
struct SectorEntry {
    #[serde(default)]
    stocks: BTreeMap<String, Vec<StockEntry>>,
}

#[derive(Debug, Deserialize)]
struct StockEntry {
    #[serde(default)]
    symbol: String,
}

/// Load the ticker universe from the cached screener document.
///
/// Returns the sorted, deduplicated, uppercased symbols. Symbols containing
/// a `.` (foreign and share-class listings) are excluded, as are entries
/// without a usable symbol. A missing or unreadable file is the run's only
/// fatal error.
pub fn load_universe(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read universe file {}", path.display()))?;
    let doc: UniverseDocument = serde_json::from_str(&text)
        .with_context(|| format!("universe file {} is not valid JSON", path.display()))?;
    Ok(extract_symbols(&doc))
}

fn extract_symbols(doc: &UniverseDocument) -> Vec<String> {
    let mut out = BTreeSet::new();
    for sector in doc.data.values() {
        for group in sector.stocks.values() {
            for stock in group {
                let symbol = stock.symbol.trim().to_ascii_uppercase();
                if symbol.is_empty() || symbol.contains('.') {
                    continue;
                }
                out.insert(symbol);
            }
        }
    }
    out.into_iter().collect()
}
