use crate::config::Settings;
use crate::ingest::types::BatchHistoryResponse;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/daily_history";
const DEFAULT_RETRIES: u32 = 3;

/// One year of daily bars, requested in one call per batch of symbols.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_daily_history(&self, symbols: &[String]) -> Result<BatchHistoryResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonMarketData {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonMarketData {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_market_data_base_url()?.to_string();
        let api_key = settings.market_data_api_key.clone();

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let path = std::env::var("MARKET_DATA_HISTORY_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, symbols: &[String]) -> Result<BatchHistoryResponse> {
        let url = self.url();
        let headers = self.headers()?;

        let res = self
            .http
            .get(url)
            .headers(headers)
            .query(&[
                ("symbols", symbols.join(",")),
                ("range", "1y".to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        let parsed = BatchHistoryResponse::from_json_str(&text)?;
        for symbol in &parsed.malformed {
            tracing::warn!(ticker = %symbol, "undecodable daily series; skipping ticker");
        }
        validate(&parsed)?;
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for HttpJsonMarketData {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_daily_history(&self, symbols: &[String]) -> Result<BatchHistoryResponse> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(symbols).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= self.retries || !is_retryable(&err) {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(req_err) = err.downcast_ref::<reqwest::Error>() {
        if req_err.is_timeout() || req_err.is_connect() {
            return true;
        }
        if let Some(status) = req_err.status() {
            return status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        }
        return true;
    }

    // HTTP failures surface as formatted messages after the body was read.
    let msg = err.to_string();
    msg.contains("HTTP 429") || msg.contains("HTTP 5")
}

fn validate(resp: &BatchHistoryResponse) -> Result<()> {
    for symbol in resp.bars.keys().chain(resp.malformed.iter()) {
        anyhow::ensure!(
            !symbol.trim().is_empty(),
            "market data response contains an empty symbol key"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_rejects_empty_symbol_keys() {
        let v = json!({"bars": {"": []}});
        let parsed = BatchHistoryResponse::from_json_str(&v.to_string()).unwrap();
        assert!(validate(&parsed).is_err());
    }

    #[test]
    fn missing_symbols_are_simply_absent() {
        let v = json!({"bars": {"AAPL": [{"date": "2025-06-02", "close": 1.5, "volume": 10.0}]}});
        let parsed = BatchHistoryResponse::from_json_str(&v.to_string()).unwrap();
        assert!(parsed.bars.contains_key("AAPL"));
        assert!(!parsed.bars.contains_key("MSFT"));
    }

    #[test]
    fn retryable_classification_uses_status_text() {
        assert!(is_retryable(&anyhow::anyhow!(
            "market data HTTP 429 Too Many Requests: slow down"
        )));
        assert!(is_retryable(&anyhow::anyhow!(
            "market data HTTP 503 Service Unavailable: upstream"
        )));
        assert!(!is_retryable(&anyhow::anyhow!(
            "market data HTTP 404 Not Found: no such route"
        )));
    }
}
