use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{QuoteError, QuoteSource};
use crate::error::Result;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; FundamentalsBot/1.0)";

/// Snapshot service reached over HTTP: `GET {base_url}/snapshot/{ticker}`.
///
/// Requests are blocking and carry no timeout or retry policy of their own.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    base_url: String,
    client: Client,
}

impl HttpQuoteSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // no request timeout, the blocking client would otherwise apply 30s
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(None::<Duration>)
            .build()
            .context("Failed to build HTTP client for quote service")?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn snapshot_url(&self, ticker: &str) -> String {
        format!("{}/snapshot/{}", self.base_url.trim_end_matches('/'), ticker)
    }

    fn fetch_one(&self, ticker: &str) -> std::result::Result<Vec<Value>, QuoteError> {
        let url = self.snapshot_url(ticker);
        info!("Fetching market snapshot for {} from {}", ticker, url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(QuoteError::NotFound {
                ticker: ticker.to_string(),
            });
        }
        if !status.is_success() {
            return Err(QuoteError::Transport(format!(
                "quote service returned error status: {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| QuoteError::Malformed(e.to_string()))?;
        decode_snapshots(body)
    }
}

impl QuoteSource for HttpQuoteSource {
    fn fetch_snapshots(&self, tickers: &[String]) -> std::result::Result<Vec<Value>, QuoteError> {
        let mut snapshots = Vec::new();
        for ticker in tickers {
            snapshots.extend(self.fetch_one(ticker)?);
        }
        debug!("Received {} snapshots", snapshots.len());
        Ok(snapshots)
    }
}

/// Accept either a bare array of snapshot objects or `{"data": [...]}`
pub fn decode_snapshots(body: Value) -> std::result::Result<Vec<Value>, QuoteError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(QuoteError::Malformed(
                    "expected a 'data' array of snapshots".to_string(),
                ))
            }
        },
        other => {
            return Err(QuoteError::Malformed(format!(
                "expected an array of snapshots, got {}",
                other
            )))
        }
    };

    if let Some(bad) = items.iter().find(|item| !item.is_object()) {
        return Err(QuoteError::Malformed(format!(
            "snapshot is not an object: {}",
            bad
        )));
    }
    Ok(items)
}
