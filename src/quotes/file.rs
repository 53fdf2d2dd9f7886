use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use super::http::decode_snapshots;
use super::{QuoteError, QuoteSource, TICKER_FIELD};

/// Snapshots saved to a JSON file, in the same shape the HTTP service returns.
///
/// Only objects whose `code` matches a requested ticker are returned.
#[derive(Debug, Clone)]
pub struct FileQuoteSource {
    path: PathBuf,
}

impl FileQuoteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuoteSource for FileQuoteSource {
    fn fetch_snapshots(&self, tickers: &[String]) -> Result<Vec<Value>, QuoteError> {
        info!("Reading market snapshots from {}", self.path.display());
        let text = fs::read_to_string(&self.path).map_err(|e| {
            QuoteError::Transport(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let body: Value =
            serde_json::from_str(&text).map_err(|e| QuoteError::Malformed(e.to_string()))?;

        Ok(decode_snapshots(body)?
            .into_iter()
            .filter(|item| {
                item.get(TICKER_FIELD)
                    .and_then(Value::as_str)
                    .is_some_and(|code| tickers.iter().any(|t| t == code))
            })
            .collect())
    }
}
