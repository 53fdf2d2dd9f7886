//! Market snapshot quotes
//!
//! A [`QuoteSource`] returns raw snapshot objects for a list of tickers, exactly
//! as the upstream service sent them. [`CachedQuotes`] puts a [`SnapshotCache`] in
//! front of a source and answers single-ticker lookups ([`QuoteLookup`]) with a
//! typed [`MarketSnapshot`].

pub mod cache;
pub mod file;
pub mod http;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

pub use cache::{cache_key, SnapshotCache, DEFAULT_DEDUP_FIELD, TICKER_FIELD};
pub use file::FileQuoteSource;
pub use http::HttpQuoteSource;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Transport(String),

    #[error("no snapshot for {ticker}")]
    NotFound { ticker: String },

    #[error("malformed snapshot data: {0}")]
    Malformed(String),

    #[error("quotes disabled (offline mode)")]
    Offline,
}

/// Point-in-time market data for one ticker. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub code: Option<String>,
    pub name: Option<String>,
    pub update_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub open_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub high_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub low_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub prev_close_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub outstanding_shares: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub issued_shares: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_market_val: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub pe_ratio: Option<f64>,
}

/// Numbers may arrive as JSON numbers or numeric strings; anything else is absent
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|n| n.is_finite()))
}

/// Snapshot values the metric formulas read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketField {
    LastPrice,
    OpenPrice,
    HighPrice,
    LowPrice,
    PrevClosePrice,
    /// Outstanding shares, falling back to issued shares
    SharesOutstanding,
    MarketValue,
    PeRatio,
}

impl MarketSnapshot {
    pub fn value(&self, field: MarketField) -> Option<f64> {
        match field {
            MarketField::LastPrice => self.last_price,
            MarketField::OpenPrice => self.open_price,
            MarketField::HighPrice => self.high_price,
            MarketField::LowPrice => self.low_price,
            MarketField::PrevClosePrice => self.prev_close_price,
            MarketField::SharesOutstanding => self.outstanding_shares.or(self.issued_shares),
            MarketField::MarketValue => self.total_market_val,
            MarketField::PeRatio => self.pe_ratio,
        }
    }
}

/// Upstream provider of raw snapshot objects
pub trait QuoteSource {
    fn fetch_snapshots(&self, tickers: &[String]) -> Result<Vec<Value>, QuoteError>;
}

/// Single-ticker quote lookup used by the metrics calculator
pub trait QuoteLookup {
    fn snapshot(&self, ticker: &str) -> Result<MarketSnapshot, QuoteError>;
}

/// Lookup that never has a quote
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQuotes;

impl QuoteLookup for NoQuotes {
    fn snapshot(&self, _ticker: &str) -> Result<MarketSnapshot, QuoteError> {
        Err(QuoteError::Offline)
    }
}

/// Cache-backed lookup over any [`QuoteSource`].
///
/// The cache is shared: several `CachedQuotes` may hold the same
/// `Arc<Mutex<SnapshotCache>>`. The lock is held across each get/fetch/put.
pub struct CachedQuotes<S: QuoteSource> {
    source: S,
    cache: Arc<Mutex<SnapshotCache>>,
    dedup_field: String,
}

impl<S: QuoteSource> CachedQuotes<S> {
    pub fn new(source: S, cache: Arc<Mutex<SnapshotCache>>) -> Self {
        Self::with_dedup_field(source, cache, DEFAULT_DEDUP_FIELD)
    }

    pub fn with_dedup_field(
        source: S,
        cache: Arc<Mutex<SnapshotCache>>,
        dedup_field: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cache,
            dedup_field: dedup_field.into(),
        }
    }

    fn cached_or_fetched(&self, ticker: &str) -> Result<Vec<Value>, QuoteError> {
        let key = cache_key(&[ticker]);
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| QuoteError::Transport("snapshot cache lock poisoned".to_string()))?;

        if let Some(items) = cache.get(&key) {
            debug!("Snapshot cache hit for {}", key);
            return Ok(items.to_vec());
        }

        debug!("Snapshot cache miss for {}", key);
        let fetched = self.source.fetch_snapshots(&[ticker.to_string()])?;
        cache.put(&key, fetched, &self.dedup_field);
        Ok(cache.get(&key).map(<[Value]>::to_vec).unwrap_or_default())
    }
}

impl<S: QuoteSource> QuoteLookup for CachedQuotes<S> {
    fn snapshot(&self, ticker: &str) -> Result<MarketSnapshot, QuoteError> {
        let items = self.cached_or_fetched(ticker)?;
        let item = items
            .into_iter()
            .find(|item| item.get(TICKER_FIELD).and_then(Value::as_str) == Some(ticker))
            .ok_or_else(|| QuoteError::NotFound {
                ticker: ticker.to_string(),
            })?;
        serde_json::from_value(item).map_err(|e| QuoteError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    /// Source that counts how often it was asked
    struct CountingSource {
        calls: Cell<usize>,
        items: Vec<Value>,
    }

    impl QuoteSource for CountingSource {
        fn fetch_snapshots(&self, _tickers: &[String]) -> Result<Vec<Value>, QuoteError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.items.clone())
        }
    }

    /// Source that answers each call with the next scripted response
    struct ScriptedSource {
        calls: Cell<usize>,
        responses: Vec<Vec<Value>>,
    }

    impl QuoteSource for ScriptedSource {
        fn fetch_snapshots(&self, _tickers: &[String]) -> Result<Vec<Value>, QuoteError> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            Ok(self.responses.get(call).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_snapshot_accepts_numeric_strings_and_missing_fields() {
        let snapshot: MarketSnapshot = serde_json::from_value(json!({
            "code": "HK.03690",
            "last_price": "123.4",
            "pe_ratio": "N/A",
            "issued_shares": 6000000000u64,
        }))
        .unwrap();
        assert_eq!(snapshot.last_price, Some(123.4));
        assert_eq!(snapshot.pe_ratio, None);
        assert_eq!(snapshot.total_market_val, None);
        assert_eq!(snapshot.value(MarketField::SharesOutstanding), Some(6e9));
    }

    #[test]
    fn test_cached_quotes_fetches_once() {
        let source = CountingSource {
            calls: Cell::new(0),
            items: vec![json!({"code": "HK.03690", "last_price": 100.0})],
        };
        let cache = Arc::new(Mutex::new(SnapshotCache::default()));
        let quotes = CachedQuotes::new(source, Arc::clone(&cache));

        let first = quotes.snapshot("HK.03690").unwrap();
        let second = quotes.snapshot("HK.03690").unwrap();
        assert_eq!(first.last_price, Some(100.0));
        assert_eq!(first, second);
        assert_eq!(quotes.source.calls.get(), 1);
        assert!(cache.lock().unwrap().get("HK.03690").is_some());
    }

    #[test]
    fn test_cached_quotes_reports_missing_ticker() {
        let source = CountingSource {
            calls: Cell::new(0),
            items: vec![json!({"code": "HK.00700", "last_price": 300.0})],
        };
        let quotes = CachedQuotes::new(source, Arc::new(Mutex::new(SnapshotCache::default())));
        assert_eq!(
            quotes.snapshot("HK.03690"),
            Err(QuoteError::NotFound {
                ticker: "HK.03690".to_string()
            })
        );
    }

    #[test]
    fn test_custom_dedup_field_still_selects_by_code() {
        let source = CountingSource {
            calls: Cell::new(0),
            items: vec![
                json!({"code": "HK.00700", "stock_id": 700, "last_price": 300.0}),
                json!({"code": "HK.03690", "stock_id": 12345, "last_price": 100.0}),
            ],
        };
        let cache = Arc::new(Mutex::new(SnapshotCache::default()));
        let quotes = CachedQuotes::with_dedup_field(source, Arc::clone(&cache), "stock_id");

        let snapshot = quotes.snapshot("HK.03690").unwrap();
        assert_eq!(snapshot.last_price, Some(100.0));
        assert_eq!(cache.lock().unwrap().get("HK.03690").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_fetch_is_retried() {
        let source = ScriptedSource {
            calls: Cell::new(0),
            responses: vec![
                Vec::new(),
                vec![json!({"code": "HK.03690", "last_price": 100.0})],
            ],
        };
        let quotes = CachedQuotes::new(source, Arc::new(Mutex::new(SnapshotCache::default())));

        assert_eq!(
            quotes.snapshot("HK.03690"),
            Err(QuoteError::NotFound {
                ticker: "HK.03690".to_string()
            })
        );
        let snapshot = quotes.snapshot("HK.03690").unwrap();
        assert_eq!(snapshot.last_price, Some(100.0));
        assert_eq!(quotes.source.calls.get(), 2);
    }

    #[test]
    fn test_no_quotes_is_offline() {
        assert_eq!(NoQuotes.snapshot("HK.03690"), Err(QuoteError::Offline));
    }
}
