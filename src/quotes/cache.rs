//! In-memory snapshot cache
//!
//! Entries are keyed by the underscore-joined ticker list of the request, in the
//! caller's order. An entry only ever grows: a later write appends the items it
//! does not already hold, identified by a dedup field.

use itertools::Itertools;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Field holding the ticker a snapshot belongs to
pub const TICKER_FIELD: &str = "code";

/// Snapshot objects are deduplicated by their ticker code unless told otherwise
pub const DEFAULT_DEDUP_FIELD: &str = TICKER_FIELD;

/// Cache key for a request. `["A", "B"]` and `["B", "A"]` are different keys.
pub fn cache_key<S: AsRef<str>>(tickers: &[S]) -> String {
    tickers.iter().map(AsRef::as_ref).join("_")
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: HashMap<String, Vec<Value>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots stored under `key`. An empty entry is reported as absent.
    pub fn get(&self, key: &str) -> Option<&[Value]> {
        self.entries
            .get(key)
            .filter(|items| !items.is_empty())
            .map(Vec::as_slice)
    }

    /// Store snapshots under `key`.
    ///
    /// With no (or an empty) entry the snapshots are stored as given. Otherwise
    /// items whose `dedup_field` value is already present are skipped, existing
    /// items keep their place and the rest are appended in order. Items without
    /// the field cannot be compared and are dropped.
    pub fn put(&mut self, key: &str, snapshots: Vec<Value>, dedup_field: &str) {
        let has_items = self.entries.get(key).is_some_and(|items| !items.is_empty());
        if !has_items {
            debug!("Caching {} snapshots under {}", snapshots.len(), key);
            self.entries.insert(key.to_string(), snapshots);
            return;
        }
        let Some(existing) = self.entries.get_mut(key) else {
            return;
        };

        let mut seen: HashSet<String> = existing
            .iter()
            .filter_map(|item| item.get(dedup_field))
            .map(Value::to_string)
            .collect();

        let mut appended = 0;
        for item in snapshots {
            let Some(id) = item.get(dedup_field).map(Value::to_string) else {
                warn!(
                    "Dropping snapshot without '{}' field while merging into {}",
                    dedup_field, key
                );
                continue;
            };
            if seen.insert(id) {
                existing.push(item);
                appended += 1;
            }
        }
        debug!("Appended {} snapshots to {}", appended, key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(items: &[Value]) -> Vec<&str> {
        items.iter().filter_map(|i| i["code"].as_str()).collect()
    }

    #[test]
    fn test_cache_key_keeps_caller_order() {
        assert_eq!(cache_key(&["HK.03690"]), "HK.03690");
        assert_eq!(cache_key(&["A", "B"]), "A_B");
        assert_ne!(cache_key(&["A", "B"]), cache_key(&["B", "A"]));
    }

    #[test]
    fn test_first_put_stores_verbatim() {
        let mut cache = SnapshotCache::new();
        assert!(cache.get("A").is_none());
        cache.put("A", vec![json!({"code": "A", "last_price": 1.0})], DEFAULT_DEDUP_FIELD);
        assert_eq!(codes(cache.get("A").unwrap()), vec!["A"]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_entry_is_a_miss() {
        let mut cache = SnapshotCache::new();
        cache.put("A", Vec::new(), DEFAULT_DEDUP_FIELD);
        assert!(cache.get("A").is_none());

        cache.put("A", vec![json!({"code": "A"})], DEFAULT_DEDUP_FIELD);
        assert_eq!(codes(cache.get("A").unwrap()), vec!["A"]);
    }

    #[test]
    fn test_merge_appends_only_new_items() {
        let mut cache = SnapshotCache::new();
        cache.put(
            "A_B",
            vec![json!({"code": "A", "last_price": 1.0})],
            DEFAULT_DEDUP_FIELD,
        );
        cache.put(
            "A_B",
            vec![
                json!({"code": "A", "last_price": 2.0}),
                json!({"code": "B", "last_price": 3.0}),
                json!({"code": "B", "last_price": 4.0}),
            ],
            DEFAULT_DEDUP_FIELD,
        );

        let items = cache.get("A_B").unwrap();
        assert_eq!(codes(items), vec!["A", "B"]);
        // existing item is never replaced
        assert_eq!(items[0]["last_price"], 1.0);
        assert_eq!(items[1]["last_price"], 3.0);
    }

    #[test]
    fn test_merge_drops_items_without_dedup_field() {
        let mut cache = SnapshotCache::new();
        cache.put("K", vec![json!({"code": "A"})], DEFAULT_DEDUP_FIELD);
        cache.put(
            "K",
            vec![json!({"name": "anonymous"}), json!({"code": "C"})],
            DEFAULT_DEDUP_FIELD,
        );
        assert_eq!(codes(cache.get("K").unwrap()), vec!["A", "C"]);
    }

    #[test]
    fn test_custom_dedup_field() {
        let mut cache = SnapshotCache::new();
        cache.put("K", vec![json!({"code": "A", "id": 1})], "id");
        cache.put("K", vec![json!({"code": "A2", "id": 1}), json!({"code": "B", "id": 2})], "id");
        assert_eq!(codes(cache.get("K").unwrap()), vec!["A", "B"]);
    }
}
