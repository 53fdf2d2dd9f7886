//! Application configuration
//!
//! Values are resolved in layers: built-in defaults, then the TOML file
//! (`{config_home}/fundamentals/config.toml` or an explicit path), then
//! `FUNDAMENTALS_*` environment variables. Command-line flags are applied last by
//! the dispatcher.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::metrics::calculator::DEFAULT_CURRENCY;
use crate::quotes::{
    CachedQuotes, FileQuoteSource, HttpQuoteSource, NoQuotes, QuoteLookup, SnapshotCache,
    DEFAULT_DEDUP_FIELD,
};
use crate::statements::FieldCanonicalizer;

pub const ENV_DATA_DIR: &str = "FUNDAMENTALS_DATA_DIR";
pub const ENV_QUOTE_URL: &str = "FUNDAMENTALS_QUOTE_URL";
pub const ENV_SNAPSHOT_FILE: &str = "FUNDAMENTALS_SNAPSHOT_FILE";
pub const ENV_OFFLINE: &str = "FUNDAMENTALS_OFFLINE";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Root of the per-ticker statement directories
    pub data_dir: PathBuf,
    /// Currency label attached to every output record
    pub currency: String,
    /// Keep only the newest N periods
    pub max_periods: Option<usize>,
    /// Extra label tables layered over the built-in ones
    pub mappings_file: Option<PathBuf>,
    pub quote: QuoteConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            currency: DEFAULT_CURRENCY.to_string(),
            max_periods: None,
            mappings_file: None,
            quote: QuoteConfig::default(),
        }
    }
}

/// Where market snapshots come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuoteConfig {
    /// Snapshot service root, queried as `{base_url}/snapshot/{ticker}`
    pub base_url: Option<String>,
    /// JSON file of saved snapshots; takes precedence over `base_url`
    pub snapshot_file: Option<PathBuf>,
    /// Field identifying a snapshot when cache entries are merged
    pub dedup_field: String,
    /// Never look quotes up
    pub offline: bool,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            snapshot_file: None,
            dedup_field: DEFAULT_DEDUP_FIELD.to_string(),
            offline: false,
        }
    }
}

impl AppConfig {
    /// `{config_home}/fundamentals/config.toml`, when the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dir_spec::config_home().map(|dir| dir.join("fundamentals").join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Defaults, then the config file, then the environment.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(anyhow!("Config file not found: {}", path.display()));
                }
                Self::from_file(path)?
            }
            None => match Self::default_path().filter(|path| path.is_file()) {
                Some(path) => {
                    info!("Loading configuration from {}", path.display());
                    Self::from_file(&path)?
                }
                None => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an environment lookup; empty values are ignored
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = var(ENV_QUOTE_URL) {
            self.quote.base_url = Some(url);
        }
        if let Some(file) = var(ENV_SNAPSHOT_FILE) {
            self.quote.snapshot_file = Some(PathBuf::from(file));
        }
        if let Some(offline) = var(ENV_OFFLINE) {
            self.quote.offline = !matches!(offline.trim(), "0" | "false" | "no");
        }
    }

    /// Label tables: built-in, plus the configured mapping file
    pub fn canonicalizer(&self) -> Result<FieldCanonicalizer> {
        match &self.mappings_file {
            Some(path) => FieldCanonicalizer::with_overrides(path),
            None => Ok(FieldCanonicalizer::builtin()),
        }
    }
}

impl QuoteConfig {
    /// Build the lookup described by this configuration on top of a shared cache
    pub fn build_lookup(&self, cache: Arc<Mutex<SnapshotCache>>) -> Result<Box<dyn QuoteLookup>> {
        if self.offline {
            info!("Offline mode: market quotes disabled");
            return Ok(Box::new(NoQuotes));
        }
        if let Some(file) = &self.snapshot_file {
            let source = FileQuoteSource::new(file);
            return Ok(Box::new(CachedQuotes::with_dedup_field(
                source,
                cache,
                self.dedup_field.clone(),
            )));
        }
        if let Some(url) = &self.base_url {
            let source = HttpQuoteSource::new(url.clone())?;
            return Ok(Box::new(CachedQuotes::with_dedup_field(
                source,
                cache,
                self.dedup_field.clone(),
            )));
        }
        info!("No quote source configured; market metrics will be empty");
        Ok(Box::new(NoQuotes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.currency, "CNY");
        assert_eq!(config.quote.dedup_field, "code");
        assert!(!config.quote.offline);
        assert_eq!(config.max_periods, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            data_dir = "/srv/statements"
            max_periods = 4

            [quote]
            base_url = "http://localhost:8000"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/statements"));
        assert_eq!(config.max_periods, Some(4));
        assert_eq!(config.currency, "CNY");
        assert_eq!(config.quote.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.quote.dedup_field, "code");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(AppConfig::from_toml("datadir = \"x\"").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/env/data"),
            (ENV_SNAPSHOT_FILE, "/env/snap.json"),
            (ENV_OFFLINE, "1"),
            (ENV_QUOTE_URL, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::from_toml("[quote]\nbase_url = \"http://file\"").unwrap();
        config.apply_env_from(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/env/data"));
        assert_eq!(config.quote.snapshot_file, Some(PathBuf::from("/env/snap.json")));
        assert!(config.quote.offline);
        // blank values do not override
        assert_eq!(config.quote.base_url.as_deref(), Some("http://file"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_offline_lookup_has_no_quotes() {
        let quote = QuoteConfig {
            offline: true,
            base_url: Some("http://localhost:1".to_string()),
            ..Default::default()
        };
        let lookup = quote
            .build_lookup(Arc::new(Mutex::new(SnapshotCache::default())))
            .unwrap();
        assert!(lookup.snapshot("HK.03690").is_err());
    }
}
