// =============================================================================
// Runtime Configuration — board settings with atomic save
// =============================================================================
//
// Where to listen, where to find the exchange, which timeframes make up the
// board, and how often it refreshes. The refresh period is the only field
// changed while running (through the API); everything else is read at startup.
//
// Environment overrides apply to the running process only: `save` writes
// back the file values they shadowed. Persistence uses an atomic tmp + rename
// pattern to prevent corruption on crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{default_timeframes, TimeframeSpec};

/// Accepted auto-refresh periods, in seconds.
pub const REFRESH_INTERVAL_RANGE: RangeInclusive<u64> = 5..=3600;

/// Environment variables that may replace a string setting at startup.
const ENV_OVERRIDES: [&str; 4] = [
    "SIGNAL_BOARD_BIND_ADDR",
    "SIGNAL_BOARD_SYMBOLS_PATH",
    "SIGNAL_BOARD_PUBLIC_DIR",
    "BINANCE_BASE_URL",
];

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_symbols_path() -> String {
    "tracked_symbols.json".to_string()
}

fn default_binance_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_kline_limit() -> u32 {
    300
}

fn default_refresh_interval_secs() -> u64 {
    60
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory served for every path the API does not claim.
    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    /// JSON file holding the tracked symbol list.
    #[serde(default = "default_symbols_path")]
    pub symbols_path: String,

    #[serde(default = "default_binance_base_url")]
    pub binance_base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Klines requested per timeframe.
    #[serde(default = "default_kline_limit")]
    pub kline_limit: u32,

    /// Auto-refresh period. Must lie in [`REFRESH_INTERVAL_RANGE`].
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Board columns in display order.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<TimeframeSpec>,

    /// File values replaced by environment overrides, keyed by variable.
    #[serde(skip)]
    shadowed: Vec<(&'static str, String)>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_dir: default_public_dir(),
            symbols_path: default_symbols_path(),
            binance_base_url: default_binance_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            kline_limit: default_kline_limit(),
            refresh_interval_secs: default_refresh_interval_secs(),
            timeframes: default_timeframes(),
            shadowed: Vec::new(),
        }
    }
}

/// Check a requested auto-refresh period.
pub fn validate_refresh_interval(secs: u64) -> Result<u64, String> {
    if REFRESH_INTERVAL_RANGE.contains(&secs) {
        Ok(secs)
    } else {
        Err(format!(
            "refresh interval must be between {} and {} seconds, got {}",
            REFRESH_INTERVAL_RANGE.start(),
            REFRESH_INTERVAL_RANGE.end(),
            secs
        ))
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning. An out-of-range refresh period or an
    /// empty timeframe list is replaced by its default.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;
        config.sanitize();

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            refresh_interval_secs = config.refresh_interval_secs,
            timeframes = config.timeframes.len(),
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(&self.file_values())
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in ENV_OVERRIDES {
            let Some(value) = lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
            else {
                continue;
            };
            let Some(field) = self.override_field(key) else {
                continue;
            };
            info!(key, value = %value, "config override from environment");
            let file_value = std::mem::replace(field, value);
            if !self.shadowed.iter().any(|(k, _)| *k == key) {
                self.shadowed.push((key, file_value));
            }
        }
    }

    fn override_field(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "SIGNAL_BOARD_BIND_ADDR" => Some(&mut self.bind_addr),
            "SIGNAL_BOARD_SYMBOLS_PATH" => Some(&mut self.symbols_path),
            "SIGNAL_BOARD_PUBLIC_DIR" => Some(&mut self.public_dir),
            "BINANCE_BASE_URL" => Some(&mut self.binance_base_url),
            _ => None,
        }
    }

    /// The configuration as it should be persisted: runtime changes kept,
    /// environment overrides undone.
    fn file_values(&self) -> Self {
        let mut config = self.clone();
        for (key, value) in std::mem::take(&mut config.shadowed) {
            if let Some(field) = config.override_field(key) {
                *field = value;
            }
        }
        config
    }

    fn sanitize(&mut self) {
        if validate_refresh_interval(self.refresh_interval_secs).is_err() {
            warn!(
                refresh_interval_secs = self.refresh_interval_secs,
                "refresh interval out of range, using default"
            );
            self.refresh_interval_secs = default_refresh_interval_secs();
        }
        if self.timeframes.is_empty() {
            self.timeframes = default_timeframes();
        }
        if self.kline_limit == 0 {
            self.kline_limit = default_kline_limit();
        }
    }
}
