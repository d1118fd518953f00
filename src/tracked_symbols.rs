// =============================================================================
// Tracked Symbols — the user's watch list, persisted as a JSON array
// =============================================================================
//
// Symbols are normalised on the way in (trimmed, uppercased, non-alphanumerics
// stripped, quote asset appended when missing) and kept in insertion order
// without duplicates. Persistence uses the same atomic tmp + rename pattern as
// the runtime config.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::types::QUOTE_ASSET;

/// Watch list used when nothing usable is persisted.
pub const DEFAULT_SYMBOLS: [&str; 3] = ["BTCUSDT", "ETHUSDT", "SOLUSDT"];

/// Normalise free-form user input into an exchange symbol.
///
/// Returns `None` when nothing alphanumeric is left.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    if cleaned.ends_with(QUOTE_ASSET) {
        Some(cleaned)
    } else {
        Some(format!("{cleaned}{QUOTE_ASSET}"))
    }
}

/// Result of adding a symbol to the watch list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "symbol", rename_all = "snake_case")]
pub enum AddOutcome {
    Added(String),
    AlreadyTracked(String),
    Invalid,
}

/// Ordered, de-duplicated set of normalised symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSymbols {
    symbols: Vec<String>,
}

impl Default for TrackedSymbols {
    fn default() -> Self {
        Self::from_raw(DEFAULT_SYMBOLS.iter().copied())
    }
}

impl TrackedSymbols {
    /// Build from raw strings, normalising and de-duplicating in order.
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symbols: Vec<String> = Vec::new();
        for s in raw {
            if let Some(sym) = normalize_symbol(s.as_ref()) {
                if !symbols.contains(&sym) {
                    symbols.push(sym);
                }
            }
        }
        Self { symbols }
    }

    /// Load the watch list from `path`.
    ///
    /// A missing file, unparsable JSON, a non-array, or a list with no valid
    /// entry all fall back to [`DEFAULT_SYMBOLS`]; only IO errors other than
    /// "not found" are reported.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no saved symbols, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read symbols from {}", path.display()))
            }
        };

        let list = match serde_json::from_str::<Vec<String>>(&content) {
            Ok(list) => {
                let list = Self::from_raw(list);
                if list.is_empty() {
                    Self::default()
                } else {
                    list
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "saved symbols unreadable, using defaults");
                Self::default()
            }
        };

        info!(path = %path.display(), symbols = ?list.symbols, "tracked symbols loaded");
        Ok(list)
    }

    /// Persist to `path` with an atomic write (write `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(&self.symbols).context("failed to serialise tracked symbols")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp symbols to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp symbols to {}", path.display()))?;

        info!(path = %path.display(), count = self.symbols.len(), "tracked symbols saved");
        Ok(())
    }

    pub fn add(&mut self, raw: &str) -> AddOutcome {
        let Some(symbol) = normalize_symbol(raw) else {
            return AddOutcome::Invalid;
        };
        if self.symbols.contains(&symbol) {
            return AddOutcome::AlreadyTracked(symbol);
        }
        self.symbols.push(symbol.clone());
        AddOutcome::Added(symbol)
    }

    /// Remove an exact (already normalised) symbol. Returns whether it was
    /// tracked.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.symbols.len();
        self.symbols.retain(|s| s != symbol);
        self.symbols.len() != before
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
