//! Loading the instrument universe

use crate::config::ScreenerConfig;
use crate::error::ConfigError;
use crate::models::market::Symbol;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UniverseEntry {
    Plain(String),
    Listed {
        symbol: String,
        #[serde(default)]
        exchange: Option<String>,
    },
}

/// Parse a JSON array of `"TICKER"`, `"EXCHANGE:TICKER"` or
/// `{ "symbol": .., "exchange": .. }` entries
pub fn parse_universe_json(raw: &str, default_exchange: &str) -> Result<Vec<Symbol>, String> {
    let entries: Vec<UniverseEntry> = serde_json::from_str(raw).map_err(|e| e.to_string())?;

    let mut symbols = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let parsed = match entry {
            UniverseEntry::Plain(raw) => Symbol::parse(&raw, default_exchange),
            UniverseEntry::Listed { symbol, exchange } => {
                let exchange = exchange
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| default_exchange.to_string());
                Symbol::parse(&symbol, &exchange)
            }
        };
        match parsed {
            Some(symbol) => symbols.push(symbol),
            None => warn!(index = index, "Skipping empty universe entry at index {}", index),
        }
    }
    Ok(dedup(symbols))
}

/// Parse a comma-separated symbol list
pub fn parse_symbol_list(raw: &str, default_exchange: &str) -> Vec<Symbol> {
    dedup(
        raw.split(',')
            .filter_map(|s| Symbol::parse(s, default_exchange))
            .collect(),
    )
}

/// Read a universe file from disk
pub fn load_universe_file(path: &Path, default_exchange: &str) -> Result<Vec<Symbol>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::UniverseRead {
        path: path.display().to_string(),
        source,
    })?;
    parse_universe_json(&raw, default_exchange).map_err(|reason| ConfigError::UniverseParse {
        path: path.display().to_string(),
        reason,
    })
}

/// Resolve the universe from the configured sources
///
/// `UNIVERSE_FILE` and `SYMBOLS` are combined. An empty result is fatal.
pub fn load_universe(config: &ScreenerConfig) -> Result<Vec<Symbol>, ConfigError> {
    let mut symbols = Vec::new();

    if let Some(path) = &config.universe_file {
        let from_file = load_universe_file(path, &config.default_exchange)?;
        info!(count = from_file.len(), path = %path.display(), "Stock symbols loaded from {}", path.display());
        symbols.extend(from_file);
    }

    if let Some(list) = &config.symbols {
        let from_env = parse_symbol_list(list, &config.default_exchange);
        info!(count = from_env.len(), "Stock symbols loaded from SYMBOLS");
        symbols.extend(from_env);
    }

    let symbols = dedup(symbols);
    if symbols.is_empty() {
        return Err(ConfigError::EmptyUniverse);
    }
    Ok(symbols)
}

fn dedup(symbols: Vec<Symbol>) -> Vec<Symbol> {
    let mut seen = HashSet::new();
    symbols.into_iter().filter(|s| seen.insert(s.clone())).collect()
}
