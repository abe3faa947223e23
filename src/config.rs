//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EMLDAG_CONFIG` (environment variable)
//! 2. `~/.config/emldag/config.toml` (Linux/macOS)
//!    `%APPDATA%\emldag\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::convert::{Encoding, DEFAULT_MAX_CHUNK_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Content store location.
    pub store: StoreConfig,
    /// Chunked encoding settings.
    pub chunking: ChunkingConfig,
    /// Defaults for the `convert` command.
    pub convert: ConvertConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Content store location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root of the filesystem store. Defaults to `<data dir>/emldag/store`.
    pub root: Option<PathBuf>,
}

/// Chunked encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in bytes (default: 1073740800 = 1 GiB - 1 KiB).
    ///
    /// Keep this at or below the backing store's per-node size limit.
    pub max_chunk_size: usize,
}

/// Defaults for the `convert` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// "whole" or "chunked".
    pub encoding: Encoding,
    /// File receiving `name → hash` results.
    pub results_file: PathBuf,
    /// Write bare hashes only (one per line), suitable for `size --input-file`.
    pub only_hash: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Whole,
            results_file: PathBuf::from("converted_results.txt"),
            only_hash: false,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location, returning the path written.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EMLDAG_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("emldag").join("config.toml"))
}

/// Return the cache directory for logs (`emldag.log` is written there).
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emldag")
}

/// Return the root directory of the filesystem store.
pub fn store_root(config: &Config) -> PathBuf {
    if let Some(ref root) = config.store.root {
        return root.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emldag")
        .join("store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.chunking.max_chunk_size, 1_073_740_800);
        assert_eq!(cfg.convert.encoding, Encoding::Whole);
        assert!(!cfg.convert.only_hash);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.chunking.max_chunk_size, cfg.chunking.max_chunk_size);
        assert_eq!(parsed.convert.encoding, cfg.convert.encoding);
        assert_eq!(parsed.convert.results_file, cfg.convert.results_file);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[chunking]
max_chunk_size = 4096

[convert]
encoding = "chunked"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.chunking.max_chunk_size, 4096);
        assert_eq!(cfg.convert.encoding, Encoding::Chunked);
        // Other fields use defaults
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.store.root.is_none());
    }

    #[test]
    fn test_explicit_store_root() {
        let cfg: Config = toml::from_str("[store]\nroot = \"/srv/emldag\"\n").expect("parse");
        assert_eq!(store_root(&cfg), PathBuf::from("/srv/emldag"));
    }
}
