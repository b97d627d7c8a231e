//! Adapter configuration: the root directory path, default sequence batch
//! size, and long-traversal pacing knobs. A flat options struct, the way a
//! wire server's parsed CLI `Args` usually reads, but as a
//! `serde::Deserialize` struct since this crate has no CLI surface of its
//! own and is meant to be embedded by whatever owns the actual server
//! process.

use serde::{Deserialize, Serialize};

fn default_root_directory() -> Vec<String> {
    vec!["sql".to_string()]
}

fn default_sequence_cache_size() -> i64 {
    100
}

fn default_scan_time_limit_ms() -> u64 {
    1000
}

fn default_sleep_time_ms() -> u64 {
    0
}

/// Adapter-level configuration, deserializable from whatever config format
/// the embedding service uses (TOML, JSON, env — `serde` does not care).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Path components of the root directory under which `data/`,
    /// `dataAltering/`, `indexCount/`, and `indexNull/` live.
    #[serde(default = "default_root_directory")]
    pub root_directory: Vec<String>,

    /// Default `cacheSize` for a newly created sequence with no
    /// per-sequence override.
    #[serde(default = "default_sequence_cache_size")]
    pub default_sequence_cache_size: i64,

    /// `scanTimeLimit` for [`crate::traverse::traverse`], in milliseconds.
    #[serde(default = "default_scan_time_limit_ms")]
    pub scan_time_limit_ms: u64,

    /// `sleepTime` for [`crate::traverse::traverse`], in milliseconds.
    #[serde(default = "default_sleep_time_ms")]
    pub sleep_time_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            root_directory: default_root_directory(),
            default_sequence_cache_size: default_sequence_cache_size(),
            scan_time_limit_ms: default_scan_time_limit_ms(),
            sleep_time_ms: default_sleep_time_ms(),
        }
    }
}

impl AdapterConfig {
    pub fn root_directory_path(&self) -> Vec<&str> {
        self.root_directory.iter().map(String::as_str).collect()
    }

    pub fn scan_time_limit(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scan_time_limit_ms)
    }

    pub fn sleep_time(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sleep_time_ms)
    }
}
