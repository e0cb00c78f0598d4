use crate::error::{DecompileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_DECOMPILE_THREADS: usize = 64;
pub const THREADS_ENV: &str = "MAPWEAVE_DECOMPILE_THREADS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompileConfig {
    /// Worker pool size
    pub threads: usize,

    /// Decompiled sources buffered ahead of the archive writer
    pub writer_queue_capacity: usize,

    /// Passed verbatim to the backend with every class
    pub backend_options: BTreeMap<String, String>,
}

impl Default for DecompileConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            writer_queue_capacity: 64,
            backend_options: BTreeMap::from([
                ("renameillegalidents".to_string(), "true".to_string()),
                ("trackbytecodeloc".to_string(), "true".to_string()),
            ]),
        }
    }
}

impl DecompileConfig {
    /// Defaults, with the worker count taken from `MAPWEAVE_DECOMPILE_THREADS` when set
    pub fn from_env() -> Self {
        let raw = std::env::var(THREADS_ENV).ok();
        let defaults = Self::default();
        Self {
            threads: parse_thread_count(raw.as_deref(), defaults.threads),
            ..defaults
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_options.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DECOMPILE_THREADS).contains(&self.threads) {
            return Err(DecompileError::Config(format!(
                "threads ({}) must be within 1..={MAX_DECOMPILE_THREADS}",
                self.threads
            )));
        }
        if self.writer_queue_capacity == 0 {
            return Err(DecompileError::Config(
                "writer_queue_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_DECOMPILE_THREADS)
}

pub fn parse_thread_count(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_DECOMPILE_THREADS)
}
