//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{FileSourceConfig, InMemorySourceConfig, RedisStoreConfig};
use crate::retry::StorePolicy;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where rows come from when a reload doesn't bring its own.
    pub source_config: SourceConfig,
    /// 🗄️ Where promotions end up.
    pub store_config: StoreConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🚰 The default source for reloads that don't hand us one.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    #[serde(alias = "file")]
    File(FileSourceConfig),
    #[serde(alias = "in_memory")]
    InMemory(InMemorySourceConfig),
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    #[serde(alias = "in_memory")]
    InMemory,
    #[serde(alias = "redis")]
    Redis(RedisStoreConfig),
}

/// 🧺 How decoded promotions are gathered into batches.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccumulationStrategy {
    /// One map, one mutex.
    #[default]
    LockedMap,
    /// Queue plus counter, claim on exact multiples of the batch size.
    LockFree,
    /// One worker, locked map. The "just make it work" setting.
    Serial,
}

impl AccumulationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LockedMap => "locked_map",
            Self::LockFree => "lock_free",
            Self::Serial => "serial",
        }
    }
}

impl std::fmt::Display for AccumulationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 🚦 What a malformed row does to the rest of the load.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Log it, count it, keep going.
    #[default]
    Skip,
    /// First bad row ends the load.
    FailFast,
}

/// ⚙️ The knobs. All of them have defaults, so `[runtime]` can be left out entirely.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    #[serde(alias = "read_batch_size")]
    pub batch_size: usize,
    #[serde(alias = "parallelism")]
    pub worker_count: usize,
    /// Rows allowed to sit between the reader and the decode workers.
    pub queue_capacity: usize,
    pub strategy: AccumulationStrategy,
    pub decode_policy: DecodePolicy,
    pub flush_max_retries: u32,
    pub flush_backoff_ms: u64,
    pub store_timeout_ms: u64,
    pub reload_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: 50_000,
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_capacity: 1024,
            strategy: AccumulationStrategy::default(),
            decode_policy: DecodePolicy::default(),
            flush_max_retries: 3,
            flush_backoff_ms: 100,
            store_timeout_ms: 5_000,
            reload_interval_secs: 30 * 60,
        }
    }
}

impl RuntimeConfig {
    /// 🔍 Zero of anything countable is a config typo, not a request.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.batch_size >= 1, "💀 runtime.batch_size must be at least 1");
        ensure!(self.worker_count >= 1, "💀 runtime.worker_count must be at least 1");
        ensure!(self.queue_capacity >= 1, "💀 runtime.queue_capacity must be at least 1");
        ensure!(self.store_timeout_ms >= 1, "💀 runtime.store_timeout_ms must be at least 1");
        ensure!(
            self.reload_interval_secs >= 1,
            "💀 runtime.reload_interval_secs must be at least 1"
        );
        Ok(())
    }

    /// 🧵 Serial means one worker, whatever `worker_count` says.
    pub fn effective_worker_count(&self) -> usize {
        match self.strategy {
            AccumulationStrategy::Serial => 1,
            _ => self.worker_count.max(1),
        }
    }

    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            timeout: Duration::from_millis(self.store_timeout_ms),
            max_retries: self.flush_max_retries,
            backoff: Duration::from_millis(self.flush_backoff_ms),
        }
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs)
    }
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (`PROMO_*`, nested keys split on `__`) with an
/// optional TOML file. TOML wins on conflicts.
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - `config_file_name` is None  → env vars only. No file. No assumptions.
///   - `config_file_name` is Some  → env vars + TOML file, merged.
///
/// 💀 Returns an error if config is unparseable or a runtime count is zero.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ env vars are the base layer. PROMO_RUNTIME__BATCH_SIZE → runtime.batch_size
    let config = Figment::new().merge(Env::prefixed("PROMO_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (PROMO_*). \
             The file exists in our hearts, but apparently not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (PROMO_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config.runtime.validate()?;
    Ok(app_config)
}
