//! 🟥 RedisStore — the production store. One key per promotion, JSON for the value.
//!
//! `FLUSHDB ASYNC` wipes the database, `MSET` writes a whole batch in one atomic command,
//! `GET` answers lookups. The multiplexed connection is cheap to clone, so every
//! call grabs its own handle and nobody waits on a lock to talk to Redis.
//!
//! ⚠️ `FLUSHDB` means *the whole database*. Give the promotions their own db index.
//!
//! The `ASYNC` flavor unlinks the keys and frees them on a background thread, so the
//! clear returns in constant time instead of racing the store deadline on a forty
//! million key database (and getting retried into a queue of FLUSHDBs).

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde::Deserialize;
use tracing::{debug, info};

use crate::backends::Store;
use crate::common::Promotion;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RedisStoreConfig {
    /// e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
}

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    url: String,
}

// 🐛 the connection has nothing useful to say in a Debug dump. the url does.
impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish()
    }
}

impl RedisStore {
    pub async fn connect(config: RedisStoreConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .with_context(|| format!("💀 '{}' is not a Redis URL we understand", config.url))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("💀 Could not connect to Redis at '{}'", config.url))?;
        info!("🟥 connected to Redis at {}", config.url);
        Ok(Self {
            conn,
            url: config.url,
        })
    }
}

/// 🧹 `FLUSHDB ASYNC`: returns right away, Redis frees the old keys in the background.
fn flush_db_command() -> redis::Cmd {
    let mut cmd = redis::cmd("FLUSHDB");
    cmd.arg("ASYNC");
    cmd
}

/// 📦 Turn a batch into `(key, json)` pairs ready for `MSET`.
fn encode_batch(entries: &HashMap<String, Promotion>) -> Result<Vec<(&str, String)>> {
    entries
        .iter()
        .map(|(id, promo)| {
            let json = serde_json::to_string(promo)
                .with_context(|| format!("💀 Failed to encode promotion '{id}'"))?;
            Ok((id.as_str(), json))
        })
        .collect()
}

#[async_trait]
impl Store for RedisStore {
    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = flush_db_command()
            .query_async(&mut conn)
            .await
            .context("💀 FLUSHDB ASYNC failed")?;
        debug!("🧹 FLUSHDB ASYNC on {}", self.url);
        Ok(())
    }

    async fn put_many(&self, entries: &HashMap<String, Promotion>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let pairs = encode_batch(entries)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .mset(pairs.as_slice())
            .await
            .with_context(|| format!("💀 MSET of {} keys failed", pairs.len()))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Promotion>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(id)
            .await
            .with_context(|| format!("💀 GET '{id}' failed"))?;
        raw.map(|json| {
            serde_json::from_str(&json)
                .with_context(|| format!("💀 Value stored under '{id}' is not a promotion"))
        })
        .transpose()
    }
}
