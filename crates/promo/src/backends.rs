//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 Source backends pour rows in, Store backends keep the promotions.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency. Need rows from a file on disk? From an
//! upload body somebody is still streaming at us? From a `Vec` a test made up?
//! Need a store that lives in Redis, or one that lives in RAM and tattles to the
//! test suite about every call it received? We've got a backend for that.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead};

use crate::app_config::{SourceConfig, StoreConfig};
use crate::common::{Promotion, RawRow, row_from_line};

pub(crate) mod file;
pub(crate) mod in_mem;
pub(crate) mod redis_store;
pub(crate) mod stream;

// 🎯 Re-export backend types so callers can do `backends::FileSource`
// instead of spelunking into `backends::file::file_source::FileSource`.
pub use file::{FileSource, FileSourceConfig};
pub use in_mem::{InMemorySource, InMemorySourceConfig, InMemoryStore};
pub use redis_store::{RedisStore, RedisStoreConfig};
pub use stream::StreamSource;

// ===== Source Trait and Backend Enum =====

/// 🚰 A source that produces rows, one at a time, front to back.
///
/// # Contract
/// - `next_row` returns `Ok(Some(row))` while there is input and `Ok(None)` at the end.
/// - Blank lines are skipped but still advance the line counter.
/// - `Err(...)` means the stream is broken. The load is over. There is no resume.
/// - The borrow checker demands `&mut self` because sources have state. And feelings. Mostly state.
#[async_trait]
pub trait Source: std::fmt::Debug + Send {
    async fn next_row(&mut self) -> Result<Option<RawRow>>;
}

/// 🎭 The many faces of a Source — a polymorphic casting call for row origins.
///
/// The enum dispatches via `impl Source for SourceBackend`, so the reader task never
/// needs to know (or care) whether it's reading from RAM, disk, or a socket.
#[derive(Debug)]
pub enum SourceBackend {
    File(FileSource),
    Stream(StreamSource),
    InMemory(InMemorySource),
}

impl SourceBackend {
    /// 🏗️ Open whatever the config says the default source is.
    pub async fn from_config(config: &SourceConfig) -> Result<Self> {
        match config {
            SourceConfig::File(file_config) => Ok(Self::File(
                FileSource::open(file_config.clone())
                    .await
                    .context("💀 Failed to open the configured file source")?,
            )),
            SourceConfig::InMemory(in_mem_config) => {
                Ok(Self::InMemory(InMemorySource::new(in_mem_config.rows.clone())))
            }
        }
    }

    /// 📂 A file on disk, read line by line.
    pub async fn file(path: impl AsRef<Path>) -> Result<Self> {
        let file_name = path.as_ref().to_string_lossy().into_owned();
        Ok(Self::File(FileSource::open(FileSourceConfig { file_name }).await?))
    }

    /// 🌊 Any byte stream, typically an upload body.
    pub fn stream(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Stream(StreamSource::new(reader))
    }

    /// 🧠 Lines that already live in memory.
    pub fn lines<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::InMemory(InMemorySource::new(rows.into_iter().map(Into::into).collect()))
    }
}

#[async_trait]
impl Source for SourceBackend {
    async fn next_row(&mut self) -> Result<Option<RawRow>> {
        match self {
            SourceBackend::File(f) => f.next_row().await,
            SourceBackend::Stream(s) => s.next_row().await,
            SourceBackend::InMemory(i) => i.next_row().await,
        }
    }
}

/// 📄 Shared line reader for the text-over-bytes sources.
///
/// Reads until it finds a non-blank line or hits EOF. Returns the row plus the
/// number of bytes consumed for it (blank lines included), for progress reporting.
///
/// Bytes that aren't UTF-8 become `U+FFFD` instead of an error. One mangled byte is
/// the decoder's problem for that one row, not a reason to drop forty million others.
pub(crate) async fn read_next_row<R>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    line_number: &mut u64,
) -> Result<Option<(RawRow, u64)>>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut consumed = 0u64;
    loop {
        line_buf.clear();
        let bytes_read = reader
            .read_until(b'\n', line_buf)
            .await
            .with_context(|| format!("💀 Read failed after line {line_number}"))?;
        if bytes_read == 0 {
            return Ok(None);
        }
        consumed += bytes_read as u64;
        *line_number += 1;
        let text = String::from_utf8_lossy(line_buf);
        if let Some(row) = row_from_line(*line_number, &text) {
            return Ok(Some((row, consumed)));
        }
    }
}

// ===== Store Trait and Backend Enum =====

/// 🗄️ The key-value store the promotions end up in.
///
/// # Contract
/// - `clear_all` wipes every key. Every. Single. One.
/// - `put_many` writes the whole map as one call. Backends apply it atomically.
/// - `get` returns `Ok(None)` for a missing id. That is not an error, it's just a miss.
/// - All methods take `&self`: stores are shared by the flusher, the lookup path,
///   and whatever test is peeking at them.
#[async_trait]
pub trait Store: std::fmt::Debug + Send + Sync {
    async fn clear_all(&self) -> Result<()>;
    async fn put_many(&self, entries: &HashMap<String, Promotion>) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Promotion>>;
}

/// 🎭 The many faces of a Store. Mirrors `SourceBackend` on the other end of the pipeline.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    InMemory(InMemoryStore),
    Redis(RedisStore),
}

impl StoreBackend {
    /// 🔌 Connect to whatever the config points at.
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        match config {
            StoreConfig::InMemory => Ok(Self::InMemory(InMemoryStore::new())),
            StoreConfig::Redis(redis_config) => Ok(Self::Redis(
                RedisStore::connect(redis_config.clone())
                    .await
                    .context("💀 Failed to connect to the configured Redis store")?,
            )),
        }
    }
}

#[async_trait]
impl Store for StoreBackend {
    async fn clear_all(&self) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.clear_all().await,
            StoreBackend::Redis(store) => store.clear_all().await,
        }
    }

    async fn put_many(&self, entries: &HashMap<String, Promotion>) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.put_many(entries).await,
            StoreBackend::Redis(store) => store.put_many(entries).await,
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Promotion>> {
        match self {
            StoreBackend::InMemory(store) => store.get(id).await,
            StoreBackend::Redis(store) => store.get(id).await,
        }
    }
}
