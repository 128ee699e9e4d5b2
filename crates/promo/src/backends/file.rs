use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{fs::File, io::BufReader};
use tracing::{debug, trace};

use crate::backends::{Source, read_next_row};
use crate::common::RawRow;
use crate::progress::ProgressMetrics;

// -- 📂 FileSourceConfig lives next to the FileSource that uses it.
// KNOWLEDGE GRAPH: `app_config::SourceConfig::File` wraps this. `SourceBackend::file` builds one on the fly.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FileSourceConfig {
    pub file_name: String,
}

/// 📂 FileSource — reads a promotions file line by line, one row per call.
///
/// Think of it like a very diligent intern who reads a forty million line CSV out
/// loud, never complains, and only stops when the file ends.
///
/// 🧵 tokio `File` under a `BufReader`, so the reader task yields while the disk thinks.
/// 📊 Tracks progress via `ProgressMetrics`, bytes and rows.
/// ⚠️  A file still being uploaded into will outgrow its size estimate. The bar overshoots 100%.
///     The rows are still right. 🐛
pub struct FileSource {
    buf_reader: BufReader<File>,
    source_config: FileSourceConfig,
    line_buf: Vec<u8>,
    line_number: u64,
    rows_read: u64,
    progress: ProgressMetrics,
}

// 🐛 progress is left out: nobody debugging a FileSource wants to read a wall of counters.
impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("source_config", &self.source_config)
            .field("line_number", &self.line_number)
            .finish()
    }
}

impl FileSource {
    /// 🚀 Opens the file, grabs its size for the progress bar, wraps it in a BufReader.
    ///
    /// A missing file is an error that names the path.
    /// If metadata fails: we assume 0 bytes, progress bar shows unknown.
    pub async fn open(source_config: FileSourceConfig) -> Result<Self> {
        let file_handle = File::open(&source_config.file_name)
            .await
            .with_context(|| {
                format!(
                    "💀 The door to '{}' would not budge. It might not exist. \
                     The permissions might be wrong. Either way we remain outside.",
                    source_config.file_name
                )
            })?;

        // 📏 if metadata fails, we fly blind (0 = unknown)
        let file_size = file_handle.metadata().await.map(|m| m.len()).unwrap_or(0);
        debug!(
            "📂 opened '{}' ({file_size} bytes)",
            source_config.file_name
        );

        let progress = ProgressMetrics::new(source_config.file_name.clone(), file_size);
        Ok(Self {
            buf_reader: BufReader::new(file_handle),
            source_config,
            line_buf: Vec::with_capacity(256),
            line_number: 0,
            rows_read: 0,
            progress,
        })
    }
}

#[async_trait]
impl Source for FileSource {
    async fn next_row(&mut self) -> Result<Option<RawRow>> {
        let next = read_next_row(
            &mut self.buf_reader,
            &mut self.line_buf,
            &mut self.line_number,
        )
        .await
        .with_context(|| format!("💀 Failed reading '{}'", self.source_config.file_name))?;

        match next {
            Some((row, bytes)) => {
                self.rows_read += 1;
                self.progress.update(bytes, 1);
                Ok(Some(row))
            }
            None => {
                trace!(
                    "🏁 '{}' exhausted after {} rows",
                    self.source_config.file_name, self.rows_read
                );
                self.progress.finish();
                Ok(None)
            }
        }
    }
}
