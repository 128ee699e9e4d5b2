//! 🌊 StreamSource — rows straight off a byte stream, usually an upload body.
//!
//! Same line semantics as the file source. No progress bar: we don't know how
//! long the stream is, and neither does whoever is sending it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, BufReader};

use crate::backends::{Source, read_next_row};
use crate::common::RawRow;

pub struct StreamSource {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    line_buf: Vec<u8>,
    line_number: u64,
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("line_number", &self.line_number)
            .finish()
    }
}

impl StreamSource {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let boxed: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            reader: BufReader::new(boxed),
            line_buf: Vec::with_capacity(256),
            line_number: 0,
        }
    }
}

#[async_trait]
impl Source for StreamSource {
    async fn next_row(&mut self) -> Result<Option<RawRow>> {
        let next = read_next_row(&mut self.reader, &mut self.line_buf, &mut self.line_number)
            .await
            .context("💀 The upload stream broke mid-read")?;
        Ok(next.map(|(row, _bytes)| row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_invalid_utf8_is_mangled_not_fatal() -> Result<()> {
        // 🧪 a non-UTF-8 id still reads as a row; the stream keeps going past it
        let mut source = StreamSource::new(&b"A,1,d\n\xff\xfe,2,d\nC,3,d\n"[..]);
        assert_eq!(source.next_row().await?, Some(RawRow::new(1, "A,1,d")));
        assert_eq!(
            source.next_row().await?,
            Some(RawRow::new(2, "\u{FFFD}\u{FFFD},2,d"))
        );
        assert_eq!(source.next_row().await?, Some(RawRow::new(3, "C,3,d")));
        Ok(())
    }
}
