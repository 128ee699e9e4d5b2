use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::backends::Source;
use crate::common::{RawRow, row_from_line};

/// 🔧 Rows embedded right in the config. Handy for smoke tests, questionable for anything else.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct InMemorySourceConfig {
    #[serde(default)]
    pub rows: Vec<String>,
}

/// 📦 The world's most optimistic data source.
///
/// Knows exactly the rows you gave it. Hands them out once, in order, and then
/// yields nothing further, like my motivation on a Friday afternoon.
/// Line numbers are positions in the Vec (1-based), blanks included.
#[derive(Debug)]
pub struct InMemorySource {
    rows: std::vec::IntoIter<String>,
    line_number: u64,
}

impl InMemorySource {
    pub fn new(rows: Vec<String>) -> Self {
        Self {
            rows: rows.into_iter(),
            line_number: 0,
        }
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn next_row(&mut self) -> Result<Option<RawRow>> {
        for text in self.rows.by_ref() {
            self.line_number += 1;
            if let Some(row) = row_from_line(self.line_number, &text) {
                return Ok(Some(row));
            }
        }
        // -- 🍪 the snack cabinet is empty. go home.
        Ok(None)
    }
}
