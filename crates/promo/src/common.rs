// ai
//! 📦 Common data structures — the building blocks of promo
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. MARKETING DEPARTMENT — 4:58 PM, FRIDAY
//!
//! Somebody just uploaded a forty million line CSV of promotions. Each line has
//! an id, a price, and an expiration date. Nobody knows who asked for it. The
//! cache must be rebuilt anyway. The weekend must wait.
//!
//! 🦆
//!
//! This module defines the two shapes that flow through the loader:
//! a [`RawRow`] (a line of text that has not yet been judged) and a
//! [`Promotion`] (a row that survived the decoder and earned a place in the store).

use std::fmt;

use serde::{Deserialize, Serialize};

/// 🏷️ A single promotion, the entity the cache is made of.
///
/// `id` is the one and only identity. Two promotions with the same `id` in one
/// generation fight it out and the last write wins. There is no referee.
///
/// Serialized with camelCase keys (`expirationDate`) because the existing cache
/// consumers were raised on Jackson and we are not here to reopen old wounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    /// 🔑 Non-empty, unique within a generation.
    pub id: String,
    /// 💰 Non-negative, finite. The decoder makes sure of it.
    pub price: f64,
    /// 📅 Date-like string. We do not parse it. We barely look at it.
    pub expiration_date: String,
}

impl Promotion {
    pub fn new(id: impl Into<String>, price: f64, expiration_date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            price,
            expiration_date: expiration_date.into(),
        }
    }
}

/// 📄 One line of input, exactly as the source read it, minus the line terminator.
///
/// `line` is the 1-based physical line number in the input. Blank lines are skipped
/// by the sources but still count toward the numbering, so a `DecodeError` for line 7
/// really is line 7 when you open the file in your editor at 3am.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub text: String,
}

impl RawRow {
    pub fn new(line: u64, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
        }
    }
}

impl fmt::Display for RawRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.line, self.text)
    }
}

/// 🔢 Shared line-splitting logic for every text-based source.
///
/// Strips `\n` / `\r\n` and reports whether anything is left worth decoding.
/// Returns `None` for blank or whitespace-only lines.
pub(crate) fn row_from_line(line_number: u64, line: &str) -> Option<RawRow> {
    let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
    if trimmed.trim().is_empty() {
        None
    } else {
        Some(RawRow::new(line_number, trimmed))
    }
}
