//! 🏷️ `id,price,expirationDate`: the one format this whole pipeline exists for.
//!
//! Fast path: no `"` anywhere in the row, so memchr finds the commas and we slice.
//! Slow path: somebody exported from a spreadsheet and quoted things. We honor
//! RFC 4180 quoting (`"a,b"` is one field, `""` is a literal quote) and nothing fancier.

use memchr::{memchr, memchr_iter};

use crate::common::{Promotion, RawRow};
use crate::errors::{DecodeError, DecodeReason};
use crate::transforms::RowDecoder;

/// 📐 Exactly this many fields per row. Not two. Not four. Three.
const FIELD_COUNT: usize = 3;

/// 🏷️ Zero-sized decoder for promotion CSV rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromotionCsv;

impl RowDecoder for PromotionCsv {
    fn decode(row: &RawRow) -> Result<Promotion, DecodeError> {
        let fail = |reason| DecodeError {
            line: row.line,
            row: row.text.clone(),
            reason,
        };

        let fields = split_fields(&row.text);
        if fields.len() != FIELD_COUNT {
            return Err(fail(DecodeReason::FieldCount {
                found: fields.len(),
            }));
        }

        let mut fields = fields.into_iter();
        let (Some(id), Some(raw_price), Some(expiration_date)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(fail(DecodeReason::FieldCount { found: 0 }));
        };

        if id.is_empty() {
            return Err(fail(DecodeReason::EmptyId));
        }

        // -- surrounding whitespace is forgiven for the price, nothing else
        let price: f64 = match raw_price.trim().parse() {
            Ok(price) if f64::is_finite(price) => price,
            _ => {
                return Err(fail(DecodeReason::InvalidPrice {
                    value: raw_price,
                }));
            }
        };
        if price < 0.0 {
            return Err(fail(DecodeReason::NegativePrice { value: raw_price }));
        }

        Ok(Promotion {
            id,
            price,
            expiration_date,
        })
    }
}

/// ✂️ Split a row on commas, honoring double quotes when present.
fn split_fields(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    if memchr(b'"', bytes).is_none() {
        // 🚀 the common case: no quotes, every comma is a separator
        let mut fields = Vec::with_capacity(FIELD_COUNT);
        let mut start = 0;
        for comma in memchr_iter(b',', bytes) {
            fields.push(text[start..comma].to_string());
            start = comma + 1;
        }
        fields.push(text[start..].to_string());
        return fields;
    }
    split_quoted(text)
}

/// 🐌 The spreadsheet path. Character-by-character, quote-aware.
fn split_quoted(text: &str) -> Vec<String> {
    let mut fields = Vec::with_capacity(FIELD_COUNT);
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    // -- "" inside quotes is one literal quote
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}
