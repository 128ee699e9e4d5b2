// ai
//! 🔄 Transforms — where a line of text becomes a promotion, or doesn't.
//!
//! 🎬 INT. CUSTOMS DESK — 2:47 AM
//!
//! A row walks up. "Purpose of your visit?" "I'm a promotion." "Three fields?"
//! "...two and a half." The stamp comes down. `DecodeError`. Next.
//!
//! Every decoder is a zero-sized marker type implementing [`RowDecoder`]. No vtables.
//! The compiler monomorphizes the call and the decode workers never know which
//! format they are holding, only that it hands back a [`Promotion`] or a reason.
//!
//! ## Knowledge Graph 🧠
//! - Input: `common::RawRow` (from `backends::Source`)
//! - Output: `common::Promotion` or `errors::DecodeError`
//! - Used by: `supervisors::workers::decode_worker`, exactly one call per row 🦆

use crate::common::{Promotion, RawRow};
use crate::errors::DecodeError;

pub(crate) mod promotion_csv;

pub use promotion_csv::PromotionCsv;

/// 📥 Turns one raw row into one [`Promotion`].
///
/// # Contract 📜
/// - Pure. No I/O, no shared state, safe to call from any number of workers at once.
/// - Called exactly once per row. Retrying a decode is not a thing.
/// - On failure the [`DecodeError`] carries the row's line number and text verbatim.
pub trait RowDecoder {
    fn decode(row: &RawRow) -> Result<Promotion, DecodeError>;
}
