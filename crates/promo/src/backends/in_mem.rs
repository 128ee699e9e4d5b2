//! # Previously, on promo...
//!
//! 🎬 The promotions were trapped. Forty million of them, stuck in a CSV, and the
//! only Redis in the building belonged to someone else's integration test. Someone
//! had to write a backend so simple it lives entirely in RAM, gone the moment you blink.
//!
//! That someone was this module.
//!
//! `in_mem` provides an in-memory [`Source`](crate::backends::Source) that hands out
//! rows from a `Vec`, and an in-memory [`Store`](crate::backends::Store) that keeps
//! promotions in a `HashMap` and tattles to the test suite about every call it got.
//!
//! 🦆
//!
//! ⚠️ This is NOT for production. This is for tests and local fiddling. If you're
//! deploying this to prod, please also deploy a therapist.

mod in_mem_source;
mod in_mem_store;

pub use in_mem_source::{InMemorySource, InMemorySourceConfig};
pub use in_mem_store::InMemoryStore;
