//! 🏷️ promo — rebuild a promotions cache from a forty million line CSV, concurrently,
//! without flushing anything twice or losing anything once.
//!
//! Start at [`PromotionCache`]: `reload*` rebuilds the store, `get` reads from it.
//! [`scheduler::spawn_periodic_reload`] keeps it fresh on a timer.

pub mod app_config;
pub mod backends;
pub mod cancel;
pub mod common;
pub mod errors;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod transforms;

mod accumulators;
mod flusher;
mod progress;
mod supervisors;

pub use app_config::{AccumulationStrategy, AppConfig, DecodePolicy, RuntimeConfig, load_config};
pub use backends::{SourceBackend, StoreBackend};
pub use cancel::CancelToken;
pub use common::{Promotion, RawRow};
pub use errors::{DecodeError, DecodeReason, LoadError, StoreError};
pub use service::{LoadReport, PromotionCache};
