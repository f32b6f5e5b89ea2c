//! Rate model, conversion rules and the ambient plumbing they share.

pub mod cache;
pub mod clock;
pub mod config;
pub mod conversion;
pub mod currency;
pub mod error;
pub mod log;
pub mod store;
pub mod trigger;

pub use cache::{RateCache, RateSnapshot};
pub use currency::{BulkRates, RateProvider};
pub use error::{FxError, FxResult};
pub use trigger::Trigger;
