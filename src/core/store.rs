//! Persisted key/value storage abstraction

use anyhow::Result;

/// Small synchronous string store that survives process restarts.
///
/// Implementations must be cheap enough to call from async code without
/// offloading to a blocking pool.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}
