//! The persisted exchange rate cache.
//!
//! The cache holds at most one [`RateSnapshot`]. Snapshots are immutable and
//! replaced whole, so readers holding an `Arc` never see rates from two
//! different fetches mixed together.

use crate::core::clock::Clock;
use crate::core::error::FxError;
use crate::core::store::KeyValueStore;
use crate::core::trigger::Trigger;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

pub const CACHE_KEY: &str = "fx.rate_cache";

/// Persisted timestamps further than this in the future are treated as corrupt.
const MAX_CLOCK_SKEW_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub base_currency: String,
    /// Single codes are relative to `base_currency`; `FROM_TO` keys are direct pairs.
    pub rates: HashMap<String, f64>,
    /// Milliseconds since the epoch at which the fetch was started.
    pub timestamp: i64,
    pub last_fetch_trigger: Trigger,
    pub is_stale: bool,
}

impl RateSnapshot {
    pub fn pair_key(from: &str, to: &str) -> String {
        format!("{from}_{to}")
    }

    /// Returns the rate stored under `key` if it is usable for arithmetic.
    pub fn rate(&self, key: &str) -> Option<f64> {
        self.rates
            .get(key)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    pub fn age_at(&self, now_ms: i64) -> Duration {
        Duration::milliseconds(now_ms.saturating_sub(self.timestamp).max(0))
    }

    fn validate(&self, now_ms: i64) -> Result<(), FxError> {
        let base = &self.base_currency;
        if base.len() != 3 || !base.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(FxError::CacheCorruption(format!(
                "invalid base currency '{base}'"
            )));
        }
        if self.rates.is_empty() {
            return Err(FxError::CacheCorruption("empty rate table".to_string()));
        }
        if let Some((code, rate)) = self
            .rates
            .iter()
            .find(|(_, r)| !r.is_finite() || **r <= 0.0)
        {
            return Err(FxError::CacheCorruption(format!(
                "invalid rate {rate} for {code}"
            )));
        }
        if self.timestamp <= 0 {
            return Err(FxError::CacheCorruption(format!(
                "timestamp {} predates the epoch",
                self.timestamp
            )));
        }
        if self.timestamp > now_ms.saturating_add(MAX_CLOCK_SKEW_MS) {
            return Err(FxError::CacheCorruption(format!(
                "timestamp {} is in the future",
                self.timestamp
            )));
        }
        Ok(())
    }
}

pub struct RateCache {
    current: RwLock<Option<Arc<RateSnapshot>>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl RateCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            current: RwLock::new(None),
            store,
            clock,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Restores the persisted snapshot if it is well formed and young enough
    /// for the trigger that fetched it. Anything else is removed from the store.
    pub fn load(&self) -> Option<Arc<RateSnapshot>> {
        let snapshot = match self.read_persisted() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No persisted rate cache");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Discarding persisted rate cache");
                self.remove_persisted();
                return None;
            }
        };

        let age = snapshot.age_at(self.now_ms());
        let max_age = snapshot.last_fetch_trigger.policy().max_cache_age;
        if age > max_age {
            info!(
                age_ms = age.num_milliseconds(),
                trigger = %snapshot.last_fetch_trigger,
                "Persisted rate cache too old, starting cold"
            );
            self.remove_persisted();
            return None;
        }

        let snapshot = Arc::new(snapshot);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = current
            .as_ref()
            .filter(|e| e.timestamp >= snapshot.timestamp)
        {
            return Some(existing.clone());
        }
        debug!(base = %snapshot.base_currency, "Restored persisted rate cache");
        *current = Some(snapshot.clone());
        Some(snapshot)
    }

    fn read_persisted(&self) -> Result<Option<RateSnapshot>, FxError> {
        let raw = self
            .store
            .get(CACHE_KEY)
            .map_err(|e| FxError::CacheCorruption(e.to_string()))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let snapshot: RateSnapshot =
            serde_json::from_str(&raw).map_err(|e| FxError::CacheCorruption(e.to_string()))?;
        snapshot.validate(self.now_ms())?;
        Ok(Some(snapshot))
    }

    /// Writes `snapshot` to the store. Failures are logged, not raised.
    pub fn save(&self, snapshot: &RateSnapshot) {
        let res = serde_json::to_string(snapshot)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(CACHE_KEY, &json));
        if let Err(e) = res {
            warn!(error = %e, "Failed to persist rate cache");
        }
    }

    fn remove_persisted(&self) {
        if let Err(e) = self.store.remove(CACHE_KEY) {
            warn!(error = %e, "Failed to remove persisted rate cache");
        }
    }

    pub fn get(&self) -> Option<Arc<RateSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the cache with rates fetched now.
    pub fn update(
        &self,
        base_currency: &str,
        rates: HashMap<String, f64>,
        trigger: Trigger,
    ) -> Arc<RateSnapshot> {
        self.update_at(base_currency, rates, trigger, self.now_ms())
    }

    /// Replaces the cache with rates whose fetch started at `fetched_at`.
    ///
    /// If the current snapshot is newer the update is dropped and the current
    /// snapshot is returned instead.
    pub fn update_at(
        &self,
        base_currency: &str,
        rates: HashMap<String, f64>,
        trigger: Trigger,
        fetched_at: i64,
    ) -> Arc<RateSnapshot> {
        let snapshot = Arc::new(RateSnapshot {
            base_currency: base_currency.trim().to_ascii_uppercase(),
            rates: rates
                .into_iter()
                .map(|(k, v)| (k.trim().to_ascii_uppercase(), v))
                .collect(),
            timestamp: fetched_at,
            last_fetch_trigger: trigger,
            is_stale: false,
        });

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = current.as_ref() {
            if existing.timestamp > fetched_at {
                debug!(
                    existing = existing.timestamp,
                    incoming = fetched_at,
                    "Dropping out-of-order rate update"
                );
                return existing.clone();
            }
        }
        self.save(&snapshot);
        *current = Some(snapshot.clone());
        debug!(
            base = %snapshot.base_currency,
            rates = snapshot.rates.len(),
            trigger = %trigger,
            "Rate cache updated"
        );
        snapshot
    }

    pub fn mark_stale(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let Some(existing) = current.as_ref() else {
            return;
        };
        if existing.is_stale {
            return;
        }
        let stale = Arc::new(RateSnapshot {
            is_stale: true,
            ..existing.as_ref().clone()
        });
        self.save(&stale);
        *current = Some(stale);
        debug!("Rate cache marked stale");
    }

    pub fn clear(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = None;
        self.remove_persisted();
        debug!("Rate cache cleared");
    }

    /// Time since the current snapshot was fetched, `None` when empty.
    pub fn age(&self) -> Option<Duration> {
        self.get().map(|s| s.age_at(self.now_ms()))
    }

    pub fn is_fresh(&self, threshold: Duration) -> bool {
        self.age().is_some_and(|age| age < threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::store::memory::MemoryStore;

    const T0: i64 = 1_700_000_000_000;

    fn rates() -> HashMap<String, f64> {
        HashMap::from([("USD".to_string(), 1.08), ("GBP".to_string(), 0.86)])
    }

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, RateCache) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let cache = RateCache::new(store.clone(), clock.clone());
        (store, clock, cache)
    }

    #[test]
    fn test_empty_cache() {
        let (_, _, cache) = setup();
        assert!(cache.get().is_none());
        assert!(cache.age().is_none());
        assert!(!cache.is_fresh(Duration::hours(24)));
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_update_replaces_and_persists() {
        let (store, clock, cache) = setup();
        cache.update("eur", rates(), Trigger::AppInit);

        let snapshot = cache.get().unwrap();
        assert_eq!(snapshot.base_currency, "EUR");
        assert_eq!(snapshot.rate("USD"), Some(1.08));
        assert!(!snapshot.is_stale);
        assert!(store.get(CACHE_KEY).unwrap().is_some());

        clock.advance(Duration::seconds(30));
        assert_eq!(cache.age(), Some(Duration::seconds(30)));
        assert!(cache.is_fresh(Duration::minutes(1)));
        assert!(!cache.is_fresh(Duration::seconds(30)));
    }

    #[test]
    fn test_reader_keeps_its_snapshot_across_update() {
        let (_, clock, cache) = setup();
        cache.update("EUR", rates(), Trigger::AppInit);
        let held = cache.get().unwrap();

        clock.advance(Duration::seconds(1));
        cache.update("USD", HashMap::from([("JPY".to_string(), 150.0)]), Trigger::PageEntry);

        assert_eq!(held.base_currency, "EUR");
        assert_eq!(held.rates.len(), 2);
        assert_eq!(cache.get().unwrap().base_currency, "USD");
    }

    #[test]
    fn test_out_of_order_update_is_dropped() {
        let (_, _, cache) = setup();
        cache.update_at("EUR", rates(), Trigger::PaymentInitiation, T0 + 10);

        let kept = cache.update_at(
            "EUR",
            HashMap::from([("USD".to_string(), 9.99)]),
            Trigger::PageEntry,
            T0 + 5,
        );

        assert_eq!(kept.timestamp, T0 + 10);
        assert_eq!(cache.get().unwrap().rate("USD"), Some(1.08));
    }

    #[test]
    fn test_load_restores_young_cache() {
        let (store, clock, cache) = setup();
        cache.update("EUR", rates(), Trigger::UserCurrencyChange);

        clock.advance(Duration::minutes(9));
        let restored = RateCache::new(store, clock);
        let snapshot = restored.load().unwrap();
        assert_eq!(snapshot.base_currency, "EUR");
        assert_eq!(snapshot.last_fetch_trigger, Trigger::UserCurrencyChange);
    }

    #[test]
    fn test_load_discards_cache_older_than_its_trigger_allows() {
        let (store, clock, cache) = setup();
        cache.update("EUR", rates(), Trigger::PageEntry);

        clock.advance(Duration::minutes(6));
        let restored = RateCache::new(store.clone(), clock);
        assert!(restored.load().is_none());
        assert!(restored.get().is_none());
        assert!(store.get(CACHE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_load_clears_corrupt_cache() {
        let (store, _, cache) = setup();
        store.set(CACHE_KEY, "{not json").unwrap();
        assert!(cache.load().is_none());
        assert!(store.get(CACHE_KEY).unwrap().is_none());

        let bad_rate = format!(
            r#"{{"base_currency":"EUR","rates":{{"USD":-1.0}},"timestamp":{T0},"last_fetch_trigger":"app_init","is_stale":false}}"#
        );
        store.set(CACHE_KEY, &bad_rate).unwrap();
        assert!(cache.load().is_none());
        assert!(store.get(CACHE_KEY).unwrap().is_none());

        let future = format!(
            r#"{{"base_currency":"EUR","rates":{{"USD":1.1}},"timestamp":{},"last_fetch_trigger":"app_init","is_stale":false}}"#,
            T0 + 3_600_000
        );
        store.set(CACHE_KEY, &future).unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_load_rejects_timestamp_before_epoch() {
        let (store, _, cache) = setup();
        for timestamp in [i64::MIN, -1, 0] {
            let raw = format!(
                r#"{{"base_currency":"EUR","rates":{{"USD":1.1}},"timestamp":{timestamp},"last_fetch_trigger":"app_init","is_stale":false}}"#
            );
            store.set(CACHE_KEY, &raw).unwrap();

            assert!(cache.load().is_none());
            assert!(store.get(CACHE_KEY).unwrap().is_none());
            assert!(cache.get().is_none());
        }
    }

    #[test]
    fn test_age_saturates_on_extreme_timestamps() {
        let snapshot = RateSnapshot {
            base_currency: "EUR".to_string(),
            rates: HashMap::from([("USD".to_string(), 1.1)]),
            timestamp: i64::MIN,
            last_fetch_trigger: Trigger::AppInit,
            is_stale: false,
        };
        assert!(snapshot.age_at(T0) > Duration::weeks(52));
    }

    #[test]
    fn test_mark_stale_and_clear() {
        let (store, clock, cache) = setup();
        cache.mark_stale();
        assert!(cache.get().is_none());

        cache.update("EUR", rates(), Trigger::AppInit);
        cache.mark_stale();
        assert!(cache.get().unwrap().is_stale);

        // Stale flag survives a restart
        let restored = RateCache::new(store.clone(), clock.clone());
        assert!(restored.load().unwrap().is_stale);

        cache.clear();
        assert!(cache.get().is_none());
        assert!(store.get(CACHE_KEY).unwrap().is_none());
    }
}
