use crate::core::cache::{RateCache, RateSnapshot};
use crate::core::currency::{RateProvider, normalize_code};
use crate::core::error::{FxError, FxResult};
use crate::core::trigger::Trigger;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

type SharedFetch = Shared<BoxFuture<'static, FxResult<Arc<RateSnapshot>>>>;

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

/// Fetches rate tables from the provider into the cache.
///
/// At most one fetch per base currency is outstanding; later callers await
/// the one already running. Each fetch runs in its own task, so callers that
/// stop waiting do not cancel it.
pub struct RateRefresher {
    provider: Arc<dyn RateProvider>,
    cache: Arc<RateCache>,
    timeout: Duration,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    next_id: AtomicU64,
}

impl RateRefresher {
    pub fn new(provider: Arc<dyn RateProvider>, cache: Arc<RateCache>, timeout: Duration) -> Self {
        Self {
            provider,
            cache,
            timeout,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Fetches rates for `base` and waits for the cache to be updated.
    #[instrument(skip(self))]
    pub async fn refresh(&self, base: &str, trigger: Trigger) -> FxResult<Arc<RateSnapshot>> {
        self.join_or_start(base, trigger).await
    }

    /// Starts (or joins) a fetch without waiting for it.
    pub fn refresh_in_background(&self, base: &str, trigger: Trigger) {
        drop(self.join_or_start(base, trigger));
    }

    /// Number of fetches currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn join_or_start(&self, base: &str, trigger: Trigger) -> SharedFetch {
        let base = normalize_code(base);
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = in_flight.get(&base) {
            debug!(base = %base, trigger = %trigger, "Joining in-flight rate fetch");
            return existing.fetch.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(fetch_rates(
            self.provider.clone(),
            self.cache.clone(),
            self.in_flight.clone(),
            self.timeout,
            base.clone(),
            trigger,
            id,
        ));
        let fetch = async move {
            task.await
                .unwrap_or_else(|e| Err(FxError::Provider(format!("refresh task failed: {e}"))))
        }
        .boxed()
        .shared();

        in_flight.insert(
            base,
            InFlight {
                id,
                fetch: fetch.clone(),
            },
        );
        fetch
    }
}

async fn fetch_rates(
    provider: Arc<dyn RateProvider>,
    cache: Arc<RateCache>,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    timeout: Duration,
    base: String,
    trigger: Trigger,
    id: u64,
) -> FxResult<Arc<RateSnapshot>> {
    let started_at = cache.now_ms();
    debug!(base = %base, trigger = %trigger, "Fetching rates");

    let outcome = match tokio::time::timeout(timeout, provider.get_bulk_rates(&base)).await {
        Ok(Ok(bulk)) if normalize_code(&bulk.base) != base => Err(FxError::Provider(format!(
            "requested rates for {base}, received {}",
            bulk.base
        ))),
        Ok(Ok(bulk)) => Ok(cache.update_at(&bulk.base, bulk.rates, trigger, started_at)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(FxError::Timeout(timeout.as_millis() as u64)),
    };

    match &outcome {
        Ok(snapshot) => info!(
            base = %base,
            trigger = %trigger,
            rates = snapshot.rates.len(),
            "Rates refreshed"
        ),
        Err(e) => {
            warn!(base = %base, trigger = %trigger, error = %e, "Rate refresh failed");
            cache.mark_stale();
        }
    }

    let mut in_flight = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
    if in_flight.get(&base).is_some_and(|f| f.id == id) {
        in_flight.remove(&base);
    }
    outcome
}
