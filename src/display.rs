//! Display-path conversion. Never fails: missing rates degrade to the
//! original amount tagged with its own currency.

use crate::core::conversion::{ConversionResult, convert_for_display};
use crate::core::currency::normalize_code;
use crate::core::trigger::{Trigger, should_fetch};
use crate::refresh::RateRefresher;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DisplayConverter {
    refresher: Arc<RateRefresher>,
    base_currency: String,
}

impl DisplayConverter {
    pub fn new(refresher: Arc<RateRefresher>, base_currency: &str) -> Self {
        Self {
            refresher,
            base_currency: normalize_code(base_currency),
        }
    }

    /// Converts against whatever is cached right now.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        self.convert_result(amount, from, to).converted_amount
    }

    pub fn convert_result(&self, amount: f64, from: &str, to: &str) -> ConversionResult {
        let snapshot = self.refresher.cache().get();
        let result = convert_for_display(amount, from, to, snapshot.as_deref());
        if !result.is_converted() {
            debug!(
                from = %result.from,
                to = %result.to,
                "No rate for display, showing original amount"
            );
        }
        result
    }

    /// Converts after awaiting any refresh `trigger` calls for.
    ///
    /// Unlike [`ensure_fresh`](Self::ensure_fresh), an expired cache is
    /// refreshed before converting even for non-immediate triggers.
    pub async fn convert_async(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        trigger: Trigger,
    ) -> ConversionResult {
        if should_fetch(trigger, self.refresher.cache()) {
            self.refresh_now(trigger).await;
        }
        self.convert_result(amount, from, to)
    }

    /// Applies the trigger's policy to the cache.
    ///
    /// Immediate triggers wait for the refresh; the others start it in the
    /// background unless there is nothing cached to show meanwhile. Refresh
    /// errors are logged and swallowed.
    pub async fn ensure_fresh(&self, trigger: Trigger) {
        let cache = self.refresher.cache();
        if !should_fetch(trigger, cache) {
            return;
        }

        if trigger.policy().immediate || cache.get().is_none() {
            self.refresh_now(trigger).await;
        } else {
            self.refresher.refresh_in_background(&self.base_currency, trigger);
        }
    }

    async fn refresh_now(&self, trigger: Trigger) {
        if let Err(e) = self.refresher.refresh(&self.base_currency, trigger).await {
            warn!(trigger = %trigger, error = %e, "Display refresh failed, using cached rates");
        }
    }
}
