//! Payment-grade conversion.
//!
//! Every quote here is computed against a snapshot younger than the
//! `PaymentInitiation` bound. Failures are returned to the caller; there is no
//! fallback to the original amount or to an outdated rate.

use crate::core::cache::RateSnapshot;
use crate::core::conversion::{ConversionResult, RatePath, is_valid_amount, resolve};
use crate::core::currency::normalize_code;
use crate::core::error::{FxError, FxResult};
use crate::core::trigger::{Trigger, should_fetch_at};
use crate::refresh::RateRefresher;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct PaymentRateGuard {
    refresher: Arc<RateRefresher>,
    base_currency: String,
}

impl PaymentRateGuard {
    pub fn new(refresher: Arc<RateRefresher>, base_currency: &str) -> Self {
        Self {
            refresher,
            base_currency: normalize_code(base_currency),
        }
    }

    /// Returns the multiplier from `from` to `to` using validated fresh rates.
    pub async fn get_fresh_rate(&self, from: &str, to: &str) -> FxResult<f64> {
        self.fresh_quote(from, to).await.map(|(rate, _)| rate)
    }

    #[instrument(skip(self))]
    pub async fn calculate_payment_amount(
        &self,
        amount: f64,
        from: &str,
        to: &str,
    ) -> FxResult<ConversionResult> {
        if !is_valid_amount(amount) {
            return Err(FxError::InvalidAmount(amount));
        }
        let (rate, path) = self.fresh_quote(from, to).await?;
        let converted_amount = match path {
            RatePath::Identity => amount,
            _ => amount * rate,
        };
        info!(amount, converted_amount, rate, path = %path, "Payment amount calculated");
        Ok(ConversionResult {
            amount,
            from: normalize_code(from),
            to: normalize_code(to),
            converted_amount,
            currency: normalize_code(to),
            effective_rate: Some(rate),
            path: Some(path),
        })
    }

    async fn fresh_quote(&self, from: &str, to: &str) -> FxResult<(f64, RatePath)> {
        if normalize_code(from) == normalize_code(to) {
            return Ok((1.0, RatePath::Identity));
        }

        let (snapshot, refreshed) = match self.cached_fresh() {
            Some(snapshot) => (snapshot, false),
            None => (self.refresh().await?, true),
        };
        if let Some(quote) = resolve(from, to, Some(&snapshot)) {
            return Ok(quote);
        }
        if refreshed {
            return Err(FxError::unavailable(from, to));
        }

        debug!(from, to, "Pair missing from fresh cache, forcing refresh");
        let snapshot = self.refresh().await?;
        resolve(from, to, Some(&snapshot)).ok_or_else(|| {
            warn!(from, to, "No rate after forced refresh");
            FxError::unavailable(from, to)
        })
    }

    fn cached_fresh(&self) -> Option<Arc<RateSnapshot>> {
        let cache = self.refresher.cache();
        let snapshot = cache.get()?;
        let age = snapshot.age_at(cache.now_ms());
        (!should_fetch_at(Trigger::PaymentInitiation, Some(age), snapshot.is_stale))
            .then_some(snapshot)
    }

    async fn refresh(&self) -> FxResult<Arc<RateSnapshot>> {
        self.refresher
            .refresh(&self.base_currency, Trigger::PaymentInitiation)
            .await?;
        // A joined fetch may have landed behind a newer snapshot; re-check.
        self.cached_fresh()
            .ok_or_else(|| FxError::Provider("refreshed rates are not fresh".to_string()))
    }
}
