use crate::bulk::BulkConversionService;
use crate::core::cache::RateCache;
use crate::core::clock::Clock;
use crate::core::config::AppConfig;
use crate::core::conversion::{ConversionResult, PriceItem};
use crate::core::currency::{Currency, RateProvider, SUPPORTED_CURRENCIES, normalize_code};
use crate::core::error::FxResult;
use crate::core::store::KeyValueStore;
use crate::core::trigger::Trigger;
use crate::display::DisplayConverter;
use crate::payment::PaymentRateGuard;
use crate::preference::{CurrencyPreferenceStore, IdentityProvider};
use crate::refresh::RateRefresher;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Entry point for the rest of the application.
///
/// Construct one per session and pass it by reference; every instance owns
/// its own cache, so tests can run side by side.
pub struct CurrencyService {
    cache: Arc<RateCache>,
    display: DisplayConverter,
    payment: PaymentRateGuard,
    bulk: BulkConversionService,
    preferences: CurrencyPreferenceStore,
}

impl CurrencyService {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(RateCache::new(store.clone(), clock));
        let refresher = Arc::new(RateRefresher::new(
            provider,
            cache.clone(),
            Duration::from_millis(config.provider.timeout_ms),
        ));
        let base = normalize_code(&config.base_currency);

        Self {
            display: DisplayConverter::new(refresher.clone(), &base),
            payment: PaymentRateGuard::new(refresher, &base),
            bulk: BulkConversionService::new(cache.clone()),
            preferences: CurrencyPreferenceStore::load(store, &config.default_currency),
            cache,
        }
    }

    /// App start: restore the persisted cache, run first-login inference and
    /// refresh as the `AppInit` policy requires.
    pub async fn init(&self, identity: &dyn IdentityProvider) {
        let restored = self.cache.load().is_some();
        self.preferences.on_login(identity);
        self.display.ensure_fresh(Trigger::AppInit).await;
        info!(
            restored,
            currency = %self.current_currency(),
            "Currency service initialized"
        );
    }

    pub fn display(&self) -> &DisplayConverter {
        &self.display
    }

    pub fn payment(&self) -> &PaymentRateGuard {
        &self.payment
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Instant display conversion; `to` defaults to the current currency.
    pub fn convert(&self, amount: f64, from: &str, to: Option<&str>) -> f64 {
        let to = self.target(to);
        self.display.convert(amount, from, &to)
    }

    /// Display conversion after a `PageEntry` freshness check.
    pub async fn convert_async(
        &self,
        amount: f64,
        from: &str,
        to: Option<&str>,
    ) -> ConversionResult {
        let to = self.target(to);
        self.display
            .convert_async(amount, from, &to, Trigger::PageEntry)
            .await
    }

    pub fn calculate_bulk(&self, items: &[PriceItem], target: &str) -> Vec<ConversionResult> {
        self.bulk.calculate_bulk(items, target)
    }

    pub async fn get_fresh_rate_for_payment(&self, from: &str, to: &str) -> FxResult<f64> {
        self.payment.get_fresh_rate(from, to).await
    }

    pub async fn calculate_payment_amount(
        &self,
        amount: f64,
        from: &str,
        to: &str,
    ) -> FxResult<ConversionResult> {
        self.payment.calculate_payment_amount(amount, from, to).await
    }

    pub fn current_currency(&self) -> String {
        self.preferences.current_currency()
    }

    /// Records the user's choice and refreshes under `UserCurrencyChange`.
    pub async fn set_currency(&self, code: &str) -> FxResult<()> {
        self.preferences.set_currency(code)?;
        self.display.ensure_fresh(Trigger::UserCurrencyChange).await;
        Ok(())
    }

    pub fn list_supported_currencies(&self) -> &'static [Currency] {
        &SUPPORTED_CURRENCIES
    }

    pub fn preferences(&self) -> &CurrencyPreferenceStore {
        &self.preferences
    }

    pub async fn ensure_fresh(&self, trigger: Trigger) {
        self.display.ensure_fresh(trigger).await;
    }

    /// Drops cached rates, in memory and on disk.
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    /// Periodically expires old rates and refreshes them in the background.
    pub fn spawn_expiry_watch(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                service.expire_if_due().await;
            }
        })
    }

    async fn expire_if_due(&self) {
        let max_age = Trigger::CacheExpiration.policy().max_cache_age;
        if self.cache.age().is_some_and(|age| age > max_age) {
            debug!("Rate cache expired");
            self.cache.mark_stale();
        }
        self.display.ensure_fresh(Trigger::CacheExpiration).await;
    }

    fn target(&self, to: Option<&str>) -> String {
        to.map(normalize_code)
            .unwrap_or_else(|| self.current_currency())
    }
}
