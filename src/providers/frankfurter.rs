use crate::core::config::ProviderConfig;
use crate::core::currency::{BulkRates, RateProvider, normalize_code};
use crate::core::error::{FxError, FxResult};
use crate::providers::util::with_retry;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Bulk rate provider speaking the Frankfurter `latest` API.
pub struct FrankfurterProvider {
    base_url: String,
    client: reqwest::Client,
    retries: usize,
    retry_delay_ms: u64,
}

impl FrankfurterProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fxcache/1.0")
            .timeout(Duration::from_millis(config.attempt_timeout_ms))
            .build()?;
        Ok(FrankfurterProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }
}

/// The only response shape accepted; anything else is a provider error.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LatestRatesResponse {
    amount: f64,
    base: String,
    date: String,
    rates: HashMap<String, f64>,
}

fn validate(requested: &str, data: LatestRatesResponse) -> FxResult<BulkRates> {
    if data.amount != 1.0 {
        return Err(FxError::Provider(format!(
            "expected rates for 1 {requested}, got amount {}",
            data.amount
        )));
    }
    if normalize_code(&data.base) != requested {
        return Err(FxError::Provider(format!(
            "requested base {requested}, received {}",
            data.base
        )));
    }
    if data.rates.is_empty() {
        return Err(FxError::Provider(format!("empty rate table for {requested}")));
    }
    for (code, rate) in &data.rates {
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(FxError::Provider(format!("invalid currency code '{code}'")));
        }
        if !rate.is_finite() || *rate <= 0.0 {
            return Err(FxError::Provider(format!("invalid rate {rate} for {code}")));
        }
    }
    debug!(base = %requested, date = %data.date, rates = data.rates.len(), "Validated rate table");
    Ok(BulkRates {
        base: requested.to_string(),
        rates: data.rates,
    })
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    #[instrument(name = "FrankfurterRatesFetch", skip(self), fields(base = %base))]
    async fn get_bulk_rates(&self, base: &str) -> FxResult<BulkRates> {
        let base = normalize_code(base);
        let url = format!("{}/latest?from={}", self.base_url, base);
        debug!("Requesting rates from {}", url);

        let response = with_retry(
            || self.client.get(&url).send(),
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .map_err(|e| FxError::Provider(format!("Request error: {e} for base: {base}")))?;

        if !response.status().is_success() {
            return Err(FxError::Provider(format!(
                "HTTP error: {} for base: {}",
                response.status(),
                base
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FxError::Provider(format!("Failed to read response for {base}: {e}")))?;
        let data: LatestRatesResponse = serde_json::from_str(&text).map_err(|e| {
            FxError::Provider(format!("Failed to parse JSON response for {base}: {e}"))
        })?;

        validate(&base, data)
    }
}
