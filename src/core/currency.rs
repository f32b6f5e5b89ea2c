//! Supported currencies and the rate provider abstraction

use crate::core::error::FxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;

/// Reference data for a currency the application can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    /// Translation key for the human readable name.
    pub name_key: &'static str,
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

pub const SUPPORTED_CURRENCIES: [Currency; 7] = [
    Currency {
        code: "USD",
        symbol: "$",
        name_key: "currency.usd",
    },
    Currency {
        code: "EUR",
        symbol: "€",
        name_key: "currency.eur",
    },
    Currency {
        code: "GBP",
        symbol: "£",
        name_key: "currency.gbp",
    },
    Currency {
        code: "CHF",
        symbol: "CHF",
        name_key: "currency.chf",
    },
    Currency {
        code: "CAD",
        symbol: "CA$",
        name_key: "currency.cad",
    },
    Currency {
        code: "AUD",
        symbol: "A$",
        name_key: "currency.aud",
    },
    Currency {
        code: "JPY",
        symbol: "¥",
        name_key: "currency.jpy",
    },
];

pub const DEFAULT_CURRENCY: &str = "EUR";

/// Looks up a supported currency by code, ignoring case.
pub fn find_currency(code: &str) -> Option<&'static Currency> {
    SUPPORTED_CURRENCIES
        .iter()
        .find(|c| c.code.eq_ignore_ascii_case(code.trim()))
}

pub fn is_supported(code: &str) -> bool {
    find_currency(code).is_some()
}

/// Canonical form used for cache keys and comparisons.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Rates for every known code, relative to `base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRates {
    pub base: String,
    pub rates: HashMap<String, f64>,
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn get_bulk_rates(&self, base: &str) -> Result<BulkRates, FxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_currency_ignores_case() {
        assert_eq!(find_currency("gbp").map(|c| c.symbol), Some("£"));
        assert_eq!(find_currency(" usd ").map(|c| c.code), Some("USD"));
        assert!(find_currency("XYZ").is_none());
    }

    #[test]
    fn test_default_currency_is_supported() {
        assert!(is_supported(DEFAULT_CURRENCY));
        assert_eq!(SUPPORTED_CURRENCIES.len(), 7);
    }
}
