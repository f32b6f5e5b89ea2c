//! Pair conversion against a single rate snapshot.

use crate::core::cache::RateSnapshot;
use crate::core::currency::normalize_code;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Which lookup rule produced a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatePath {
    Identity,
    Direct,
    Inverse,
    FromBase,
    ToBase,
    Triangulated,
}

impl Display for RatePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RatePath::Identity => "identity",
                RatePath::Direct => "direct",
                RatePath::Inverse => "inverse",
                RatePath::FromBase => "from-base",
                RatePath::ToBase => "to-base",
                RatePath::Triangulated => "triangulated",
            }
        )
    }
}

/// An amount to convert, in its own currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceItem {
    pub amount: f64,
    pub currency: String,
}

impl PriceItem {
    pub fn new(amount: f64, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub converted_amount: f64,
    /// Currency `converted_amount` is expressed in; `from` when no rate was found.
    pub currency: String,
    pub effective_rate: Option<f64>,
    pub path: Option<RatePath>,
}

impl ConversionResult {
    pub fn is_converted(&self) -> bool {
        self.path.is_some()
    }
}

pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}

/// Finds the multiplier turning one unit of `from` into `to`.
///
/// Rules are tried in a fixed order: identity, direct pair, inverse pair,
/// base to target, source to base, then triangulation through the base.
pub fn resolve(from: &str, to: &str, snapshot: Option<&RateSnapshot>) -> Option<(f64, RatePath)> {
    let from = normalize_code(from);
    let to = normalize_code(to);
    if from == to {
        return Some((1.0, RatePath::Identity));
    }
    let snapshot = snapshot?;

    if let Some(rate) = snapshot.rate(&RateSnapshot::pair_key(&from, &to)) {
        return Some((rate, RatePath::Direct));
    }
    if let Some(rate) = snapshot.rate(&RateSnapshot::pair_key(&to, &from)) {
        return Some((1.0 / rate, RatePath::Inverse));
    }

    let base = normalize_code(&snapshot.base_currency);
    if base == from {
        return snapshot.rate(&to).map(|rate| (rate, RatePath::FromBase));
    }
    if base == to {
        return snapshot
            .rate(&from)
            .map(|rate| (1.0 / rate, RatePath::ToBase));
    }
    match (snapshot.rate(&from), snapshot.rate(&to)) {
        (Some(from_rate), Some(to_rate)) => Some((to_rate / from_rate, RatePath::Triangulated)),
        _ => None,
    }
}

/// Converts `amount` using `snapshot`, `None` when no rate can be derived.
///
/// Invalid amounts (NaN, infinite, negative) convert to zero.
pub fn convert(amount: f64, from: &str, to: &str, snapshot: Option<&RateSnapshot>) -> Option<f64> {
    if !is_valid_amount(amount) {
        return Some(0.0);
    }
    resolve(from, to, snapshot).map(|(rate, path)| match path {
        RatePath::Identity => amount,
        _ => amount * rate,
    })
}

/// Converts for display: falls back to the original amount tagged with its
/// own currency when no rate is available.
pub fn convert_for_display(
    amount: f64,
    from: &str,
    to: &str,
    snapshot: Option<&RateSnapshot>,
) -> ConversionResult {
    let from = normalize_code(from);
    let to = normalize_code(to);
    let safe_amount = if is_valid_amount(amount) { amount } else { 0.0 };

    match resolve(&from, &to, snapshot) {
        Some((rate, path)) => ConversionResult {
            amount: safe_amount,
            converted_amount: match path {
                RatePath::Identity => safe_amount,
                _ => safe_amount * rate,
            },
            currency: to.clone(),
            from,
            to,
            effective_rate: Some(rate),
            path: Some(path),
        },
        None => ConversionResult {
            amount: safe_amount,
            converted_amount: safe_amount,
            currency: from.clone(),
            from,
            to,
            effective_rate: None,
            path: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::trigger::Trigger;
    use std::collections::HashMap;

    fn snapshot(base: &str, rates: &[(&str, f64)]) -> RateSnapshot {
        RateSnapshot {
            base_currency: base.to_string(),
            rates: rates
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<HashMap<_, _>>(),
            timestamp: 0,
            last_fetch_trigger: Trigger::AppInit,
            is_stale: false,
        }
    }

    #[test]
    fn test_same_currency_is_identity() {
        let s = snapshot("EUR", &[("USD", 1.1)]);
        for amount in [0.0, 1.0, 123.45, 1e12] {
            assert_eq!(convert(amount, "GBP", "GBP", Some(&s)), Some(amount));
            assert_eq!(convert(amount, "GBP", "GBP", None), Some(amount));
        }
    }

    #[test]
    fn test_invalid_amounts_convert_to_zero() {
        let s = snapshot("EUR", &[("USD", 1.1)]);
        assert_eq!(convert(f64::NAN, "EUR", "USD", Some(&s)), Some(0.0));
        assert_eq!(convert(-5.0, "EUR", "USD", Some(&s)), Some(0.0));
        assert_eq!(convert(f64::INFINITY, "EUR", "USD", None), Some(0.0));
    }

    #[test]
    fn test_triangulation_through_base() {
        let s = snapshot("XXX", &[("AAA", 2.0), ("BBB", 5.0)]);
        assert_eq!(convert(10.0, "AAA", "BBB", Some(&s)), Some(25.0));
        assert_eq!(
            resolve("AAA", "BBB", Some(&s)).map(|(_, p)| p),
            Some(RatePath::Triangulated)
        );
    }

    #[test]
    fn test_direct_beats_inverse() {
        let s = snapshot("EUR", &[("AAA_BBB", 3.0), ("BBB_AAA", 0.25)]);
        assert_eq!(convert(2.0, "AAA", "BBB", Some(&s)), Some(6.0));
        assert_eq!(convert(2.0, "BBB", "AAA", Some(&s)), Some(0.5));
    }

    #[test]
    fn test_inverse_pair() {
        let s = snapshot("EUR", &[("GBP_USD", 1.25)]);
        assert_eq!(convert(10.0, "USD", "GBP", Some(&s)), Some(10.0 * (1.0 / 1.25)));
        assert_eq!(
            resolve("USD", "GBP", Some(&s)).map(|(_, p)| p),
            Some(RatePath::Inverse)
        );
    }

    #[test]
    fn test_base_currency_paths() {
        let s = snapshot("EUR", &[("USD", 1.08), ("GBP", 0.86)]);
        assert_eq!(convert(100.0, "EUR", "USD", Some(&s)), Some(100.0 * 1.08));
        assert_eq!(
            convert(100.0, "GBP", "EUR", Some(&s)),
            Some(100.0 * (1.0 / 0.86))
        );
        assert_eq!(
            resolve("eur", "usd", Some(&s)).map(|(_, p)| p),
            Some(RatePath::FromBase)
        );
        assert_eq!(
            resolve("GBP", "EUR", Some(&s)).map(|(_, p)| p),
            Some(RatePath::ToBase)
        );
    }

    #[test]
    fn test_missing_rate_is_none() {
        let s = snapshot("EUR", &[("USD", 1.08)]);
        assert_eq!(convert(10.0, "USD", "JPY", Some(&s)), None);
        assert_eq!(convert(10.0, "EUR", "JPY", Some(&s)), None);
        assert_eq!(convert(10.0, "USD", "EUR", None), None);
    }

    #[test]
    fn test_unusable_rates_are_skipped() {
        let s = snapshot("EUR", &[("USD_GBP", 0.0), ("USD", 1.25), ("GBP", 0.5)]);
        assert_eq!(
            resolve("USD", "GBP", Some(&s)),
            Some((0.4, RatePath::Triangulated))
        );
    }

    #[test]
    fn test_round_trip_with_consistent_pairs() {
        let s = snapshot("EUR", &[("USD_JPY", 150.0), ("JPY_USD", 1.0 / 150.0)]);
        let there = convert(42.5, "USD", "JPY", Some(&s)).unwrap();
        let back = convert(there, "JPY", "USD", Some(&s)).unwrap();
        assert!((back - 42.5).abs() < 1e-9);
    }

    #[test]
    fn test_display_fallback_keeps_source_currency() {
        let s = snapshot("EUR", &[("USD", 1.08)]);
        let result = convert_for_display(99.0, "CHF", "USD", Some(&s));
        assert!(!result.is_converted());
        assert_eq!(result.converted_amount, 99.0);
        assert_eq!(result.currency, "CHF");
        assert_eq!(result.to, "USD");

        let result = convert_for_display(10.0, "eur", "usd", Some(&s));
        assert!(result.is_converted());
        assert_eq!(result.currency, "USD");
        assert_eq!(result.effective_rate, Some(1.08));
    }
}
