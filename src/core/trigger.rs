//! Fetch triggers and their freshness policies

use crate::core::cache::RateCache;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// The calling context that asked for rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    AppInit,
    UserCurrencyChange,
    PageEntry,
    PaymentInitiation,
    CacheExpiration,
    /// Anything we do not recognise. Always requires a fetch.
    #[serde(other)]
    Unknown,
}

/// Static freshness policy attached to a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPolicy {
    /// Whether the caller waits for the refresh before converting.
    pub immediate: bool,
    /// Oldest cache the trigger tolerates, also used to validate a restored cache.
    pub max_cache_age: Duration,
}

impl Trigger {
    pub fn policy(&self) -> TriggerPolicy {
        match self {
            Trigger::AppInit => TriggerPolicy {
                immediate: true,
                max_cache_age: Duration::minutes(60),
            },
            Trigger::UserCurrencyChange => TriggerPolicy {
                immediate: true,
                max_cache_age: Duration::minutes(10),
            },
            Trigger::PageEntry => TriggerPolicy {
                immediate: false,
                max_cache_age: Duration::minutes(5),
            },
            Trigger::PaymentInitiation => TriggerPolicy {
                immediate: true,
                max_cache_age: Duration::minutes(1),
            },
            Trigger::CacheExpiration => TriggerPolicy {
                immediate: false,
                max_cache_age: Duration::minutes(60),
            },
            Trigger::Unknown => TriggerPolicy {
                immediate: true,
                max_cache_age: Duration::zero(),
            },
        }
    }
}

impl Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Trigger::AppInit => "app_init",
                Trigger::UserCurrencyChange => "user_currency_change",
                Trigger::PageEntry => "page_entry",
                Trigger::PaymentInitiation => "payment_initiation",
                Trigger::CacheExpiration => "cache_expiration",
                Trigger::Unknown => "unknown",
            }
        )
    }
}

impl FromStr for Trigger {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Ok(match key.as_str() {
            "appinit" => Trigger::AppInit,
            "usercurrencychange" => Trigger::UserCurrencyChange,
            "pageentry" => Trigger::PageEntry,
            "paymentinitiation" => Trigger::PaymentInitiation,
            "cacheexpiration" => Trigger::CacheExpiration,
            _ => Trigger::Unknown,
        })
    }
}

/// Decides whether `trigger` needs a refresh given the current cache.
pub fn should_fetch(trigger: Trigger, cache: &RateCache) -> bool {
    let is_stale = cache.get().is_some_and(|s| s.is_stale);
    should_fetch_at(trigger, cache.age(), is_stale)
}

/// Pure form of [`should_fetch`]; `age` is `None` when there is no cache.
pub fn should_fetch_at(trigger: Trigger, age: Option<Duration>, is_stale: bool) -> bool {
    let Some(age) = age else {
        return true;
    };
    if is_stale {
        return true;
    }
    let max_age = trigger.policy().max_cache_age;
    match trigger {
        Trigger::PaymentInitiation => age >= max_age,
        Trigger::UserCurrencyChange | Trigger::PageEntry => age > max_age,
        Trigger::AppInit | Trigger::CacheExpiration => false,
        Trigger::Unknown => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_initiation_bound() {
        let t = Trigger::PaymentInitiation;
        assert!(should_fetch_at(t, Some(Duration::seconds(61)), false));
        assert!(should_fetch_at(t, Some(Duration::seconds(60)), false));
        assert!(!should_fetch_at(t, Some(Duration::seconds(30)), false));
        assert!(should_fetch_at(t, None, false));
    }

    #[test]
    fn test_user_currency_change_bound() {
        let t = Trigger::UserCurrencyChange;
        assert!(should_fetch_at(t, Some(Duration::minutes(11)), false));
        assert!(!should_fetch_at(t, Some(Duration::minutes(5)), false));
        assert!(should_fetch_at(t, None, false));
    }

    #[test]
    fn test_page_entry_bound() {
        let t = Trigger::PageEntry;
        assert!(should_fetch_at(t, Some(Duration::minutes(6)), false));
        assert!(!should_fetch_at(t, Some(Duration::minutes(4)), false));
    }

    #[test]
    fn test_app_init_only_fetches_when_absent_or_stale() {
        for t in [Trigger::AppInit, Trigger::CacheExpiration] {
            assert!(should_fetch_at(t, None, false));
            assert!(should_fetch_at(t, Some(Duration::seconds(1)), true));
            assert!(!should_fetch_at(t, Some(Duration::minutes(30)), false));
        }
    }

    #[test]
    fn test_unknown_trigger_always_fetches() {
        assert!(should_fetch_at(Trigger::Unknown, Some(Duration::zero()), false));
    }

    #[test]
    fn test_trigger_parsing() {
        assert_eq!("page-entry".parse::<Trigger>().unwrap(), Trigger::PageEntry);
        assert_eq!(
            "PAYMENT_INITIATION".parse::<Trigger>().unwrap(),
            Trigger::PaymentInitiation
        );
        assert_eq!("coffee".parse::<Trigger>().unwrap(), Trigger::Unknown);

        let parsed: Trigger = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(parsed, Trigger::Unknown);
        let parsed: Trigger = serde_json::from_str("\"user_currency_change\"").unwrap();
        assert_eq!(parsed, Trigger::UserCurrencyChange);
    }
}
