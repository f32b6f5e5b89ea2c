//! The user's display currency.
//!
//! State moves `Unset -> AutoInferred -> ManuallySet` or straight from
//! `Unset` to `ManuallySet`. `ManuallySet` is absorbing: once the user picks
//! a currency, country inference never runs again.

use crate::core::currency::{find_currency, normalize_code};
use crate::core::error::{FxError, FxResult};
use crate::core::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

pub const PREFERENCE_KEY: &str = "fx.currency_preference";

/// Supplies the signed-in user's country for one-time inference.
pub trait IdentityProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;
    /// ISO 3166-1 alpha-2 country code, if known.
    fn country(&self) -> Option<String>;
}

/// Identity with a fixed country; `None` behaves as an anonymous session.
pub struct StaticIdentity(pub Option<String>);

impl IdentityProvider for StaticIdentity {
    fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    fn country(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPreference {
    pub selected_code: Option<String>,
    pub is_manual_override: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceState {
    Unset,
    AutoInferred,
    ManuallySet,
}

impl CurrencyPreference {
    pub fn state(&self) -> PreferenceState {
        match (&self.selected_code, self.is_manual_override) {
            (_, true) => PreferenceState::ManuallySet,
            (Some(_), false) => PreferenceState::AutoInferred,
            (None, false) => PreferenceState::Unset,
        }
    }
}

/// Maps a country to the supported currency shown by default there.
pub fn currency_for_country(country: &str) -> Option<&'static str> {
    let code = match country.trim().to_ascii_uppercase().as_str() {
        "US" | "PR" | "EC" | "SV" | "PA" => "USD",
        "GB" | "IM" | "JE" | "GG" => "GBP",
        "CH" | "LI" => "CHF",
        "CA" => "CAD",
        "AU" | "NZ" => "AUD",
        "JP" => "JPY",
        "AT" | "BE" | "CY" | "DE" | "EE" | "ES" | "FI" | "FR" | "GR" | "HR" | "IE" | "IT"
        | "LT" | "LU" | "LV" | "MT" | "NL" | "PT" | "SI" | "SK" | "MC" | "SM" | "VA" | "AD"
        | "ME" | "XK" => "EUR",
        _ => return None,
    };
    Some(code)
}

pub struct CurrencyPreferenceStore {
    store: Arc<dyn KeyValueStore>,
    default_currency: String,
    current: RwLock<CurrencyPreference>,
}

impl CurrencyPreferenceStore {
    /// Opens the store, reading any persisted preference.
    pub fn load(store: Arc<dyn KeyValueStore>, default_currency: &str) -> Self {
        let preference = match store.get(PREFERENCE_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<CurrencyPreference>(&raw)
                .map(sanitize)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Ignoring unreadable currency preference");
                    CurrencyPreference::default()
                }),
            Ok(None) => CurrencyPreference::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read currency preference");
                CurrencyPreference::default()
            }
        };
        debug!(?preference, "Loaded currency preference");

        Self {
            store,
            default_currency: normalize_code(default_currency),
            current: RwLock::new(preference),
        }
    }

    pub fn preference(&self) -> CurrencyPreference {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The display currency: the selection if it is supported, else the default.
    pub fn current_currency(&self) -> String {
        self.preference()
            .selected_code
            .as_deref()
            .and_then(find_currency)
            .map_or_else(|| self.default_currency.clone(), |c| c.code.to_string())
    }

    /// Records an explicit user choice. The override flag is permanent.
    pub fn set_currency(&self, code: &str) -> FxResult<()> {
        let currency =
            find_currency(code).ok_or_else(|| FxError::UnsupportedCurrency(code.to_string()))?;
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = CurrencyPreference {
            selected_code: Some(currency.code.to_string()),
            is_manual_override: true,
        };
        self.persist(&current);
        info!(currency = currency.code, "Display currency selected");
        Ok(())
    }

    /// Runs country-based inference on the first authenticated session.
    ///
    /// Returns the inferred code when inference happened.
    pub fn on_login(&self, identity: &dyn IdentityProvider) -> Option<String> {
        if !identity.is_authenticated() {
            return None;
        }
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.state() != PreferenceState::Unset {
            debug!(state = ?current.state(), "Skipping currency inference");
            return None;
        }

        let country = identity.country();
        let code = country
            .as_deref()
            .and_then(currency_for_country)
            .map(str::to_string)
            .unwrap_or_else(|| self.default_currency.clone());
        *current = CurrencyPreference {
            selected_code: Some(code.clone()),
            is_manual_override: false,
        };
        self.persist(&current);
        info!(country = ?country, currency = %code, "Inferred display currency");
        Some(code)
    }

    fn persist(&self, preference: &CurrencyPreference) {
        let res = serde_json::to_string(preference)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(PREFERENCE_KEY, &json));
        if let Err(e) = res {
            warn!(error = %e, "Failed to persist currency preference");
        }
    }
}

/// Canonicalizes a supported selection. Unsupported codes are kept so the
/// preference state survives; reads fall back to the default instead.
fn sanitize(mut preference: CurrencyPreference) -> CurrencyPreference {
    if let Some(code) = &preference.selected_code {
        match find_currency(code) {
            Some(currency) => preference.selected_code = Some(currency.code.to_string()),
            None => warn!(code = %code, "Persisted currency no longer supported"),
        }
    }
    preference
}
