pub mod bulk;
pub mod cli;
pub mod core;
pub mod display;
pub mod payment;
pub mod preference;
pub mod providers;
pub mod refresh;
pub mod service;
pub mod store;

use crate::core::clock::SystemClock;
use crate::core::config::AppConfig;
use crate::preference::StaticIdentity;
use crate::providers::frankfurter::FrankfurterProvider;
use crate::service::CurrencyService;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Convert {
        amount: f64,
        from: String,
        to: Option<String>,
    },
    Bulk {
        items: Vec<String>,
        to: Option<String>,
    },
    Pay {
        amount: f64,
        from: String,
        to: String,
    },
    Currency {
        code: Option<String>,
    },
    Currencies,
    Rates,
    Invalidate,
}

/// Builds a service from configuration, the way the binary does.
pub fn build_service(config: &AppConfig) -> Result<CurrencyService> {
    let data_path = config.data_path()?;
    debug!(path = %data_path.display(), "Opening store");
    let store = store::open_store(&data_path);
    let provider = Arc::new(FrankfurterProvider::new(&config.provider)?);
    Ok(CurrencyService::new(
        config,
        provider,
        store,
        Arc::new(SystemClock),
    ))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxcache starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let service = build_service(&config)?;
    service.init(&StaticIdentity(config.country.clone())).await;

    match command {
        AppCommand::Convert { amount, from, to } => {
            cli::convert::run_convert(&service, amount, &from, to.as_deref()).await
        }
        AppCommand::Bulk { items, to } => cli::convert::run_bulk(&service, &items, to.as_deref()),
        AppCommand::Pay { amount, from, to } => {
            cli::pay::run_pay(&service, amount, &from, &to).await
        }
        AppCommand::Currency { code } => {
            cli::currency::run_currency(&service, code.as_deref()).await
        }
        AppCommand::Currencies => cli::currency::run_currencies(&service),
        AppCommand::Rates => cli::currency::run_rates(&service),
        AppCommand::Invalidate => {
            service.invalidate();
            info!("Cached rates removed");
            Ok(())
        }
    }
}
