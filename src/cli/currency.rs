use super::ui;
use crate::core::cache::RateSnapshot;
use crate::core::currency::Currency;
use crate::service::CurrencyService;
use anyhow::Result;
use comfy_table::Cell;

pub fn display_currencies(currencies: &[Currency], selected: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(""),
        ui::header_cell("Code"),
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
    ]);
    for currency in currencies {
        let marker = if currency.code == selected { "*" } else { "" };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(currency.code),
            Cell::new(currency.symbol),
            Cell::new(ui::style_text(currency.name_key, ui::StyleType::Subtle)),
        ]);
    }
    table.to_string()
}

pub fn display_snapshot(snapshot: Option<&RateSnapshot>, now_ms: i64) -> String {
    let Some(snapshot) = snapshot else {
        return ui::style_text("No cached rates", ui::StyleType::Error);
    };

    let mut codes: Vec<_> = snapshot.rates.iter().collect();
    codes.sort_by(|a, b| a.0.cmp(b.0));

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell(&format!("Per 1 {}", snapshot.base_currency)),
    ]);
    for (code, rate) in codes {
        table.add_row(vec![
            Cell::new(code),
            ui::format_optional_cell(Some(*rate), |r| format!("{r:.6}")),
        ]);
    }

    let age = snapshot.age_at(now_ms);
    let mut header = format!(
        "Base {} | fetched {}m{}s ago on {}",
        snapshot.base_currency,
        age.num_minutes(),
        age.num_seconds() % 60,
        snapshot.last_fetch_trigger
    );
    if snapshot.is_stale {
        header.push_str(&ui::style_text(" | stale", ui::StyleType::Error));
    }
    format!("{}\n{table}", ui::style_text(&header, ui::StyleType::Title))
}

/// Shows the current currency, or selects a new one.
pub async fn run_currency(service: &CurrencyService, code: Option<&str>) -> Result<()> {
    if let Some(code) = code {
        service.set_currency(code).await?;
    }
    println!(
        "{}: {}",
        ui::style_text("Display currency", ui::StyleType::TotalLabel),
        ui::style_text(&service.current_currency(), ui::StyleType::TotalValue)
    );
    Ok(())
}

pub fn run_currencies(service: &CurrencyService) -> Result<()> {
    println!(
        "{}",
        display_currencies(service.list_supported_currencies(), &service.current_currency())
    );
    Ok(())
}

pub fn run_rates(service: &CurrencyService) -> Result<()> {
    let cache = service.cache();
    println!("{}", display_snapshot(cache.get().as_deref(), cache.now_ms()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::SUPPORTED_CURRENCIES;
    use crate::core::trigger::Trigger;
    use std::collections::HashMap;

    #[test]
    fn test_display_currencies_marks_selection() {
        let output = display_currencies(&SUPPORTED_CURRENCIES, "GBP");
        let selected_line = output.lines().find(|l| l.contains("GBP")).unwrap();
        assert!(selected_line.contains('*'));
        let other_line = output.lines().find(|l| l.contains("USD")).unwrap();
        assert!(!other_line.contains('*'));
    }

    #[test]
    fn test_display_snapshot() {
        let snapshot = RateSnapshot {
            base_currency: "EUR".to_string(),
            rates: HashMap::from([("USD".to_string(), 1.25)]),
            timestamp: 1_000,
            last_fetch_trigger: Trigger::PageEntry,
            is_stale: true,
        };

        let output = display_snapshot(Some(&snapshot), 1_000 + 125_000);

        assert!(output.contains("Per 1 EUR"));
        assert!(output.contains("1.250000"));
        assert!(output.contains("2m5s ago"));
        assert!(output.contains("stale"));
        assert!(display_snapshot(None, 0).contains("No cached rates"));
    }
}
