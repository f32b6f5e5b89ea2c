use super::ui;
use crate::core::conversion::{ConversionResult, PriceItem};
use crate::core::currency::normalize_code;
use crate::service::CurrencyService;
use anyhow::{Context, Result, anyhow};
use comfy_table::Cell;

/// Parses `AMOUNT:CODE` (e.g. `120.50:GBP`).
pub fn parse_item(raw: &str) -> Result<PriceItem> {
    let (amount, code) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Expected AMOUNT:CURRENCY, got '{raw}'"))?;
    let amount: f64 = amount
        .trim()
        .parse()
        .with_context(|| format!("Invalid amount in '{raw}'"))?;
    Ok(PriceItem::new(amount, &normalize_code(code)))
}

fn path_label(result: &ConversionResult) -> String {
    result
        .path
        .map_or("unavailable".to_string(), |p| p.to_string())
}

pub fn display_results(results: &[ConversionResult], target: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Amount"),
        ui::header_cell(&format!("Converted ({target})")),
        ui::header_cell("Rate"),
        ui::header_cell("Path"),
    ]);

    for result in results {
        let converted = if result.is_converted() {
            ui::amount_cell(result.converted_amount, &result.currency)
        } else {
            Cell::new(ui::style_text(
                &format!("{:.2} {}", result.converted_amount, result.currency),
                ui::StyleType::Error,
            ))
        };
        table.add_row(vec![
            ui::amount_cell(result.amount, &result.from),
            converted,
            ui::format_optional_cell(result.effective_rate, |r| format!("{r:.6}")),
            Cell::new(ui::style_text(&path_label(result), ui::StyleType::Subtle)),
        ]);
    }

    let converted_total: f64 = results
        .iter()
        .filter(|r| r.is_converted())
        .map(|r| r.converted_amount)
        .sum();
    let skipped = results.iter().filter(|r| !r.is_converted()).count();

    let mut output = table.to_string();
    output.push_str(&format!(
        "\n\nTotal ({}): {}",
        ui::style_text(target, ui::StyleType::TotalLabel),
        ui::style_text(&format!("{converted_total:.2}"), ui::StyleType::TotalValue)
    ));
    if skipped > 0 {
        output.push_str(&ui::style_text(
            &format!("\n{skipped} item(s) shown in their own currency, no rate available"),
            ui::StyleType::Error,
        ));
    }
    output
}

pub async fn run_convert(
    service: &CurrencyService,
    amount: f64,
    from: &str,
    to: Option<&str>,
) -> Result<()> {
    let result = service.convert_async(amount, from, to).await;
    let target = result.to.clone();
    println!("{}", display_results(&[result], &target));
    Ok(())
}

pub fn run_bulk(service: &CurrencyService, items: &[String], to: Option<&str>) -> Result<()> {
    let items = items
        .iter()
        .map(|raw| parse_item(raw))
        .collect::<Result<Vec<_>>>()?;
    let target = to.map_or_else(|| service.current_currency(), normalize_code);
    let results = service.calculate_bulk(&items, &target);
    println!("{}", display_results(&results, &target));
    Ok(())
}
