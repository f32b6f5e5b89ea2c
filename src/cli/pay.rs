use super::ui;
use crate::core::conversion::ConversionResult;
use crate::service::CurrencyService;
use anyhow::Result;
use comfy_table::Cell;

pub fn display_quote(result: &ConversionResult) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
    table.add_row(vec![
        Cell::new("Charge"),
        ui::amount_cell(result.amount, &result.from),
    ]);
    table.add_row(vec![
        Cell::new("Rate"),
        ui::format_optional_cell(result.effective_rate, |r| format!("{r:.6}")),
    ]);
    table.add_row(vec![
        Cell::new("Path"),
        Cell::new(result.path.map_or("-".to_string(), |p| p.to_string())),
    ]);

    format!(
        "{}\n{}\n\n{}: {}",
        ui::style_text("Payment quote", ui::StyleType::Title),
        table,
        ui::style_text("Amount due", ui::StyleType::TotalLabel),
        ui::style_text(
            &format!("{:.2} {}", result.converted_amount, result.currency),
            ui::StyleType::TotalValue
        )
    )
}

pub async fn run_pay(service: &CurrencyService, amount: f64, from: &str, to: &str) -> Result<()> {
    let spinner = ui::new_spinner("Checking exchange rates...");
    let quote = service.calculate_payment_amount(amount, from, to).await;
    spinner.finish_and_clear();

    let quote = quote?;
    println!("{}", display_quote(&quote));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversion::RatePath;

    #[test]
    fn test_display_quote() {
        let result = ConversionResult {
            amount: 40.0,
            from: "EUR".to_string(),
            to: "JPY".to_string(),
            converted_amount: 6400.0,
            currency: "JPY".to_string(),
            effective_rate: Some(160.0),
            path: Some(RatePath::FromBase),
        };

        let output = display_quote(&result);

        assert!(output.contains("40.00 EUR"));
        assert!(output.contains("160.000000"));
        assert!(output.contains("6400.00 JPY"));
    }
}
