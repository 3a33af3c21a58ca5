use super::ui;
use crate::core::quote::{CompositeQuote, PriceHistory, QuoteSnapshot};
use crate::core::ratios::{
    BookValue, Calculator, DebtToEquity, EarningsPerShare, FreeCashFlow, FreeCashFlowPoint,
    PerSharePoint, RatioPoint, ReturnOnAssets, ReturnOnEquity, ReturnOnTotalCapital, loss_years,
};
use crate::core::series::{Metric, Series};
use crate::core::{FetchWindow, QuoteLoader};
use anyhow::Result;
use comfy_table::{Cell, Table};
use futures::future::join_all;

/// Every ratio derived from one composite quote.
pub struct RatioReport {
    pub quote: CompositeQuote,
    pub roe: Vec<RatioPoint>,
    pub rotc: Vec<RatioPoint>,
    pub roa: Vec<RatioPoint>,
    pub eps: Vec<PerSharePoint>,
    pub dte: Vec<RatioPoint>,
    pub book_value: Vec<PerSharePoint>,
    pub fcf: Vec<FreeCashFlowPoint>,
}

impl RatioReport {
    pub fn from_quote(quote: CompositeQuote) -> Self {
        RatioReport {
            roe: ReturnOnEquity.calculate(&quote),
            rotc: ReturnOnTotalCapital::default().calculate(&quote),
            roa: ReturnOnAssets.calculate(&quote),
            eps: EarningsPerShare.calculate(&quote),
            dte: DebtToEquity.calculate(&quote),
            book_value: BookValue.calculate(&quote),
            fcf: FreeCashFlow.calculate(&quote),
            quote,
        }
    }

    pub fn display_as_text(&self) -> String {
        let snapshot = &self.quote.snapshot;
        let mut output = format!(
            "{} ({})\n\n",
            ui::style_text(&snapshot.name, ui::StyleType::Title),
            self.quote.ticker
        );
        output.push_str(&company_panel(snapshot).to_string());

        push_section(
            &mut output,
            "Return on equity",
            ratio_table("ROE", &self.roe, "%"),
        );
        let losses = loss_years(&self.roe);
        if !losses.is_empty() {
            let years = losses
                .iter()
                .map(i32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            output.push_str(&format!(
                "\n{}",
                ui::style_text(&format!("Loss-making years: {years}"), ui::StyleType::Alert)
            ));
        }

        push_section(
            &mut output,
            "Return on total capital",
            ratio_table("ROTC", &self.rotc, "%"),
        );
        push_section(
            &mut output,
            "Return on assets",
            ratio_table("ROA", &self.roa, "%"),
        );
        push_section(
            &mut output,
            "Earnings per share",
            per_share_table("EPS", &self.eps),
        );
        push_section(
            &mut output,
            "Debt to equity",
            ratio_table("D/E", &self.dte, ""),
        );
        push_section(
            &mut output,
            "Book value per share",
            per_share_table("Book value", &self.book_value),
        );
        push_section(&mut output, "Free cash flow", fcf_table(&self.fcf));
        push_section(
            &mut output,
            "Shares issued",
            shares_table(self.quote.series(Metric::SharesIssued)),
        );

        if let Some(history) = &self.quote.price_history {
            push_section(
                &mut output,
                "Price history",
                price_history_table(history, &snapshot.currency),
            );
            for split in history.splits.iter().rev() {
                output.push_str(&format!(
                    "\n{}",
                    ui::style_text(
                        &format!(
                            "Split on {}: {}:{}",
                            split.date, split.numerator, split.denominator
                        ),
                        ui::StyleType::Subtle
                    )
                ));
            }
        }

        output
    }
}

fn push_section(output: &mut String, title: &str, table: Option<Table>) {
    output.push_str(&format!(
        "\n\n{}\n",
        ui::style_text(title, ui::StyleType::Label)
    ));
    match table {
        Some(table) => output.push_str(&table.to_string()),
        None => output.push_str(&ui::style_text("No complete periods", ui::StyleType::Subtle)),
    }
}

fn company_panel(snapshot: &QuoteSnapshot) -> Table {
    let mut table = ui::new_styled_table();
    let currency = &snapshot.currency;
    let rows = [
        ("Exchange", Cell::new(&snapshot.exchange)),
        (
            "Type",
            Cell::new(snapshot.quote_type.as_deref().unwrap_or("N/A")),
        ),
        ("Currency", Cell::new(currency)),
        ("Price", ui::decimal_cell(snapshot.price, "")),
        (
            "Trailing P/E",
            ui::format_optional_cell(snapshot.trailing_pe, |pe| pe.round_dp(2).to_string()),
        ),
        ("Open", ui::decimal_cell(snapshot.open, "")),
        ("Previous close", ui::decimal_cell(snapshot.previous_close, "")),
    ];
    for (label, value) in rows {
        table.add_row(vec![ui::header_cell(label), value]);
    }
    table
}

fn ratio_table(header: &str, points: &[RatioPoint], suffix: &str) -> Option<Table> {
    if points.is_empty() {
        return None;
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Period"), ui::header_cell(header)]);
    for point in points.iter().rev() {
        table.add_row(vec![
            Cell::new(point.date),
            ui::decimal_cell(point.value, suffix),
        ]);
    }
    Some(table)
}

fn per_share_table(header: &str, points: &[PerSharePoint]) -> Option<Table> {
    let currency = &points.first()?.currency;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Period"),
        ui::header_cell(&format!("{header} ({currency})")),
    ]);
    for point in points.iter().rev() {
        table.add_row(vec![Cell::new(point.date), ui::decimal_cell(point.value, "")]);
    }
    Some(table)
}

fn fcf_table(points: &[FreeCashFlowPoint]) -> Option<Table> {
    let currency = &points.first()?.currency;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Period"),
        ui::header_cell(&format!("FCF ({currency})")),
        ui::header_cell(&format!("Long-term debt ({currency})")),
        ui::header_cell("Payback (years)"),
    ]);
    for point in points.iter().rev() {
        table.add_row(vec![
            Cell::new(point.date),
            ui::decimal_cell(point.free_cash_flow, ""),
            ui::format_optional_cell(point.long_term_debt, |d| d.normalize().to_string()),
            ui::format_optional_cell(point.years_to_payback, |y| y.normalize().to_string()),
        ]);
    }
    Some(table)
}

fn shares_table(shares: &Series) -> Option<Table> {
    if shares.is_empty() {
        return None;
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Period"), ui::header_cell("Shares")]);
    let points: Vec<_> = shares.iter().collect();
    for obs in points.iter().rev() {
        table.add_row(vec![Cell::new(obs.date), ui::decimal_cell(obs.value, "")]);
    }
    Some(table)
}

fn price_history_table(history: &PriceHistory, currency: &str) -> Option<Table> {
    let opens = history.yearly_opens();
    if opens.is_empty() {
        return None;
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Year"),
        ui::header_cell(&format!("Open ({currency})")),
    ]);
    for (year, open) in opens {
        table.add_row(vec![Cell::new(year), ui::decimal_cell(open, "")]);
    }
    Some(table)
}

/// Loads every ticker concurrently and prints one report per ticker.
///
/// A ticker that fails to load is reported and skipped; the command only
/// fails when no ticker could be loaded.
pub async fn run(loader: &dyn QuoteLoader, tickers: &[String], window: &FetchWindow) -> Result<()> {
    let pb = ui::new_progress_bar(tickers.len() as u64, true);
    pb.set_message("Loading quotes...");

    let futures = tickers.iter().map(|ticker| {
        let pb_clone = pb.clone();
        async move {
            let res = loader.load_quote(ticker, window).await;
            pb_clone.inc(1);
            (ticker, res)
        }
    });
    let results = join_all(futures).await;
    pb.finish_and_clear();

    let mut loaded = 0;
    let count = results.len();
    for (i, (ticker, result)) in results.into_iter().enumerate() {
        match result {
            Ok(quote) => {
                loaded += 1;
                println!("{}", RatioReport::from_quote(quote).display_as_text());
            }
            Err(e) => {
                tracing::error!(ticker = %ticker, "Failed to load quote: {e}");
                println!(
                    "{}",
                    ui::style_text(&format!("{ticker}: {e}"), ui::StyleType::Error)
                );
            }
        }
        if i + 1 < count {
            ui::print_separator();
        }
    }

    if loaded == 0 && count > 0 {
        anyhow::bail!("No quotes could be loaded");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{FinanceError, GatewayError};
    use crate::core::quote::{FundamentalsBundle, SplitEvent};
    use crate::core::series::{Observation, PeriodKey};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn year_end(y: i32) -> PeriodKey {
        NaiveDate::from_ymd_opt(y, 12, 31).unwrap()
    }

    fn series(points: &[(i32, Decimal)]) -> Series {
        points
            .iter()
            .map(|(y, v)| Observation::new(year_end(*y), *v))
            .collect()
    }

    fn sample_quote() -> CompositeQuote {
        let fundamentals = FundamentalsBundle::new()
            .with_series(
                Metric::NetIncome,
                series(&[(2022, dec!(-50)), (2023, dec!(100))]),
            )
            .with_series(
                Metric::TotalAssets,
                series(&[(2022, dec!(1000)), (2023, dec!(1000))]),
            )
            .with_series(
                Metric::TotalLiabilities,
                series(&[(2022, dec!(400)), (2023, dec!(400))]),
            )
            .with_series(Metric::SharesIssued, series(&[(2023, dec!(50))]))
            .with_series(Metric::CashFromOperations, series(&[(2023, dec!(500))]))
            .with_series(Metric::CapitalExpenditure, series(&[(2023, dec!(-120))]));

        CompositeQuote {
            ticker: "ACME".to_string(),
            snapshot: QuoteSnapshot {
                name: "Acme Corp".to_string(),
                short_name: Some("Acme".to_string()),
                quote_type: Some("EQUITY".to_string()),
                exchange: "NYQ".to_string(),
                currency: "USD".to_string(),
                price: dec!(42.5),
                trailing_pe: Some(dec!(18.25)),
                open: dec!(42),
                previous_close: dec!(41.75),
            },
            fundamentals,
            price_history: None,
        }
    }

    fn with_history(mut quote: CompositeQuote) -> CompositeQuote {
        let opens: Series = [(2022, 3, dec!(30.5)), (2022, 9, dec!(35.875)), (2023, 1, dec!(41.25))]
            .into_iter()
            .map(|(y, m, v)| Observation::new(NaiveDate::from_ymd_opt(y, m, 1).unwrap(), v))
            .collect();
        quote.price_history = Some(PriceHistory {
            opens,
            splits: vec![SplitEvent {
                date: NaiveDate::from_ymd_opt(2022, 8, 31).unwrap(),
                numerator: 4,
                denominator: 1,
            }],
        });
        quote
    }

    #[test]
    fn test_report_lists_newest_period_first() {
        let report = RatioReport::from_quote(sample_quote());
        assert_eq!(report.roe.len(), 2);

        let text = report.display_as_text();
        assert!(text.contains("Acme Corp"));
        assert!(text.contains("16.6667%"));
        let newest = text.find("2023-12-31").unwrap();
        let oldest = text.find("2022-12-31").unwrap();
        assert!(newest < oldest);
        assert!(text.contains("Loss-making years: 2022"));
    }

    #[test]
    fn test_report_marks_missing_sections() {
        let text = RatioReport::from_quote(sample_quote()).display_as_text();
        assert!(text.contains("EPS (USD)"));
        assert!(text.contains("380"));
        // no long-term debt or equity series
        assert!(text.contains("N/A"));
        assert!(text.contains("No complete periods"));
    }

    #[test]
    fn test_report_shows_shares_and_price_history() {
        let text = RatioReport::from_quote(with_history(sample_quote())).display_as_text();
        assert!(text.contains("Shares issued"));
        assert!(text.contains("Price history"));
        let history = &text[text.find("Price history").unwrap()..];
        assert!(history.contains("Open (USD)"));
        // only the first open of each year is listed
        assert!(history.contains("30.5"));
        assert!(!history.contains("35.875"));
        let newest = history.find("41.25").unwrap();
        let oldest = history.find("30.5").unwrap();
        assert!(newest < oldest);
        assert!(history.contains("Split on 2022-08-31: 4:1"));
    }

    #[test]
    fn test_report_without_history_has_no_price_section() {
        let text = RatioReport::from_quote(sample_quote()).display_as_text();
        assert!(text.contains("Shares issued"));
        assert!(!text.contains("Price history"));
    }

    struct FailingLoader;

    #[async_trait]
    impl QuoteLoader for FailingLoader {
        async fn load_quote(
            &self,
            ticker: &str,
            _window: &FetchWindow,
        ) -> crate::core::error::Result<CompositeQuote> {
            Err(FinanceError::gateway(
                ticker,
                GatewayError::new(Some(404), "Not Found"),
            ))
        }
    }

    #[tokio::test]
    async fn test_run_fails_when_nothing_loads() {
        let tickers = vec!["NOPE".to_string()];
        let result = run(&FailingLoader, &tickers, &FetchWindow::default()).await;
        assert!(result.unwrap_err().to_string().contains("No quotes"));
    }
}
