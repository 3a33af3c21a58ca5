use super::ui;
use crate::core::decimal::{SCALE, divide, to_percent};
use anyhow::Result;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_finprim::rate::cagr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceGrowth {
    pub years: u32,
    /// End price as a multiple of the start price.
    pub multiple: Decimal,
    /// Compound annual growth rate in percent.
    pub annual_percent: Decimal,
}

pub fn price_growth(
    start_year: i32,
    end_year: i32,
    start_price: Decimal,
    end_price: Decimal,
) -> Result<PriceGrowth> {
    let years = u32::try_from(end_year - start_year)
        .ok()
        .filter(|y| *y > 0)
        .ok_or_else(|| anyhow::anyhow!("End year must be after start year"))?;
    if start_price <= Decimal::ZERO || end_price <= Decimal::ZERO {
        anyhow::bail!("Prices must be positive");
    }

    let multiple = divide(end_price, start_price)?;
    let rate = cagr(start_price, end_price, Decimal::from(years))
        .round_dp_with_strategy(SCALE, RoundingStrategy::MidpointNearestEven);
    debug!(years, %multiple, %rate, "Computed price growth");

    Ok(PriceGrowth {
        years,
        multiple,
        annual_percent: to_percent(rate)?,
    })
}

pub fn run(start_year: i32, end_year: i32, start_price: Decimal, end_price: Decimal) -> Result<()> {
    let growth = price_growth(start_year, end_year, start_price, end_price)?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Years"),
        ui::header_cell("Price growth"),
        ui::header_cell("Average annual growth"),
    ]);
    table.add_row(vec![
        comfy_table::Cell::new(growth.years),
        ui::decimal_cell(growth.multiple.round_dp(2), "x"),
        ui::decimal_cell(growth.annual_percent.round_dp(2), "%"),
    ]);
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_single_year_growth() {
        let growth = price_growth(2020, 2021, dec!(100), dec!(110)).unwrap();
        assert_eq!(growth.years, 1);
        assert_eq!(growth.multiple, dec!(1.1));
        assert!((growth.annual_percent - dec!(10)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_compound_growth() {
        let growth = price_growth(2010, 2012, dec!(100), dec!(121)).unwrap();
        assert_eq!(growth.years, 2);
        assert_eq!(growth.multiple, dec!(1.21));
        assert!((growth.annual_percent - dec!(10)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(price_growth(2020, 2020, dec!(100), dec!(110)).is_err());
        assert!(price_growth(2021, 2020, dec!(100), dec!(110)).is_err());
        let err = price_growth(2020, 2021, dec!(0), dec!(110)).unwrap_err();
        assert_eq!(err.to_string(), "Prices must be positive");
    }
}
