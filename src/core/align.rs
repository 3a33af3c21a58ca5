//! Date-keyed joins across series.
//!
//! Matching is by exact period key only. Rows come out in the reference
//! series' order, which is ascending by date.

use crate::core::series::{PeriodKey, Series};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// One reference observation and, for each companion, its value in the same period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedRow<const N: usize> {
    pub date: PeriodKey,
    pub reference: Decimal,
    pub companions: [Option<Decimal>; N],
}

impl<const N: usize> AlignedRow<N> {
    /// All companion values, or `None` if any companion has no value for this period.
    pub fn complete(&self) -> Option<[Decimal; N]> {
        let mut values = [Decimal::ZERO; N];
        for (slot, value) in values.iter_mut().zip(self.companions) {
            *slot = value?;
        }
        Some(values)
    }
}

/// Left join of `reference` against every companion.
pub fn align<'a, const N: usize>(
    reference: &'a Series,
    companions: [&'a Series; N],
) -> impl Iterator<Item = AlignedRow<N>> + 'a {
    reference.iter().map(move |obs| AlignedRow {
        date: obs.date,
        reference: obs.value,
        companions: companions.map(|series| series.get(&obs.date)),
    })
}

/// Periods present in every given series.
pub fn common_periods(series: &[&Series]) -> BTreeSet<PeriodKey> {
    let Some((first, rest)) = series.split_first() else {
        return BTreeSet::new();
    };
    first
        .iter()
        .map(|obs| obs.date)
        .filter(|date| rest.iter().all(|s| s.contains(date)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::Observation;
    use chrono::NaiveDate;
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

    #[test]
    fn test_align_marks_missing_companions() {
        let reference = series(&[(2020, dec!(1)), (2021, dec!(2)), (2022, dec!(3))]);
        let a = series(&[(2020, dec!(10)), (2022, dec!(30))]);
        let b = series(&[(2021, dec!(200)), (2022, dec!(300))]);

        let rows: Vec<_> = align(&reference, [&a, &b]).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].companions, [Some(dec!(10)), None]);
        assert_eq!(rows[1].companions, [None, Some(dec!(200))]);
        assert_eq!(rows[2].complete(), Some([dec!(30), dec!(300)]));
        assert_eq!(rows[0].complete(), None);
    }

    #[test]
    fn test_complete_rows_are_intersection() {
        let reference = series(&[
            (2019, dec!(1)),
            (2020, dec!(2)),
            (2021, dec!(3)),
            (2022, dec!(4)),
        ]);
        let a = series(&[
            (2018, dec!(0)),
            (2020, dec!(20)),
            (2021, dec!(30)),
            (2022, dec!(40)),
        ]);
        let b = series(&[
            (2019, dec!(100)),
            (2021, dec!(300)),
            (2022, dec!(400)),
            (2023, dec!(0)),
        ]);

        let joined: Vec<PeriodKey> = align(&reference, [&a, &b])
            .filter(|row| row.complete().is_some())
            .map(|row| row.date)
            .collect();
        let expected: Vec<PeriodKey> = common_periods(&[&reference, &a, &b]).into_iter().collect();
        assert_eq!(joined, vec![year_end(2021), year_end(2022)]);
        assert_eq!(joined, expected);
    }

    #[test]
    fn test_align_order_is_stable() {
        let reference = series(&[(2022, dec!(3)), (2020, dec!(1)), (2021, dec!(2))]);
        let other = series(&[(2020, dec!(1)), (2021, dec!(2)), (2022, dec!(3))]);

        let first: Vec<_> = align(&reference, [&other]).collect();
        let second: Vec<_> = align(&reference, [&other]).collect();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_common_periods_edge_cases() {
        assert!(common_periods(&[]).is_empty());
        let only = series(&[(2020, dec!(1))]);
        assert_eq!(common_periods(&[&only]).len(), 1);
        assert!(common_periods(&[&only, &Series::new()]).is_empty());
    }
}
