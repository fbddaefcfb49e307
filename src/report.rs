use itertools::Itertools;

use crate::integration::EstimateTable;

/// Most significant digits needed to identify an `f64`.
const MAX_DIGITS: u32 = f64::DIGITS + 2;

/// Round `x` to `digits` significant decimal digits.
///
/// `x` is returned unchanged if `digits` is zero or at least as large as the
/// precision of an `f64`.
pub fn round_significant(x: f64, digits: u32) -> f64 {
    if x == 0. || !x.is_finite() || digits == 0 || digits >= MAX_DIGITS {
        return x;
    }
    let decimals = digits as i32 - 1 - x.abs().log10().floor() as i32;
    if decimals > f64::MAX_10_EXP {
        return x;
    }
    if decimals >= 0 {
        let factor = 10f64.powi(decimals);
        (x * factor).round() / factor
    } else {
        let factor = 10f64.powi(-decimals);
        (x / factor).round() * factor
    }
}

/// One line per rung: the rounded estimates separated by spaces, a tab and the rounded mean.
pub fn format_table(table: &EstimateTable, digits: u32) -> String {
    let mut out = String::new();
    for (rung, (_, row)) in table.rows().enumerate() {
        let values = row.iter().map(|value| round_significant(*value, digits)).join(" ");
        out.push_str(&format!(
            "{} \t{}\n",
            values,
            round_significant(table.rung_mean(rung), digits)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        density::UnitDisk,
        integration::{sweep, BoxDomain},
        lcg::Lcg,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn significant_digits() {
        assert_eq!(round_significant(3.14159265, 6), 3.14159);
        assert_eq!(round_significant(0.000123456789, 3), 0.000123);
        assert_eq!(round_significant(123456.0, 2), 120000.);
        assert_eq!(round_significant(-2.71828, 3), -2.72);
        assert_eq!(round_significant(0., 6), 0.);
    }

    #[test]
    fn excess_digits_keep_value() {
        for x in [3.14159, -2.5e-300, 1e300, 4.9e-324] {
            assert_eq!(round_significant(x, 400), x);
            assert_eq!(round_significant(x, u32::MAX), x);
        }
        assert_eq!(round_significant(1.5e-320, 3), 1.5e-320);
        assert!(round_significant(2.7182818, 17).is_finite());
    }

    #[test]
    fn table_layout() {
        let domain = BoxDomain::<2>::symmetric(1.).unwrap();
        let table = sweep(&UnitDisk::default(), &domain, &[4, 8], 3, |idx| {
            Lcg::with_seed(idx).unwrap()
        })
        .unwrap();
        let text = format_table(&table, 6);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let (values, mean) = line.split_once('\t').unwrap();
            assert_eq!(values.split_whitespace().count(), 3);
            assert!(mean.parse::<f64>().is_ok());
        }
    }
}
