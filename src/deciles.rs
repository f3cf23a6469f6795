//! Fixed decile weighting used to size the value-per-acre buckets.
//!
//! Decile 1 carries 20%, decile 10 carries 1%, and deciles 2..=9 step down
//! linearly so the ten weights add up to exactly 100%.

pub const FIRST_PERCENT: f64 = 20.0;
pub const LAST_PERCENT: f64 = 1.0;

/// Percentage left for deciles 2..=9 divided by the sum of their
/// coefficients (9 + 8 + ... + 2 = 44).
pub const STEP: f64 = (100.0 - FIRST_PERCENT - LAST_PERCENT) / 44.0;

pub fn decile_percentages() -> [f64; 10] {
    let mut percentages = [0.0; 10];
    percentages[0] = FIRST_PERCENT;
    percentages[9] = LAST_PERCENT;
    for decile in 2..=9 {
        let coefficient = (11 - decile) as f64;
        percentages[decile - 1] = coefficient * STEP;
    }
    percentages
}

/// Report lines, one per decile, followed by the running total.
pub fn decile_report() -> Vec<String> {
    let mut lines = Vec::with_capacity(11);
    let mut total = 0.0;
    for (i, value) in decile_percentages().iter().enumerate() {
        total += value;
        lines.push(format!("Decile {}: {:.4}%", i + 1, value));
    }
    lines.push(format!("Total sum: {total:.4}%"));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_fixed() {
        let report = decile_report();
        assert_eq!(report[0], "Decile 1: 20.0000%");
        assert_eq!(report[9], "Decile 10: 1.0000%");
    }

    #[test]
    fn weights_sum_to_one_hundred() {
        let total: f64 = decile_percentages().iter().sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(decile_report()[10], "Total sum: 100.0000%");
    }

    #[test]
    fn middle_deciles_decrease() {
        let p = decile_percentages();
        assert!(p.windows(2).all(|w| w[0] > w[1]));
        assert!((p[1] - 9.0 * 79.0 / 44.0).abs() < 1e-12);
    }
}
