//! Compensated floating-point accumulation.
//!
//! Extracted into its own module so the summation behavior is testable in
//! isolation; the compositional-extract residual depends on it to conserve
//! mass at double precision over realistic isotope counts.

/// Kahan compensated summation.
///
/// Carries a running compensation term so that the error of each addition
/// is fed back into the next one. A naive left fold loses low-order bits
/// once the running sum dwarfs the addends; with hundreds of isotopes that
/// is enough to break kilogram-level bookkeeping at the 1e-12 tolerance.
pub fn kahan_sum<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for value in values {
        let y = value - compensation;
        let t = sum + y;
        compensation = (t - sum) - y;
        sum = t;
    }
    sum
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_sums_to_zero() {
        assert_eq!(kahan_sum(std::iter::empty()), 0.0);
    }

    #[test]
    fn matches_exact_sum_for_representable_values() {
        let values = [2.5, 2.5, 2.5, 2.5, 0.5];
        assert_eq!(kahan_sum(values.iter().copied()), 10.5);
    }

    #[test]
    fn recovers_low_order_bits_a_naive_fold_loses() {
        // 1.0 followed by 10^7 copies of 1e-16: the naive fold absorbs none
        // of the small addends, Kahan keeps them.
        let values = std::iter::once(1.0).chain(std::iter::repeat(1e-16).take(10_000_000));
        let naive: f64 = std::iter::once(1.0)
            .chain(std::iter::repeat(1e-16).take(10_000_000))
            .sum();
        let compensated = kahan_sum(values);
        let expected = 1.0 + 1e-9;
        assert!((compensated - expected).abs() < 1e-15, "kahan {compensated}");
        assert!((naive - expected).abs() > 1e-10, "naive {naive}");
    }

    #[test]
    fn order_of_magnitude_spread() {
        // Alternating large/small magnitudes still sums to the analytic value.
        let values: Vec<f64> = (0..1000)
            .map(|i| if i % 2 == 0 { 1e10 } else { 1e-10 })
            .collect();
        let total = kahan_sum(values.iter().copied());
        let expected = 500.0 * 1e10 + 500.0 * 1e-10;
        assert!((total - expected).abs() / expected < 1e-15);
    }
}
