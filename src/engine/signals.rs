/// Signal normalization for score blending
///
/// Raw relevance signals (ratings, shelf counts, similarities) arrive on
/// incompatible scales. Min-max normalization maps each signal list into
/// [0, 1] before weighting; heavy-tailed signals (popularity counts) are
/// log-compressed first.
///
/// All functions are pure — no I/O, deterministic.

/// Min-max normalization over a slice of values.
///
/// With `use_log`, each value is first mapped `v -> ln(1 + max(0, v))` to
/// compress heavy tails.
///
/// Edge case: if max <= min (all-equal input, including singletons), every
/// output is 0.5 — avoids division by zero and avoids biasing ties toward 0.
/// Empty input returns empty output.
pub fn normalize(values: &[f64], use_log: bool) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let mapped: Vec<f64> = if use_log {
        values.iter().map(|&v| (1.0 + v.max(0.0)).ln()).collect()
    } else {
        values.to_vec()
    };

    let lo = mapped.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = mapped.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if hi <= lo {
        return vec![0.5; mapped.len()];
    }

    mapped.iter().map(|&v| (v - lo) / (hi - lo)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(&[], false).is_empty());
        assert!(normalize(&[], true).is_empty());
    }

    #[test]
    fn test_normalize_singleton_is_half() {
        assert_eq!(normalize(&[42.0], false), vec![0.5]);
    }

    #[test]
    fn test_normalize_all_equal_is_half() {
        assert_eq!(normalize(&[5.0, 5.0, 5.0], false), vec![0.5, 0.5, 0.5]);
        assert_eq!(normalize(&[0.0, 0.0], true), vec![0.5, 0.5]);
    }

    #[test]
    fn test_normalize_range() {
        let result = normalize(&[0.0, 5.0, 10.0], false);
        assert!((result[0] - 0.0).abs() < 1e-12);
        assert!((result[1] - 0.5).abs() < 1e-12);
        assert!((result[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_output_in_unit_interval() {
        let result = normalize(&[-3.0, 0.0, 17.5, 2.2, 9.9], false);
        for v in result {
            assert!((0.0..=1.0).contains(&v), "value {} out of range", v);
        }
    }

    #[test]
    fn test_normalize_log_compresses_tail() {
        // Counts 0, 9, 99: without log the middle lands at ~0.09, with log
        // the spacing between 1 -> 10 and 10 -> 100 is equal.
        let result = normalize(&[0.0, 9.0, 99.0], true);
        assert!((result[0] - 0.0).abs() < 1e-12);
        assert!((result[1] - 0.5).abs() < 1e-12);
        assert!((result[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_log_clamps_negatives() {
        // Negative counts are treated as zero before the log map.
        let result = normalize(&[-5.0, 0.0, 9.0], true);
        assert!((result[0] - 0.0).abs() < 1e-12);
        assert!((result[1] - 0.0).abs() < 1e-12);
        assert!((result[2] - 1.0).abs() < 1e-12);
    }
}
