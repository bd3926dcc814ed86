use arima::util;

/// Compute the sample mean, `NaN` for an empty series.
pub fn compute_mean(time_series: &[f64]) -> f64 {
    if time_series.is_empty() {
        return f64::NAN;
    }
    time_series.iter().sum::<f64>() / time_series.len() as f64
}

/// Apply `order` backward differences at the given `lag`.
///
/// Each pass shortens the series by `lag` values; an empty series comes back
/// when nothing is left.
pub fn compute_diff(time_series: &[f64], lag: usize, order: usize) -> Vec<f64> {
    if order == 0 {
        return time_series.to_vec();
    }
    if time_series.len() <= lag * order {
        return Vec::new();
    }
    if lag == 1 {
        return util::diff(time_series, order);
    }

    let mut vals = time_series.to_vec();
    for _ in 0..order {
        vals = vals[lag..]
            .iter()
            .zip(vals.iter())
            .map(|(cur, prev)| cur - prev)
            .collect();
    }
    vals
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean() {
        assert_relative_eq!(compute_mean(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert!(compute_mean(&[]).is_nan());
    }

    #[test]
    fn diff_shortens_by_lag() {
        let vals = [1.0, 4.0, 9.0, 16.0, 25.0];
        assert_eq!(compute_diff(&vals, 1, 1), vec![3.0, 5.0, 7.0, 9.0]);
        assert_eq!(compute_diff(&vals, 1, 2), vec![2.0, 2.0, 2.0]);
        assert_eq!(compute_diff(&vals, 2, 1), vec![8.0, 12.0, 16.0]);
        assert_eq!(compute_diff(&vals, 2, 2), vec![8.0]);
        assert_eq!(compute_diff(&vals, 1, 0), vals.to_vec());
        assert!(compute_diff(&vals, 5, 1).is_empty());
        assert!(compute_diff(&vals, 1, 5).is_empty());
        assert!(compute_diff(&[], 1, 0).is_empty());
    }
}
