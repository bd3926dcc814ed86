use crate::error::{PipelineError, PipelineResult};
use crate::stats::compute_mean;

/// Two-sided 95% normal critical value.
pub const Z_95: f64 = 1.96;

/// Sample cross-correlation of `x` and `y` for lags `-max_lag..=max_lag`.
///
/// The value at lag `k` estimates `cor(x[t + k], y[t])`, normalized by the
/// lag-zero variances so every value lies in `[-1, 1]`. A negative `k`
/// therefore pairs earlier `x` values with later `y` values.
///
/// # Errors
/// - [`PipelineError::InvalidInputShape`] if the lengths differ.
/// - [`PipelineError::InsufficientHistory`] if `max_lag >= n`.
/// - [`PipelineError::DegenerateSeries`] if either series is constant.
pub fn cross_correlation(x: &[f64], y: &[f64], max_lag: usize) -> PipelineResult<Vec<(i64, f64)>> {
    let n_vals = x.len();
    if y.len() != n_vals {
        return Err(PipelineError::InvalidInputShape(format!(
            "cross-correlation needs equal lengths, got {} and {}",
            n_vals,
            y.len()
        )));
    }
    if n_vals <= max_lag {
        return Err(PipelineError::InsufficientHistory {
            required: max_lag + 1,
            actual: n_vals,
        });
    }

    let (x_mean, y_mean) = (compute_mean(x), compute_mean(y));
    let x_c: Vec<_> = x.iter().map(|&val| val - x_mean).collect();
    let y_c: Vec<_> = y.iter().map(|&val| val - y_mean).collect();

    let x_ss: f64 = x_c.iter().map(|val| val * val).sum();
    let y_ss: f64 = y_c.iter().map(|val| val * val).sum();
    if !(x_ss > 0.0 && y_ss > 0.0) {
        return Err(PipelineError::DegenerateSeries(
            "cross-correlation input has zero variance".into(),
        ));
    }
    let norm = (x_ss * y_ss).sqrt();

    let max_lag = max_lag as i64;
    let ccf = (-max_lag..=max_lag)
        .map(|lag| {
            let shift = lag.unsigned_abs() as usize;
            let cov: f64 = if lag >= 0 {
                x_c[shift..].iter().zip(&y_c).map(|(a, b)| a * b).sum()
            } else {
                x_c.iter().zip(&y_c[shift..]).map(|(a, b)| a * b).sum()
            };
            // Rounding can push a perfect correlation a hair past one.
            (lag, (cov / norm).clamp(-1.0, 1.0))
        })
        .collect();

    Ok(ccf)
}

/// Large-sample significance threshold `1.96 / sqrt(n)`.
pub fn significance_threshold(n_obs: usize) -> f64 {
    Z_95 / (n_obs as f64).sqrt()
}

/// `threshold` carrying the sign of `ccf`, or `0.0` when `ccf` is zero.
pub fn signed_threshold(threshold: f64, ccf: f64) -> f64 {
    if ccf > 0.0 {
        threshold
    } else if ccf < 0.0 {
        -threshold
    } else {
        0.0
    }
}
