//! Stationarity-order oracles: how many ordinary and seasonal differences a
//! series needs.

use crate::stats::{compute_diff, compute_mean};

/// KPSS 5% critical value for level stationarity.
const KPSS_CRIT_5PCT: f64 = 0.463;

/// Seasonal strength above which a seasonal difference is taken.
const SEASONAL_STRENGTH_THRESHOLD: f64 = 0.64;

/// Minimum length for which a KPSS statistic is computed.
const MIN_KPSS_LEN: usize = 4;

/// KPSS statistic for level stationarity.
///
/// Uses a Bartlett-kernel long-run variance with lag truncation
/// `trunc(4 * (n / 100)^0.25)`. Returns `None` for series shorter than
/// four values and `Some(0.0)` for series with no variation.
pub fn kpss_stat(vals: &[f64]) -> Option<f64> {
    let n_vals = vals.len();
    if n_vals < MIN_KPSS_LEN {
        return None;
    }

    let n_lags = (4.0 * (n_vals as f64 / 100.0).powf(0.25)).trunc() as usize;
    let n_lags = n_lags.min(n_vals - 1);

    let mean = compute_mean(vals);
    let resid: Vec<_> = vals.iter().map(|&val| val - mean).collect();

    let mut cum_sum = 0.0;
    let mut cum_sum_2 = 0.0;
    for &r in &resid {
        cum_sum += r;
        cum_sum_2 += cum_sum * cum_sum;
    }

    let mut lr_var = resid.iter().map(|r| r * r).sum::<f64>() / n_vals as f64;
    for lag in 1..=n_lags {
        let weight = 1.0 - lag as f64 / (n_lags + 1) as f64;
        let acov = resid[lag..]
            .iter()
            .zip(resid.iter())
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n_vals as f64;
        lr_var += 2.0 * weight * acov;
    }

    if lr_var <= f64::EPSILON * mean.abs().max(1.0) {
        return Some(0.0);
    }

    Some(cum_sum_2 / (n_vals as f64).powi(2) / lr_var)
}

/// Number of first differences needed for the KPSS test to stop rejecting
/// level stationarity at 5%, capped at `max_diffs`.
pub fn kpss_diff_order(vals: &[f64], max_diffs: usize) -> usize {
    let mut vals = vals.to_vec();
    let mut diffs = 0;
    while diffs < max_diffs {
        match kpss_stat(&vals) {
            Some(stat) if stat > KPSS_CRIT_5PCT => {
                vals = compute_diff(&vals, 1, 1);
                diffs += 1;
            }
            _ => break,
        }
    }
    diffs
}

/// Strength of seasonality from a classical additive decomposition.
///
/// The trend is a centred moving average over one period (a 2x`period`
/// average for even periods), the seasonal component the centred mean of the
/// detrended values at each phase. Returns
/// `max(0, 1 - Var(R) / Var(S + R))`, or `0.0` when the series is too short
/// for two full periods.
pub fn seasonal_strength(vals: &[f64], period: usize) -> f64 {
    let n_vals = vals.len();
    if period < 2 || n_vals < 2 * period {
        return 0.0;
    }

    let trend = centred_moving_average(vals, period);

    let mut phase_sums = vec![0.0; period];
    let mut phase_counts = vec![0usize; period];
    for (i_val, (&val, trend)) in vals.iter().zip(&trend).enumerate() {
        if let Some(trend) = trend {
            phase_sums[i_val % period] += val - trend;
            phase_counts[i_val % period] += 1;
        }
    }
    if phase_counts.contains(&0) {
        return 0.0;
    }
    let mut seasonal: Vec<_> = phase_sums
        .iter()
        .zip(&phase_counts)
        .map(|(&sum, &count)| sum / count as f64)
        .collect();
    let seasonal_mean = compute_mean(&seasonal);
    seasonal.iter_mut().for_each(|s| *s -= seasonal_mean);

    let mut detrended = Vec::with_capacity(n_vals);
    let mut remainder = Vec::with_capacity(n_vals);
    for (i_val, (&val, trend)) in vals.iter().zip(&trend).enumerate() {
        if let Some(trend) = trend {
            detrended.push(val - trend);
            remainder.push(val - trend - seasonal[i_val % period]);
        }
    }

    let var_detrended = biased_var(&detrended);
    if var_detrended <= 0.0 {
        return 0.0;
    }
    (1.0 - biased_var(&remainder) / var_detrended).max(0.0)
}

/// Number of seasonal differences needed while the seasonal strength stays
/// above 0.64, capped at `max_diffs`.
pub fn seasonal_diff_order(vals: &[f64], period: usize, max_diffs: usize) -> usize {
    let mut vals = vals.to_vec();
    let mut diffs = 0;
    while diffs < max_diffs && seasonal_strength(&vals, period) > SEASONAL_STRENGTH_THRESHOLD {
        vals = compute_diff(&vals, period, 1);
        diffs += 1;
    }
    diffs
}

fn centred_moving_average(vals: &[f64], period: usize) -> Vec<Option<f64>> {
    let n_vals = vals.len();
    let half = period / 2;
    let mut trend = vec![None; n_vals];
    for i_val in half..n_vals.saturating_sub(half) {
        let avg = if period % 2 == 1 {
            vals[i_val - half..=i_val + half].iter().sum::<f64>() / period as f64
        } else {
            let inner: f64 = vals[i_val + 1 - half..i_val + half].iter().sum();
            (inner + 0.5 * (vals[i_val - half] + vals[i_val + half])) / period as f64
        };
        trend[i_val] = Some(avg);
    }
    trend
}

fn biased_var(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    let mean = compute_mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / vals.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha12Rng;
    use rand_distr::StandardNormal;
    use std::f64::consts::PI;

    fn pseudo_noise(n_vals: usize) -> Vec<f64> {
        (0..n_vals)
            .map(|i| ((i * 17 + 13) % 97) as f64 / 50.0 - 1.0)
            .collect()
    }

    #[test]
    fn kpss_accepts_noise() {
        let stat = kpss_stat(&pseudo_noise(200)).expect("long enough");
        assert!(stat > 0.0);
        assert!(stat < KPSS_CRIT_5PCT, "stat = {stat}");
    }

    #[test]
    fn kpss_rejects_trend() {
        let vals: Vec<_> = (0..200).map(|i| i as f64).collect();
        let stat = kpss_stat(&vals).expect("long enough");
        assert!(stat > KPSS_CRIT_5PCT, "stat = {stat}");
    }

    #[test]
    fn kpss_short_and_constant() {
        assert_eq!(kpss_stat(&[1.0, 2.0, 3.0]), None);
        assert_eq!(kpss_stat(&[5.0; 50]), Some(0.0));
    }

    #[test]
    fn linear_trend_needs_one_diff() {
        let vals: Vec<_> = (0..150).map(|i| 2.0 + 0.5 * i as f64).collect();
        assert_eq!(kpss_diff_order(&vals, 2), 1);
        assert_eq!(kpss_diff_order(&vals, 0), 0);
    }

    #[test]
    fn random_walk_needs_differencing() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let mut level = 0.0;
        let vals: Vec<f64> = (0..500)
            .map(|_| {
                let step: f64 = rng.sample(StandardNormal);
                level += step;
                level
            })
            .collect();
        assert!(kpss_diff_order(&vals, 2) >= 1);
    }

    #[test]
    fn seasonal_strength_of_sine() {
        let vals: Vec<_> = (0..120)
            .map(|i| (2.0 * PI * i as f64 / 12.0).sin())
            .collect();
        assert!(seasonal_strength(&vals, 12) > 0.95);
        assert_eq!(seasonal_diff_order(&vals, 12, 1), 1);
    }

    #[test]
    fn seasonal_strength_edge_cases() {
        let vals = pseudo_noise(10);
        assert_eq!(seasonal_strength(&vals, 1), 0.0);
        assert_eq!(seasonal_strength(&vals, 12), 0.0);
        assert_eq!(seasonal_strength(&[3.0; 48], 12), 0.0);
        assert_eq!(seasonal_diff_order(&vals, 1, 1), 0);
    }
}
