//! Autoregressive model fitting and one-sided filtering.

use crate::error::{PipelineError, PipelineResult};
use crate::stats::compute_mean;
use arima::{acf, estimate};
use serde::{Deserialize, Serialize};
use std::iter;

/// Autoregressive model selected by BIC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArModel {
    /// Selected order `p`, `1 <= p <= max_order`.
    pub order: usize,
    /// Coefficients `a_1..a_p`.
    pub coefficients: Vec<f64>,
    /// Innovation variance at the selected order.
    pub sigma2: f64,
    /// BIC at the selected order.
    pub bic: f64,
}

/// Fit AR models of order `1..=max_order` by Yule-Walker and keep the one
/// with the smallest `n ln(sigma2) + p ln(n)`.
///
/// `sigma2` is the mean squared residual over the observations with a full
/// `p`-value history. Ties keep the smaller order.
///
/// # Errors
/// - [`PipelineError::InvalidParameter`] if `max_order == 0`.
/// - [`PipelineError::InsufficientHistory`] if `vals.len() < max_order + 2`.
/// - [`PipelineError::DegenerateSeries`] if the series has no variation.
/// - [`PipelineError::NumericalFailure`] if a fit fails or goes non-finite.
pub fn fit_yule_walker(vals: &[f64], max_order: usize) -> PipelineResult<ArModel> {
    if max_order == 0 {
        return Err(PipelineError::InvalidParameter(
            "AR order search needs max_order >= 1".into(),
        ));
    }
    let n_vals = vals.len();
    let required = max_order + 2;
    if n_vals < required {
        return Err(PipelineError::InsufficientHistory {
            required,
            actual: n_vals,
        });
    }

    let mean = compute_mean(vals);
    let centered: Vec<_> = vals.iter().map(|&val| val - mean).collect();
    let var = centered.iter().map(|val| val * val).sum::<f64>() / n_vals as f64;
    if !(var > 0.0) {
        return Err(PipelineError::DegenerateSeries(
            "AR fit input has zero variance".into(),
        ));
    }

    let ln_n = (n_vals as f64).ln();
    let mut best: Option<ArModel> = None;

    for order in 1..=max_order {
        let (coefficients, _) = acf::ar(&centered, Some(order)).map_err(|err| {
            PipelineError::NumericalFailure(format!("Yule-Walker fit of order {order}: {err}"))
        })?;
        if coefficients.len() != order || coefficients.iter().any(|a| !a.is_finite()) {
            return Err(PipelineError::NumericalFailure(format!(
                "Yule-Walker fit of order {order} gave coefficients {coefficients:?}"
            )));
        }

        let resid = full_history_residuals(&centered, &coefficients)?;
        let sigma2 = resid.iter().map(|e| e * e).sum::<f64>() / resid.len() as f64;
        if !sigma2.is_finite() {
            return Err(PipelineError::NumericalFailure(format!(
                "residual variance of order {order} is not finite"
            )));
        }

        // A perfectly predictable series: nothing higher can improve on it.
        if sigma2 <= f64::EPSILON * var {
            log::debug!("AR fit reached zero innovation variance at order {order}");
            return Ok(ArModel {
                order,
                coefficients,
                sigma2,
                bic: f64::NEG_INFINITY,
            });
        }

        let bic = n_vals as f64 * sigma2.ln() + order as f64 * ln_n;
        log::trace!("AR order {order}: sigma2 = {sigma2:e}, bic = {bic:.4}");
        if best.as_ref().is_none_or(|model| bic < model.bic) {
            best = Some(ArModel {
                order,
                coefficients,
                sigma2,
                bic,
            });
        }
    }

    best.ok_or_else(|| PipelineError::NumericalFailure("no AR order could be evaluated".into()))
}

/// Apply the one-sided filter `y[t] = x[t] - a_1 x[t-1] - ... - a_p x[t-p]`.
///
/// The first `p` outputs lack history and are `None`.
pub fn ar_filter(vals: &[f64], coefficients: &[f64]) -> PipelineResult<Vec<Option<f64>>> {
    let resid = full_history_residuals(vals, coefficients)?;
    let n_missing = vals.len() - resid.len();
    Ok(iter::repeat_n(None, n_missing)
        .chain(resid.into_iter().map(Some))
        .collect())
}

/// Residuals at `t >= p`, the only ones with a full `p`-value history.
fn full_history_residuals(vals: &[f64], coefficients: &[f64]) -> PipelineResult<Vec<f64>> {
    let n_full = vals.len().saturating_sub(coefficients.len());
    if n_full == 0 {
        return Ok(Vec::new());
    }

    let resid = estimate::residuals(vals, 0.0, Some(coefficients), None)
        .map_err(|err| PipelineError::NumericalFailure(format!("AR residuals failed: {err}")))?;
    if resid.len() < n_full {
        return Err(PipelineError::NumericalFailure(format!(
            "expected {n_full} AR residuals, got {}",
            resid.len()
        )));
    }
    Ok(resid[resid.len() - n_full..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_chacha::ChaCha12Rng;
    use rand_distr::StandardNormal;

    fn ar1(phi: f64, n_vals: usize, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        let mut prev = 0.0;
        (0..n_vals + 100)
            .map(|_| {
                let noise: f64 = rng.sample(StandardNormal);
                prev = phi * prev + noise;
                prev
            })
            .skip(100)
            .collect()
    }

    fn lag_one_autocorrelation(vals: &[f64]) -> f64 {
        let mean = compute_mean(vals);
        let centered: Vec<_> = vals.iter().map(|&val| val - mean).collect();
        let acov_0: f64 = centered.iter().map(|val| val * val).sum();
        let acov_1: f64 = centered[1..].iter().zip(&centered).map(|(a, b)| a * b).sum();
        acov_1 / acov_0
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let vals = ar1(0.7, 2000, 11);
        let model = fit_yule_walker(&vals, 5).expect("fit succeeds");
        assert!((1..=5).contains(&model.order));
        assert_eq!(model.coefficients.len(), model.order);
        assert_abs_diff_eq!(model.coefficients[0], 0.7, epsilon = 0.1);
        assert!(model.sigma2 > 0.5 && model.sigma2 < 1.5);
    }

    #[test]
    fn order_one_matches_lag_one_autocorrelation() {
        let vals = ar1(-0.4, 300, 3);
        let model = fit_yule_walker(&vals, 1).expect("fit succeeds");
        assert_eq!(model.order, 1);
        assert_abs_diff_eq!(
            model.coefficients[0],
            lag_one_autocorrelation(&vals),
            epsilon = 0.01
        );
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            fit_yule_walker(&[1.0, 2.0, 3.0], 0),
            Err(PipelineError::InvalidParameter(_))
        ));
        assert_eq!(
            fit_yule_walker(&[1.0, 2.0, 3.0], 2),
            Err(PipelineError::InsufficientHistory {
                required: 4,
                actual: 3
            })
        );
        assert!(matches!(
            fit_yule_walker(&[2.0; 20], 3),
            Err(PipelineError::DegenerateSeries(_))
        ));
    }

    #[test]
    fn filter_leaves_leading_gaps() {
        let vals = [1.0, 2.0, 4.0, 7.0, 11.0];
        let out = ar_filter(&vals, &[0.5, 0.25]).expect("filter succeeds");
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_abs_diff_eq!(out[2].expect("full history"), 4.0 - 0.5 * 2.0 - 0.25 * 1.0);
        assert_abs_diff_eq!(out[3].expect("full history"), 7.0 - 0.5 * 4.0 - 0.25 * 2.0);
        assert_abs_diff_eq!(out[4].expect("full history"), 11.0 - 0.5 * 7.0 - 0.25 * 4.0);
    }

    #[test]
    fn filter_of_short_series_is_all_gaps() {
        let out = ar_filter(&[1.0, 2.0], &[0.5, 0.25]).expect("filter succeeds");
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn filter_whitens_its_own_process() {
        let vals = ar1(0.8, 1000, 5);
        let model = fit_yule_walker(&vals, 3).expect("fit succeeds");
        let resid: Vec<_> = ar_filter(&vals, &model.coefficients)
            .expect("filter succeeds")
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(resid.len(), 1000 - model.order);
        assert!(lag_one_autocorrelation(&resid).abs() < 0.15);
    }
}
