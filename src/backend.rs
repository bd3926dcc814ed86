use crate::ar::{ArModel, ar_filter, fit_yule_walker};
use crate::correlation::cross_correlation;
use crate::error::PipelineResult;
use crate::stationarity::{kpss_diff_order, seasonal_diff_order};

/// Statistical primitives consumed by the prewhitening pipeline.
///
/// Implementations must be deterministic: the same input always yields the
/// same output.
pub trait Backend {
    /// Seasonal differences needed for `vals` at the given `period`.
    fn seasonal_diff_order(&self, vals: &[f64], period: usize) -> PipelineResult<usize>;

    /// First differences needed for `vals` to look stationary.
    fn diff_order(&self, vals: &[f64]) -> PipelineResult<usize>;

    /// Fit an AR model, searching orders `1..=max_order`.
    fn fit_ar(&self, vals: &[f64], max_order: usize) -> PipelineResult<ArModel>;

    /// One-sided AR filter; the first `coefficients.len()` outputs are `None`.
    fn filter(&self, vals: &[f64], coefficients: &[f64]) -> PipelineResult<Vec<Option<f64>>> {
        ar_filter(vals, coefficients)
    }

    /// Cross-correlation for lags `-max_lag..=max_lag`, in lag order.
    fn ccf(&self, x: &[f64], y: &[f64], max_lag: usize) -> PipelineResult<Vec<(i64, f64)>>;
}

/// Native backend: KPSS and seasonal-strength oracles, `arima` Yule-Walker
/// fits selected by BIC, and the sample cross-correlation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultBackend {
    /// Cap on ordinary differences.
    pub max_diffs: usize,
    /// Cap on seasonal differences.
    pub max_seasonal_diffs: usize,
}

impl Default for DefaultBackend {
    fn default() -> Self {
        Self {
            max_diffs: 2,
            max_seasonal_diffs: 1,
        }
    }
}

impl Backend for DefaultBackend {
    fn seasonal_diff_order(&self, vals: &[f64], period: usize) -> PipelineResult<usize> {
        Ok(seasonal_diff_order(vals, period, self.max_seasonal_diffs))
    }

    fn diff_order(&self, vals: &[f64]) -> PipelineResult<usize> {
        Ok(kpss_diff_order(vals, self.max_diffs))
    }

    fn fit_ar(&self, vals: &[f64], max_order: usize) -> PipelineResult<ArModel> {
        fit_yule_walker(vals, max_order)
    }

    fn ccf(&self, x: &[f64], y: &[f64], max_lag: usize) -> PipelineResult<Vec<(i64, f64)>> {
        cross_correlation(x, y, max_lag)
    }
}
