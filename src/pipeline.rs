//! Prewhitened cross-correlation between an input and an output series.
//!
//! One call runs the whole procedure: stationarity orders, differencing,
//! order capping, AR prewhitening, cross-correlation, significance
//! classification, direction and sign filtering, and fallback selection.

use crate::backend::{Backend, DefaultBackend};
use crate::correlation::{signed_threshold, significance_threshold};
use crate::error::{PipelineError, PipelineResult};
use crate::series::{TimeSeries, inner_join};
use crate::stats::compute_diff;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Which side of lag zero to keep, relative to the input series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum KeepInput {
    /// Negative raw lags: the input lagged relative to the output.
    InputLags,
    /// Positive raw lags.
    InputLeads,
    #[default]
    Both,
}

/// Which sign of correlation to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum KeepCcf {
    Positive,
    Negative,
    #[default]
    Both,
}

impl fmt::Display for KeepInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeepInput::InputLags => "input_lags",
            KeepInput::InputLeads => "input_leads",
            KeepInput::Both => "both",
        })
    }
}

impl FromStr for KeepInput {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input_lags" => Ok(KeepInput::InputLags),
            "input_leads" => Ok(KeepInput::InputLeads),
            "both" => Ok(KeepInput::Both),
            _ => Err(PipelineError::InvalidParameter(format!(
                "keep_input must be one of input_lags, input_leads, both, but is {s:?}"
            ))),
        }
    }
}

impl fmt::Display for KeepCcf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeepCcf::Positive => "positive",
            KeepCcf::Negative => "negative",
            KeepCcf::Both => "both",
        })
    }
}

impl FromStr for KeepCcf {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(KeepCcf::Positive),
            "negative" => Ok(KeepCcf::Negative),
            "both" => Ok(KeepCcf::Both),
            _ => Err(PipelineError::InvalidParameter(format!(
                "keep_ccf must be one of positive, negative, both, but is {s:?}"
            ))),
        }
    }
}

/// Caller-facing options of [`prewhitened_ccf`].
///
/// Also the `[ccf]` section of the configuration file, where everything but
/// `max_order` may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CcfOptions {
    /// Largest AR order searched and half-width of the lag window.
    pub max_order: usize,
    #[serde(default)]
    pub keep_input: KeepInput,
    #[serde(default)]
    pub keep_ccf: KeepCcf,
    /// Seasonal period in observations; 1 disables seasonal differencing.
    #[serde(default = "default_period")]
    pub period: usize,
}

fn default_period() -> usize {
    1
}

impl CcfOptions {
    pub fn new(max_order: usize) -> Self {
        Self {
            max_order,
            keep_input: KeepInput::default(),
            keep_ccf: KeepCcf::default(),
            period: default_period(),
        }
    }

    pub fn keep_input(mut self, keep_input: KeepInput) -> Self {
        self.keep_input = keep_input;
        self
    }

    pub fn keep_ccf(mut self, keep_ccf: KeepCcf) -> Self {
        self.keep_ccf = keep_ccf;
        self
    }

    pub fn period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    fn validate(&self) -> PipelineResult<()> {
        if self.max_order == 0 {
            return Err(PipelineError::InvalidParameter(
                "max_order must be a positive integer".into(),
            ));
        }
        if self.period == 0 {
            return Err(PipelineError::InvalidParameter(
                "period must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Lag,
    Lead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignifType {
    Significant,
    NotSignificant,
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputType::Lag => "lag",
            InputType::Lead => "lead",
        })
    }
}

impl fmt::Display for SignifType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignifType::Significant => "significant",
            SignifType::NotSignificant => "not_significant",
        })
    }
}

/// One lag of the cross-correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CcfRow {
    pub input_type: InputType,
    /// Unsigned lag magnitude.
    pub input_series: usize,
    pub signif_type: SignifType,
    /// Significance threshold carrying the sign of `ccf`.
    pub signif_threshold: f64,
    pub ccf: f64,
}

impl CcfRow {
    /// Classify the correlation `ccf` observed at raw lag `lag`.
    pub fn classify(lag: i64, ccf: f64, threshold: f64) -> Self {
        Self {
            input_type: if lag < 0 {
                InputType::Lag
            } else {
                InputType::Lead
            },
            input_series: lag.unsigned_abs() as usize,
            signif_type: if ccf.abs() >= threshold {
                SignifType::Significant
            } else {
                SignifType::NotSignificant
            },
            signif_threshold: signed_threshold(threshold, ccf),
            ccf,
        }
    }

    fn is_significant(&self) -> bool {
        self.signif_type == SignifType::Significant
    }
}

/// Seasonal and ordinary difference orders applied to both series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DifferencingOrder {
    pub seasonal_diffs: usize,
    pub diffs: usize,
}

/// Result of [`prewhitened_ccf`]: the selected rows plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcfTable {
    pub rows: Vec<CcfRow>,
    /// Sample size after joining the whitened series.
    pub n_obs: usize,
    /// Timestamps dropped by the join.
    pub n_dropped: usize,
    /// Lag window half-width actually used.
    pub max_lag: usize,
    pub ar_order: usize,
    pub differencing: DifferencingOrder,
    /// Unsigned significance threshold `1.96 / sqrt(n_obs)`.
    pub threshold: f64,
    /// No candidate was significant and the strongest one was returned.
    pub fallback: bool,
}

impl fmt::Display for CcfTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "#n_obs = {}, n_dropped = {}, max_lag = {}, ar_order = {}, seasonal_diffs = {}, diffs = {}",
            self.n_obs,
            self.n_dropped,
            self.max_lag,
            self.ar_order,
            self.differencing.seasonal_diffs,
            self.differencing.diffs
        )?;
        writeln!(
            f,
            "#input_type input_series     signif_type signif_threshold              ccf"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                " {:>10} {:>12} {:>15} {:>16.12} {:>16.12}",
                row.input_type.to_string(),
                row.input_series,
                row.signif_type.to_string(),
                row.signif_threshold,
                row.ccf
            )?;
        }
        Ok(())
    }
}

/// Run the pipeline with the [`DefaultBackend`].
pub fn prewhitened_ccf(
    input: &TimeSeries,
    output: &TimeSeries,
    opts: &CcfOptions,
) -> PipelineResult<CcfTable> {
    prewhitened_ccf_with(&DefaultBackend::default(), input, output, opts)
}

/// Run the pipeline with an arbitrary statistical backend.
///
/// # Errors
/// Any [`PipelineError`] from validation, the backend, or the filters; the
/// call never returns a partial table.
pub fn prewhitened_ccf_with(
    backend: &dyn Backend,
    input: &TimeSeries,
    output: &TimeSeries,
    opts: &CcfOptions,
) -> PipelineResult<CcfTable> {
    opts.validate()?;

    let differencing = select_differencing(backend, input, output, opts.period)?;
    log::debug!("differencing: {differencing:?}");
    let (input_diff, output_diff) = difference_pair(input, output, differencing, opts.period);

    let n_vals = input_diff.len();
    let max_order = cap_max_order(opts.max_order, n_vals)?;
    if max_order < opts.max_order {
        log::info!(
            "reduced max_order from {} to {max_order} for {n_vals} observations",
            opts.max_order
        );
    }

    let ar = backend.fit_ar(input_diff.values(), max_order)?;
    log::debug!("AR({}) coefficients: {:?}", ar.order, ar.coefficients);

    let input_white =
        input_diff.with_partial_values(&backend.filter(input_diff.values(), &ar.coefficients)?);
    let output_white =
        output_diff.with_partial_values(&backend.filter(output_diff.values(), &ar.coefficients)?);

    let aligned = inner_join(&input_white, &output_white);
    if aligned.n_dropped > 0 {
        log::warn!(
            "dropped {} timestamps present in only one of {:?} and {:?}",
            aligned.n_dropped,
            input.name(),
            output.name()
        );
    }
    let n_obs = aligned.index.len();
    if n_obs < 3 {
        return Err(PipelineError::InsufficientHistory {
            required: 3,
            actual: n_obs,
        });
    }

    let max_lag = max_order.min(n_obs - 1);
    let ccf = backend.ccf(&aligned.left, &aligned.right, max_lag)?;
    let threshold = significance_threshold(n_obs);

    let rows = ccf
        .iter()
        .map(|&(lag, ccf)| CcfRow::classify(lag, ccf, threshold))
        .collect();
    let candidates = filter_rows(rows, opts.keep_input, opts.keep_ccf);
    let (rows, fallback) = select_rows(candidates).ok_or(
        PipelineError::EmptyResultAfterFiltering {
            keep_input: opts.keep_input,
            keep_ccf: opts.keep_ccf,
        },
    )?;
    if fallback {
        log::debug!("no significant lag, falling back to the strongest candidate");
    }

    Ok(CcfTable {
        rows,
        n_obs,
        n_dropped: aligned.n_dropped,
        max_lag,
        ar_order: ar.order,
        differencing,
        threshold,
        fallback,
    })
}

/// Per-series stationarity orders, combined by taking the larger of each.
///
/// Ordinary differences are estimated on each series after its own
/// seasonal differences.
pub fn select_differencing(
    backend: &dyn Backend,
    input: &TimeSeries,
    output: &TimeSeries,
    period: usize,
) -> PipelineResult<DifferencingOrder> {
    let series_order = |series: &TimeSeries| -> PipelineResult<DifferencingOrder> {
        let seasonal_diffs = if period > 1 {
            backend.seasonal_diff_order(series.values(), period)?
        } else {
            0
        };
        let seasonal = compute_diff(series.values(), period, seasonal_diffs);
        let diffs = backend.diff_order(&seasonal)?;
        Ok(DifferencingOrder {
            seasonal_diffs,
            diffs,
        })
    };

    let input_order = series_order(input)?;
    let output_order = series_order(output)?;
    log::debug!("input orders: {input_order:?}, output orders: {output_order:?}");

    Ok(DifferencingOrder {
        seasonal_diffs: input_order.seasonal_diffs.max(output_order.seasonal_diffs),
        diffs: input_order.diffs.max(output_order.diffs),
    })
}

/// Difference both series by the same orders, each from its own values:
/// seasonal differences first, then ordinary ones.
pub fn difference_pair(
    input: &TimeSeries,
    output: &TimeSeries,
    order: DifferencingOrder,
    period: usize,
) -> (TimeSeries, TimeSeries) {
    let apply = |series: &TimeSeries| {
        series
            .difference(period, order.seasonal_diffs)
            .difference(1, order.diffs)
    };
    (apply(input), apply(output))
}

/// Bound the AR order search by the sample size `n_vals`.
///
/// When `(n - 2) - max_order <= max_order` the order is reduced by
/// `max_order - ((n - 2) - max_order) + 1`. If that leaves less than one,
/// the largest order satisfying the bound, `(n - 3) / 2`, is used instead.
///
/// # Errors
/// [`PipelineError::InsufficientHistory`] when no order `>= 1` fits.
pub fn cap_max_order(max_order: usize, n_vals: usize) -> PipelineResult<usize> {
    let (m, n) = (max_order as i64, n_vals as i64);
    if (n - 2) - m > m {
        return Ok(max_order);
    }

    let reduced = m - (m - ((n - 2) - m) + 1);
    if reduced >= 1 {
        return Ok(reduced as usize);
    }

    let largest = (n - 3) / 2;
    if largest >= 1 {
        return Ok(largest as usize);
    }

    Err(PipelineError::InsufficientHistory {
        required: 5,
        actual: n_vals,
    })
}

/// Apply the direction filter, then the sign filter.
pub fn filter_rows(rows: Vec<CcfRow>, keep_input: KeepInput, keep_ccf: KeepCcf) -> Vec<CcfRow> {
    rows.into_iter()
        .filter(|row| match keep_input {
            KeepInput::InputLags => row.input_type == InputType::Lag,
            KeepInput::InputLeads => row.input_type == InputType::Lead && row.input_series > 0,
            KeepInput::Both => true,
        })
        .filter(|row| match keep_ccf {
            KeepCcf::Positive => row.ccf > 0.0,
            KeepCcf::Negative => row.ccf < 0.0,
            KeepCcf::Both => true,
        })
        .collect()
}

/// Keep every significant candidate or, failing that, the single candidate
/// with the largest `|ccf|` (first one on ties).
///
/// Returns the rows and whether the fallback was taken, or `None` when
/// there are no candidates at all.
pub fn select_rows(candidates: Vec<CcfRow>) -> Option<(Vec<CcfRow>, bool)> {
    if candidates.is_empty() {
        return None;
    }

    let significant: Vec<_> = candidates
        .iter()
        .copied()
        .filter(CcfRow::is_significant)
        .collect();
    if !significant.is_empty() {
        return Some((significant, false));
    }

    let strongest = candidates
        .into_iter()
        .reduce(|best, row| if row.ccf.abs() > best.ccf.abs() { row } else { best })?;
    Some((vec![strongest], true))
}
