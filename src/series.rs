//! Timestamp-indexed series, their on-disk form and alignment helpers.

use crate::error::{PipelineError, PipelineResult};
use crate::stats::compute_diff;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// Regularly spaced series with a single numeric value column.
///
/// Timestamps are strictly increasing with a constant step and every value
/// is finite. Use [`TimeSeries::new`] to build one from raw parts.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    name: String,
    index: Vec<i64>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Validate and build a series.
    ///
    /// # Errors
    /// Returns [`PipelineError::InvalidInputShape`] if the series is empty,
    /// the lengths differ, timestamps are not strictly increasing and
    /// regularly spaced, or a value is not finite.
    pub fn new(name: impl Into<String>, index: Vec<i64>, values: Vec<f64>) -> PipelineResult<Self> {
        let name = name.into();
        let shape_err = |msg: String| PipelineError::InvalidInputShape(format!("{name:?}: {msg}"));

        if index.is_empty() {
            return Err(shape_err("series is empty".into()));
        }
        if index.len() != values.len() {
            return Err(shape_err(format!(
                "index has {} entries but value column has {}",
                index.len(),
                values.len()
            )));
        }
        if let Some(pos) = values.iter().position(|val| !val.is_finite()) {
            return Err(shape_err(format!("value at position {pos} is not finite")));
        }
        if index.len() > 1 {
            let Some(step) = index[1].checked_sub(index[0]) else {
                return Err(shape_err("timestamp step overflows i64".into()));
            };
            if step <= 0 {
                return Err(shape_err("timestamps must be strictly increasing".into()));
            }
            if let Some(pos) = index
                .windows(2)
                .position(|w| w[1].checked_sub(w[0]) != Some(step))
            {
                return Err(shape_err(format!(
                    "timestamps must be regularly spaced (step {step}), break after position {pos}"
                )));
            }
        }

        Ok(Self {
            name,
            index,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Apply `order` backward differences at `lag`, dropping the leading
    /// timestamps that have no predecessor.
    pub fn difference(&self, lag: usize, order: usize) -> Self {
        let values = compute_diff(&self.values, lag, order);
        let index = self.index[self.index.len() - values.len()..].to_vec();
        Self {
            name: self.name.clone(),
            index,
            values,
        }
    }

    /// Keep only the observations whose value is present.
    ///
    /// `values` must be aligned with this series' index.
    pub(crate) fn with_partial_values(&self, values: &[Option<f64>]) -> Self {
        let (index, values) = self
            .index
            .iter()
            .zip(values)
            .filter_map(|(&ts, val)| val.map(|val| (ts, val)))
            .unzip();
        Self {
            name: self.name.clone(),
            index,
            values,
        }
    }
}

/// Two series aligned on their common timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Aligned {
    pub index: Vec<i64>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
    /// Timestamps present in only one of the two series.
    pub n_dropped: usize,
}

/// Inner-join two series on timestamp.
pub fn inner_join(left: &TimeSeries, right: &TimeSeries) -> Aligned {
    let mut aligned = Aligned {
        index: Vec::with_capacity(left.len().min(right.len())),
        left: Vec::with_capacity(left.len().min(right.len())),
        right: Vec::with_capacity(left.len().min(right.len())),
        n_dropped: 0,
    };

    // Both indices are strictly increasing, so a merge walk suffices.
    let (mut i_l, mut i_r) = (0, 0);
    while i_l < left.len() && i_r < right.len() {
        let (ts_l, ts_r) = (left.index[i_l], right.index[i_r]);
        if ts_l == ts_r {
            aligned.index.push(ts_l);
            aligned.left.push(left.values[i_l]);
            aligned.right.push(right.values[i_r]);
            i_l += 1;
            i_r += 1;
        } else if ts_l < ts_r {
            aligned.n_dropped += 1;
            i_l += 1;
        } else {
            aligned.n_dropped += 1;
            i_r += 1;
        }
    }
    aligned.n_dropped += (left.len() - i_l) + (right.len() - i_r);

    aligned
}

/// On-disk TOML layout of a series.
///
/// ```toml
/// index = [0, 1, 2]
///
/// [columns]
/// sales = [1.0, 2.5, 3.0]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesFile {
    pub index: Vec<i64>,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl SeriesFile {
    /// Convert into a [`TimeSeries`], requiring exactly one value column.
    pub fn into_series(self) -> PipelineResult<TimeSeries> {
        let n_cols = self.columns.len();
        if n_cols != 1 {
            let names: Vec<_> = self.columns.keys().collect();
            return Err(PipelineError::InvalidInputShape(format!(
                "expected exactly one value column, found {n_cols}: {names:?}"
            )));
        }
        let (name, values) = self
            .columns
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::InvalidInputShape("missing value column".into()))?;
        TimeSeries::new(name, self.index, values)
    }

    pub fn from_series(series: &TimeSeries) -> Self {
        Self {
            index: series.index.clone(),
            columns: BTreeMap::from([(series.name.clone(), series.values.clone())]),
        }
    }

    /// Load a series file and validate its shape.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<TimeSeries> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        let series_file: SeriesFile =
            toml::from_str(&contents).context("failed to deserialize series file")?;
        let series = series_file
            .into_series()
            .with_context(|| format!("invalid series in {file:?}"))?;
        Ok(series)
    }

    /// Write a series as a TOML series file.
    pub fn save<P: AsRef<Path>>(series: &TimeSeries, file: P) -> Result<()> {
        let file = file.as_ref();
        let contents = toml::to_string(&Self::from_series(series))
            .context("failed to serialize series file")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }
}
