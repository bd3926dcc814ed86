use crate::pipeline::{KeepCcf, KeepInput};
use thiserror::Error;

/// Failures of the prewhitened cross-correlation pipeline.
///
/// Any variant aborts the whole call; no partial table is ever returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Series is not a valid timestamp-indexed numeric series.
    #[error("invalid input shape: {0}")]
    InvalidInputShape(String),

    /// Caller-supplied option outside its domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Too few observations left for the requested computation.
    #[error("insufficient history: need at least {required} observations, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    /// Series has no variation, so correlations are undefined.
    #[error("degenerate series: {0}")]
    DegenerateSeries(String),

    /// A numerical routine produced a non-finite result.
    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// Direction and sign filters removed every candidate lag.
    #[error("no lags left after filtering with keep_input = {keep_input}, keep_ccf = {keep_ccf}")]
    EmptyResultAfterFiltering {
        keep_input: KeepInput,
        keep_ccf: KeepCcf,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
