//! Prewhitened cross-correlation between two aligned time series.
//!
//! The entry point is [`prewhitened_ccf`]: it differences both series to
//! stationarity, removes the input's autocorrelation from both with an AR
//! filter, and reports the lags at which the whitened series are
//! significantly correlated.

pub mod ar;
pub mod backend;
pub mod config;
pub mod correlation;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod series;
pub mod stationarity;
pub mod stats;
pub mod synth;

pub use backend::{Backend, DefaultBackend};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    CcfOptions, CcfRow, CcfTable, DifferencingOrder, InputType, KeepCcf, KeepInput, SignifType,
    prewhitened_ccf, prewhitened_ccf_with,
};
pub use series::{SeriesFile, TimeSeries};
