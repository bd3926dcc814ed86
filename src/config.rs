use crate::pipeline::CcfOptions;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Analysis configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Pipeline options.
    pub ccf: CcfOptions,

    /// Synthetic pair parameters, only needed by the `generate` command.
    #[serde(default)]
    pub generate: Option<GenerateConfig>,
}

/// Kind of synthetic pair.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    /// Output is a scaled, delayed, noisy copy of the input.
    Delayed,
    /// Output is independent of the input.
    Independent,
}

/// Synthetic pair parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateConfig {
    pub kind: PairKind,

    /// Number of observations per series.
    pub len: usize,
    /// Periods by which the output trails the input.
    #[serde(default)]
    pub delay: usize,
    /// Scale of the delayed input in the output.
    #[serde(default = "default_coef")]
    pub coef: f64,
    /// Standard deviation of the output noise.
    #[serde(default = "default_noise_sd")]
    pub noise_sd: f64,

    /// AR(1) coefficient of the stochastic part.
    #[serde(default)]
    pub input_ar: f64,
    /// Linear trend added to both series.
    #[serde(default)]
    pub trend: f64,
    /// Amplitude of a sine added to both series.
    #[serde(default)]
    pub seasonal_amp: f64,
    /// Period of that sine.
    #[serde(default = "default_period")]
    pub period: usize,

    /// RNG seed; drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_coef() -> f64 {
    0.6
}

fn default_noise_sd() -> f64 {
    0.8
}

fn default_period() -> usize {
    12
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.ccf.max_order, 1..=1000).context("invalid maximum order")?;
        check_num(self.ccf.period, 1..=1000).context("invalid seasonal period")?;

        if let Some(gen_cfg) = &self.generate {
            gen_cfg
                .validate()
                .context("invalid synthetic pair parameters")?;
        }

        Ok(())
    }
}

impl GenerateConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.len, 8..=1_000_000).context("invalid series length")?;
        check_num(self.delay, 0..self.len).context("invalid delay")?;
        check_num(self.noise_sd, f64::MIN_POSITIVE..1e6)
            .context("invalid noise standard deviation")?;
        check_num(self.input_ar.abs(), 0.0..1.0).context("invalid AR coefficient")?;
        check_num(self.period, 1..=1000).context("invalid seasonal period")?;

        check_finite(self.coef).context("invalid delayed input scale")?;
        check_finite(self.trend).context("invalid trend")?;
        check_finite(self.seasonal_amp).context("invalid seasonal amplitude")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_finite(num: f64) -> Result<()> {
    if !num.is_finite() {
        bail!("number must be finite, but is {num}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{KeepCcf, KeepInput};

    fn parse(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("[ccf]\nmax_order = 8\n").expect("valid config");
        assert_eq!(config.ccf.max_order, 8);
        assert_eq!(config.ccf.keep_input, KeepInput::Both);
        assert_eq!(config.ccf.keep_ccf, KeepCcf::Both);
        assert_eq!(config.ccf.period, 1);
        assert_eq!(config.generate, None);
    }

    #[test]
    fn full_config() {
        let config = parse(
            r#"
[ccf]
max_order = 12
keep_input = "input_lags"
keep_ccf = "positive"
period = 4

[generate]
kind = "delayed"
len = 200
delay = 3
seed = 42
"#,
        )
        .expect("valid config");
        assert_eq!(config.ccf.keep_input, KeepInput::InputLags);
        assert_eq!(config.ccf.keep_ccf, KeepCcf::Positive);
        let gen_cfg = config.generate.expect("generate section");
        assert_eq!(gen_cfg.kind, PairKind::Delayed);
        assert_eq!(gen_cfg.coef, 0.6);
        assert_eq!(gen_cfg.seed, Some(42));
    }

    #[test]
    fn rejects_unknown_filter_values() {
        assert!(parse("[ccf]\nmax_order = 8\nkeep_input = \"lags\"\n").is_err());
        assert!(parse("[ccf]\nmax_order = 8\nkeep_ccf = \"pos\"\n").is_err());
        assert!(parse("[ccf]\nmax_order = 8\nmax_lag = 3\n").is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(parse("[ccf]\nmax_order = 0\n").is_err());
        assert!(parse("[ccf]\nmax_order = 4\nperiod = 0\n").is_err());
        assert!(
            parse("[ccf]\nmax_order = 4\n[generate]\nkind = \"delayed\"\nlen = 20\ndelay = 20\n")
                .is_err()
        );
        assert!(
            parse("[ccf]\nmax_order = 4\n[generate]\nkind = \"independent\"\nlen = 20\ninput_ar = 1.0\n")
                .is_err()
        );
        assert!(
            parse("[ccf]\nmax_order = 4\n[generate]\nkind = \"independent\"\nlen = 20\nnoise_sd = 0.0\n")
                .is_err()
        );
    }
}
