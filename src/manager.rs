use crate::config::Config;
use crate::pipeline::{CcfOptions, CcfTable, prewhitened_ccf};
use crate::series::SeriesFile;
use crate::synth::Generator;
use anyhow::{Context, Result, bail};
use glob::glob;
use rmp_serde::{decode, encode};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Data directory holding `config.toml` and one `pair-NNNN` directory per
/// input/output pair.
pub struct Manager {
    data_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(data_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { data_dir, cfg })
    }

    /// Write a new synthetic pair into the next free pair directory.
    pub fn generate_pair(&self) -> Result<()> {
        let Some(gen_cfg) = &self.cfg.generate else {
            bail!("config has no [generate] section");
        };

        let pair_idx = self.count_pair_dirs().context("failed to count pair dirs")?;
        let pair_dir = self.pair_dir(pair_idx);
        fs::create_dir_all(&pair_dir).with_context(|| format!("failed to create {pair_dir:?}"))?;
        log::info!("created {pair_dir:?}");

        let mut generator =
            Generator::new(gen_cfg.clone()).context("failed to construct generator")?;
        let (input, output) = generator
            .generate_pair()
            .context("failed to generate pair")?;

        SeriesFile::save(&input, self.input_file(pair_idx)).context("failed to save input")?;
        SeriesFile::save(&output, self.output_file(pair_idx)).context("failed to save output")?;

        Ok(())
    }

    /// Run the pipeline on one pair, or on every pair when `pair_idx` is
    /// `None`, and save each result table.
    pub fn analyze_pairs(&self, pair_idx: Option<usize>, opts: &CcfOptions) -> Result<()> {
        let n_pairs = self.count_pair_dirs().context("failed to count pair dirs")?;
        let pair_idxs = match pair_idx {
            Some(pair_idx) if pair_idx < n_pairs => pair_idx..pair_idx + 1,
            Some(pair_idx) => bail!("pair index must be below {n_pairs}, but is {pair_idx}"),
            None => 0..n_pairs,
        };
        log::info!("{opts:?}");

        for pair_idx in pair_idxs {
            let table = self
                .analyze_pair(pair_idx, opts)
                .with_context(|| format!("failed to analyze pair {pair_idx}"))?;
            log::info!("pair {pair_idx}:\n{table}");

            save_table(&table, self.results_file(pair_idx)).context("failed to save results")?;
        }

        Ok(())
    }

    /// Remove every saved result table.
    pub fn clean_results(&self) -> Result<()> {
        let pattern = self.data_dir.join("pair-*").join("ccf.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for file in glob(pattern)
            .context("failed to glob results files")?
            .filter_map(Result::ok)
        {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }
        Ok(())
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    fn analyze_pair(&self, pair_idx: usize, opts: &CcfOptions) -> Result<CcfTable> {
        let input_file = self.input_file(pair_idx);
        let input = SeriesFile::load(&input_file)
            .with_context(|| format!("failed to load {input_file:?}"))?;
        let output_file = self.output_file(pair_idx);
        let output = SeriesFile::load(&output_file)
            .with_context(|| format!("failed to load {output_file:?}"))?;

        let table = prewhitened_ccf(&input, &output, opts)?;
        Ok(table)
    }

    fn count_pair_dirs(&self) -> Result<usize> {
        let pattern = self.data_dir.join("pair-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob pair dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn pair_dir(&self, pair_idx: usize) -> PathBuf {
        self.data_dir.join(format!("pair-{pair_idx:04}"))
    }

    fn input_file(&self, pair_idx: usize) -> PathBuf {
        self.pair_dir(pair_idx).join("input.toml")
    }

    fn output_file(&self, pair_idx: usize) -> PathBuf {
        self.pair_dir(pair_idx).join("output.toml")
    }

    fn results_file(&self, pair_idx: usize) -> PathBuf {
        self.pair_dir(pair_idx).join("ccf.msgpack")
    }
}

/// Save a result table as MessagePack.
pub fn save_table<P: AsRef<Path>>(table: &CcfTable, file: P) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write_named(&mut writer, table).context("failed to serialize table")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Load a result table saved by [`save_table`].
pub fn load_table<P: AsRef<Path>>(file: P) -> Result<CcfTable> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let table = decode::from_read(&mut reader).context("failed to deserialize table")?;
    Ok(table)
}
