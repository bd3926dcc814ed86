use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prewhiten::manager::Manager;
use prewhiten::{KeepCcf, KeepInput};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate,

    Analyze {
        #[arg(long)]
        pair_idx: Option<usize>,

        #[arg(long)]
        max_order: Option<usize>,

        #[arg(long, value_enum)]
        keep_input: Option<KeepInput>,

        #[arg(long, value_enum)]
        keep_ccf: Option<KeepCcf>,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.data_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Generate => mgr.generate_pair()?,
        Command::Analyze {
            pair_idx,
            max_order,
            keep_input,
            keep_ccf,
        } => {
            let mut opts = mgr.cfg().ccf;
            if let Some(max_order) = max_order {
                opts.max_order = max_order;
            }
            if let Some(keep_input) = keep_input {
                opts.keep_input = keep_input;
            }
            if let Some(keep_ccf) = keep_ccf {
                opts.keep_ccf = keep_ccf;
            }
            mgr.analyze_pairs(pair_idx, &opts)?
        }
        Command::Clean => mgr.clean_results()?,
    }

    Ok(())
}
