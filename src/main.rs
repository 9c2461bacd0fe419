use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use rasternest::layout::encode_png;
use rasternest::{NestConfig, NestJob, NestMode, NestOutcome, nest_batch};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Orthogonal,
    Advanced,
}

impl From<ModeArg> for NestMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Orthogonal => NestMode::Orthogonal,
            ModeArg::Advanced => NestMode::Advanced,
        }
    }
}

/// Command line arguments for rasternest
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Piece images (PNG or JPEG), each nested independently
    #[arg(long, value_name = "FILES", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Sheet width in physical units
    #[arg(long)]
    pub sheet_width: f64,

    /// Sheet height in physical units
    #[arg(long)]
    pub sheet_height: f64,

    /// Target piece width in physical units
    #[arg(long)]
    pub piece_width: f64,

    /// Target piece height in physical units
    #[arg(long)]
    pub piece_height: f64,

    /// Total pieces required, used to compute the number of sheets
    #[arg(long)]
    pub quantity: Option<u64>,

    /// Packing strategy, overrides the config file
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Seed of the search, overrides the config file
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON file with a nesting configuration
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Folder receiving the layout images and summaries
    #[arg(long, default_value = ".")]
    pub output_folder: PathBuf,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

/// Parsed configuration returned by the CLI
#[derive(Debug)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    pub job: NestJob,
    pub nest: NestConfig,
    pub output_folder: PathBuf,
}

impl CliArgs {
    fn into_config(self) -> Result<Config> {
        let mut nest = match &self.config_file {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str::<NestConfig>(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => NestConfig::default(),
        };
        if let Some(mode) = self.mode {
            nest.mode = mode.into();
        }
        if self.seed.is_some() {
            nest.prng_seed = self.seed;
        }
        nest.validate()?;
        Ok(Config {
            inputs: self.inputs,
            job: NestJob {
                sheet_width: self.sheet_width,
                sheet_height: self.sheet_height,
                piece_width: self.piece_width,
                piece_height: self.piece_height,
                quantity: self.quantity,
            },
            nest,
            output_folder: self.output_folder,
        })
    }
}

fn write_outputs(input: &Path, outcome: &NestOutcome, cfg: &Config) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "piece".to_string());
    let png_path = cfg.output_folder.join(format!("{stem}_layout.png"));
    let json_path = cfg.output_folder.join(format!("{stem}_layout.json"));

    let png = encode_png(&outcome.layout)?;
    fs::write(&png_path, png).with_context(|| format!("writing {}", png_path.display()))?;
    let summary = outcome.result.summary(&outcome.sheet, cfg.job.quantity);
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(&json_path, json).with_context(|| format!("writing {}", json_path.display()))?;
    Ok(png_path)
}

fn run(cfg: &Config) -> Result<bool> {
    fs::create_dir_all(&cfg.output_folder)
        .with_context(|| format!("creating {}", cfg.output_folder.display()))?;

    let outcomes = nest_batch(&cfg.inputs, &cfg.job, &cfg.nest);
    let mut all_ok = true;
    for (input, outcome) in cfg.inputs.iter().zip(outcomes) {
        let written = outcome
            .map_err(anyhow::Error::from)
            .and_then(|o| write_outputs(input, &o, cfg).map(|path| (o, path)));
        match written {
            Ok((o, path)) => println!(
                "Nested {} pieces ({:.2}% utilization) -> {}",
                o.result.pieces_placed(),
                o.result.utilization_percent,
                path.display()
            ),
            Err(e) => {
                eprintln!("Failed to nest {}: {e:#}", input.display());
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    env_logger::Builder::new().filter_level(args.log_level).init();

    let result = args.into_config().and_then(|cfg| run(&cfg));
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
