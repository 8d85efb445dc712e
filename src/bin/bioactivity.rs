use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bioactivity::*;
use clap::Parser;
use tracing::*;

const ABOUT: &str = "\
Bioactivity prediction against the SARS-CoV-2 3C-like protease (Mpro).

Model: Random Forest Regressor over Morgan fingerprints (radius 2, 1024 bits)
reduced to the features kept during training. The bundled forest is a stand-in
fitted to this tool's own fingerprint columns; the published reference model
(R² 0.7240, RMSLE 0.0802 over 5 folds) is not reproduced by it.
Predictions are pIC50 values; higher means more potent.";

/// Predict pIC50 against SARS-CoV-2 Mpro from SMILES strings.
#[derive(Debug, Parser)]
#[command(name = "bioactivity", version)]
struct Cli {
    /// Use the bundled example molecules
    #[arg(long, conflicts_with = "input")]
    example: bool,

    /// CSV file with a SMILES column
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the predictions CSV
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How to treat molecules that cannot be parsed: zero-fill, drop or reject
    #[arg(long)]
    on_invalid: Option<InvalidMoleculePolicy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Number of histogram bins
    #[arg(long)]
    bins: Option<usize>,

    /// Print the model description and exit
    #[arg(long)]
    about: bool,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(policy) = self.on_invalid {
            config.pipeline.on_invalid_molecule = policy;
        }
        if let Some(output) = &self.output {
            config.pipeline.output_path = output.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(bins) = self.bins {
            config.pipeline.histogram_bins = bins;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    if !cli.example && cli.input.is_none() {
        println!("Upload a CSV file with a 'SMILES' column (--input) or use the example data (--example).");
        return Ok(());
    }

    let resources = Resources::load(config).context("Failed to load model artifacts")?;
    let mut session = Session::new(&resources, config.pipeline.on_invalid_molecule);

    let molecules = match &cli.input {
        Some(path) => session.load_path(path)?,
        None => session.load_example(),
    };
    let preview_rows = if cli.example {
        molecules.len()
    } else {
        config.pipeline.preview_rows
    };
    println!("Data preview:\n{}", render_preview(molecules, preview_rows));

    let results = session.run()?;
    println!("Prediction results:\n{}", render_predictions(results));
    if let Some(histogram) = Histogram::new(&results.predictions(), config.pipeline.histogram_bins)
    {
        println!("Distribution of predictions:\n{}", histogram.render(40));
    }

    results.write_to_path(&config.pipeline.output_path)?;
    println!("Predictions saved to {}", config.pipeline.output_path.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.about {
        println!("{ABOUT}");
        return ExitCode::SUCCESS;
    }

    let config = match cli.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging.level);
    debug!("Configuration: {config:?}");

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            match e.downcast_ref::<PipelineError>() {
                Some(pipeline) if pipeline.is_validation() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
