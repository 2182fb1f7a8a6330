use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use spectral_import::data::model::Dataset;
use spectral_import::{DatasetRegistry, ImportConfig, ImportRequest, Importer, ResampleBounds};

#[derive(Parser)]
#[command(name = "spectral-import", about = "Import spectral datasets", version)]
struct Cli {
    /// JSON import configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a matrix CSV or a ZIP of per-sample spectra
    Import {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        desc: String,
        /// Matrix CSV or ZIP archive
        #[arg(long)]
        spectra: PathBuf,
        /// Metadata CSV whose first column is `pkey`
        #[arg(long)]
        metadata: Option<PathBuf>,
        #[arg(long, default_value = "")]
        lb: String,
        #[arg(long, default_value = "")]
        ub: String,
        #[arg(long, default_value = "")]
        step: String,
    },
    /// Parse a single spectrum file and print its extent
    Parse { file: PathBuf },
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => ImportConfig::from_path(path)?,
        None => ImportConfig::default(),
    };
    let importer = Importer::new(config, Arc::new(DatasetRegistry::new()));

    match cli.command {
        Command::Import {
            kind,
            name,
            desc,
            spectra,
            metadata,
            lb,
            ub,
            step,
        } => {
            let spectra = std::fs::read(&spectra)
                .with_context(|| format!("reading {}", spectra.display()))?;
            let metadata = match metadata {
                Some(path) => Some(
                    std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?,
                ),
                None => None,
            };
            let request = ImportRequest {
                kind,
                name,
                description: desc,
                spectra: Some(spectra),
                metadata,
                bounds: ResampleBounds::from_strings(&lb, &ub, &step),
            };

            let handle = match importer.import(request) {
                Ok(handle) => handle,
                Err(e) => {
                    eprintln!("[{}] {}", e.status(), e.user_message());
                    return Ok(ExitCode::FAILURE);
                }
            };
            println!("{}", handle.navigation_path());

            let dataset = handle
                .load_in_background()
                .join()
                .map_err(|_| anyhow::anyhow!("loader thread panicked"))?
                .map_err(anyhow::Error::msg)?;
            print_summary(&dataset);
        }
        Command::Parse { file } => {
            let payload =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let label = file.display().to_string();
            match importer.parse_upload(&label, &payload) {
                Ok(spectrum) => {
                    let axis = spectrum.axis();
                    println!(
                        "{label}: {} points, axis {} .. {}",
                        spectrum.len(),
                        axis[0],
                        axis[axis.len() - 1]
                    );
                }
                Err(e) => {
                    eprintln!("[{}] {}", e.status(), e.user_message());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(dataset: &Dataset) {
    match dataset {
        Dataset::Vector(ds) => println!(
            "{} vector dataset: {} spectra x {} channels",
            ds.kind,
            ds.num_rows(),
            ds.num_channels()
        ),
        Dataset::Trajectory(ds) => println!(
            "{} trajectory dataset: {} spectra with individual axes",
            ds.kind,
            ds.num_rows()
        ),
    }
    for (key, column) in dataset.metadata() {
        println!("  {key}: {} ({:?})", column.display_name(), column.kind());
    }
}
