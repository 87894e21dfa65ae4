use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use groove_sweep::collaborator::{
    CommandEvaluator, CommandMaterializer, CommandPreprocessor, CommandTrainer, ExternalCommand,
    TransferScript,
};
use groove_sweep::config::{load_config, Config};
use groove_sweep::{extract, scratch, EvaluationPipeline, PreprocessingPipeline, TrainingPipeline};
use tracing_subscriber::EnvFilter;

/// Batch runner for drum-pattern augmentation, training and evaluation sweeps
#[derive(Parser)]
#[command(name = "groove-sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// JSON configuration file (defaults are used for missing fields)
    #[arg(short, long, global = true, env = "GROOVE_SWEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Log per-item failures as well as progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess every augmentation parameter combination and transfer the results
    Preprocess {
        /// Sweep the full grid instead of the two-combination smoke grid
        #[arg(long)]
        full: bool,
    },
    /// Materialize preprocessed datasets and train one model per dataset
    Train {
        /// Directory containing `PreProcessed_*` datasets
        datasets_dir: PathBuf,

        /// Where trained checkpoints are written (defaults to the training runs root)
        #[arg(short, long)]
        models_dir: Option<PathBuf>,
    },
    /// Evaluate every `.pth` checkpoint in a directory
    Evaluate {
        /// Directory containing model checkpoints
        models_dir: PathBuf,
    },
    /// Copy preprocessed datasets, skipping ones already present in the destination
    CopyDatasets {
        /// Source directory
        source: PathBuf,
        /// Destination directory
        destination: PathBuf,
    },
    /// Flatten a drum MIDI pack into one directory of `<GENRE>_<info>_<file>.mid` files
    ExtractMidi {
        /// Pack root containing `<genre-id>@<name>` directories
        pack_dir: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        /// Extract every genre instead of the selected Afro-Cuban set
        #[arg(long)]
        all_genres: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show effective configuration
    ShowConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Preprocess { full } => {
            let pre = &config.preprocess;
            let combinations = pre.combinations(full)?;
            let pipeline = PreprocessingPipeline::from_config(
                CommandPreprocessor::new(ExternalCommand::from_argv(&pre.preprocess_command)?),
                TransferScript::new(ExternalCommand::from_argv(&pre.transfer_script)?),
                pre,
            );
            let outcome = pipeline.run(&combinations)?;
            println!("{outcome} Check cluster for processed datasets.");
        }
        Commands::Train {
            datasets_dir,
            models_dir,
        } => {
            let train = &config.train;
            let datasets = scratch::find_preprocessed_datasets(&datasets_dir)
                .with_context(|| format!("listing datasets in {}", datasets_dir.display()))?;
            let models_dir = models_dir.unwrap_or_else(|| train.runs_root.clone());
            std::fs::create_dir_all(&models_dir)?;

            let pipeline = TrainingPipeline::from_config(
                CommandMaterializer::new(ExternalCommand::from_argv(&train.materialize_command)?),
                CommandTrainer::new(
                    ExternalCommand::from_argv(&train.train_command)?,
                    train.hyperparams_setting.clone(),
                    train.log_wandb,
                    train.is_smol,
                ),
                train,
            );
            let outcome = pipeline.run(&datasets, &models_dir)?;
            println!("{outcome}");
        }
        Commands::Evaluate { models_dir } => {
            let eval = &config.evaluate;
            let models = scratch::find_model_paths(&models_dir)
                .with_context(|| format!("listing models in {}", models_dir.display()))?;

            let pipeline = EvaluationPipeline::from_config(
                CommandEvaluator::new(ExternalCommand::from_argv(&eval.evaluate_command)?),
                eval,
            );
            let outcome = pipeline.run(&models)?;
            println!("{outcome}");
        }
        Commands::CopyDatasets {
            source,
            destination,
        } => {
            let report = scratch::copy_preprocessed_datasets(&source, &destination)?;
            println!(
                "Copied {} datasets to {}, skipped {} already present.",
                report.copied.len(),
                destination.display(),
                report.skipped.len()
            );
        }
        Commands::ExtractMidi {
            pack_dir,
            out_dir,
            all_genres,
        } => {
            let report = extract::extract_midi_pack(&pack_dir, &out_dir, all_genres)?;
            println!(
                "Extracted {} midi files into {} ({} total).",
                report.copied.len(),
                out_dir.display(),
                report.total_midi_files
            );
        }
        Commands::ValidateConfig { config } => {
            let config = load_config(config)?;
            println!("Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
