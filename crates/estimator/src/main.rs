//! Carbon calculation CLI
//!
//! Reads a calculation request as JSON, runs the estimation engine and
//! prints the result document on stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use carbon_estimator::output::ErrorReport;
use carbon_estimator::records::read_labelled_csv;
use carbon_estimator::{
    BatchOutput, CalculationOutput, CalculationRequest, EstimatorConfig, EvaluationOutput,
    ModelEvaluation, ModelKind, ModelLifecycleManager, TrainingOutput,
};
use clap::Parser;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Subdirectory of the output directory that receives trained models
const TRAINED_MODELS_DIR: &str = "trained_models";

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "carbon-calc")]
#[command(author = "Blue Carbon Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Biomass and carbon sequestration calculator", long_about = None)]
struct Args {
    /// Calculation request as a JSON string
    #[arg(short, long, conflicts_with = "parameters_file")]
    parameters: Option<String>,

    /// Path to a JSON file holding the calculation request
    #[arg(long)]
    parameters_file: Option<PathBuf>,

    /// JSON file holding an array of calculation requests
    #[arg(long, conflicts_with_all = ["parameters", "parameters_file", "evaluate"])]
    batch_file: Option<PathBuf>,

    /// Labelled CSV for the biomass model, used by training and evaluation
    #[arg(long)]
    biomass_data: Option<PathBuf>,

    /// Labelled CSV for the sequestration model, used by training and evaluation
    #[arg(long)]
    sequestration_data: Option<PathBuf>,

    /// Score the stored models against the labelled CSV files
    #[arg(long)]
    evaluate: bool,

    /// Directory receiving result documents
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Directory holding the model bundle (overrides configuration)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn data_path(&self, kind: ModelKind) -> Option<&Path> {
        match kind {
            ModelKind::Biomass => self.biomass_data.as_deref(),
            ModelKind::Sequestration => self.sequestration_data.as_deref(),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(document) => {
            print_document(&document);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("calculation failed: {err:#}");
            let report = ErrorReport::from_anyhow(&err);
            match serde_json::to_value(&report) {
                Ok(document) => print_document(&document),
                Err(_) => eprintln!("{err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn print_document(document: &Value) {
    match serde_json::to_string_pretty(document) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to render result: {err}"),
    }
}

fn load_config(args: &Args) -> Result<EstimatorConfig> {
    let mut config = match &args.config {
        Some(path) => EstimatorConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EstimatorConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(dir) = &args.model_dir {
        config.storage.model_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn log_level<'a>(args: &Args, config: Option<&'a EstimatorConfig>) -> &'a str {
    if args.verbose {
        return "debug";
    }
    config.map_or(DEFAULT_LOG_LEVEL, |c| c.logging.level.as_str())
}

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to set tracing subscriber")
}

fn read_request(args: &Args) -> Result<CalculationRequest> {
    let text = match (&args.parameters, &args.parameters_file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters from {}", path.display()))?,
        (None, None) => bail!("Either --parameters or --parameters-file is required"),
    };
    serde_json::from_str(&text).context("Invalid JSON parameters")
}

fn run(args: &Args) -> Result<Value> {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(err) => {
            // log the failure on stderr with default settings
            let _ = init_logging(log_level(args, None));
            return Err(err);
        }
    };
    init_logging(log_level(args, Some(&config)))?;

    info!("Carbon calculator v{}", carbon_estimator::VERSION);
    let mut manager = ModelLifecycleManager::new(config);

    if args.evaluate {
        load_models(&mut manager)?;
        return evaluate(&manager, args);
    }

    if let Some(path) = &args.batch_file {
        load_models(&mut manager)?;
        return batch(&manager, path);
    }

    let request = read_request(args)?;
    if request.training {
        return train(&mut manager, args);
    }

    load_models(&mut manager)?;
    let report = manager.analyze(&request)?;
    let output = CalculationOutput::new(&request, report, manager.model_info());
    let document = serde_json::to_value(&output)?;

    std::fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;
    let path = args.output_dir.join(output.results_file_name());
    std::fs::write(&path, serde_json::to_string_pretty(&document)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Results saved to: {}", path.display());

    Ok(document)
}

fn load_models(manager: &mut ModelLifecycleManager) -> Result<()> {
    let model_dir = manager.config().storage.model_dir.clone();
    if manager.load_or_train(&model_dir)? {
        info!("Trained and saved new models in {}", model_dir.display());
    }
    Ok(())
}

fn train(manager: &mut ModelLifecycleManager, args: &Args) -> Result<Value> {
    info!("Training request received");
    let reports = manager.train_from_files(
        args.data_path(ModelKind::Biomass),
        args.data_path(ModelKind::Sequestration),
    )?;

    let model_dir = args.output_dir.join(TRAINED_MODELS_DIR);
    let path = manager.save(&model_dir)?;
    info!("Models saved to: {}", path.display());

    let output = TrainingOutput::new(reports, model_dir.display().to_string());
    Ok(serde_json::to_value(&output)?)
}

fn evaluate(manager: &ModelLifecycleManager, args: &Args) -> Result<Value> {
    let mut evaluations = BTreeMap::new();
    for kind in ModelKind::ALL {
        let Some(path) = args.data_path(kind) else {
            continue;
        };
        let records = read_labelled_csv(path)
            .with_context(|| format!("Failed to read {} data from {}", kind, path.display()))?;
        let metrics = manager.evaluate(kind, &records)?;
        evaluations.insert(
            kind,
            ModelEvaluation {
                samples: records.len(),
                metrics,
            },
        );
    }
    if evaluations.is_empty() {
        bail!("--evaluate needs --biomass-data or --sequestration-data");
    }

    let output = EvaluationOutput::new(evaluations, manager.model_info());
    Ok(serde_json::to_value(&output)?)
}

fn batch(manager: &ModelLifecycleManager, path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch from {}", path.display()))?;
    let requests: Vec<CalculationRequest> =
        serde_json::from_str(&text).context("Invalid JSON batch")?;
    info!("Batch of {} requests received", requests.len());

    let estimate = manager.estimate_batch(&requests)?;
    let output = BatchOutput::new(estimate, manager.model_info());
    Ok(serde_json::to_value(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_failure_is_logged_to_stderr() {
        let args = Args::try_parse_from([
            "carbon-calc",
            "--config",
            "/nonexistent/carbon.toml",
            "--parameters",
            "{}",
        ])
        .unwrap();
        assert_eq!(log_level(&args, None), DEFAULT_LOG_LEVEL);

        assert!(run(&args).is_err());
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn data_paths_map_to_models() {
        let args = Args::try_parse_from([
            "carbon-calc",
            "--evaluate",
            "--sequestration-data",
            "field.csv",
        ])
        .unwrap();
        assert_eq!(args.data_path(ModelKind::Biomass), None);
        assert_eq!(
            args.data_path(ModelKind::Sequestration),
            Some(Path::new("field.csv"))
        );
        assert!(
            Args::try_parse_from(["carbon-calc", "--batch-file", "b.json", "--evaluate"]).is_err()
        );
    }
}
