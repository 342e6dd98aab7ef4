//! CLI entry point for the typed-column preparation engine.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tabprep::{
    CvSpec, Preparation, PreparationSummary, PrepareConfig, ProblemType, RawInput, decode,
};
use tracing::{debug, info};

/// CLI-compatible problem type enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProblemType {
    /// Two classes, optionally derived with `pos_labels` in the config
    BinaryClassification,
    /// More than two classes
    MulticlassClassification,
    /// Numeric target
    Regression,
}

impl From<CliProblemType> for ProblemType {
    fn from(cli: CliProblemType) -> Self {
        match cli {
            CliProblemType::BinaryClassification => ProblemType::BinaryClassification,
            CliProblemType::MulticlassClassification => ProblemType::MulticlassClassification,
            CliProblemType::Regression => ProblemType::Regression,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Typed-column experiment preparation",
    long_about = "Validates a tabular dataset against an experiment configuration and prints \
                  the resulting preparation: typed columns, CV scheme, hyperparameter plan and \
                  warnings.\n\n\
                  EXAMPLES:\n  \
                  # Features and target from a CSV\n  \
                  tabprep -i data.csv -x age,income -y label\n\n  \
                  # Confounds, groups and a JSON configuration\n  \
                  tabprep -i data.csv -x age,income -y label --confounds site --groups subject \
                  -c experiment.json\n\n  \
                  # Override the CV and print JSON\n  \
                  tabprep -i data.csv -x age -y income --problem-type regression \
                  --cv repeat:5_nfolds:5 --json"
)]
struct Args {
    /// Path to the CSV file to read
    #[arg(short, long)]
    input: String,

    /// Feature columns (comma separated)
    #[arg(short = 'x', long, value_delimiter = ',', required = true)]
    features: Vec<String>,

    /// Target column
    #[arg(short = 'y', long)]
    target: String,

    /// Confound columns (comma separated)
    #[arg(long, value_delimiter = ',')]
    confounds: Vec<String>,

    /// Column holding the sample groups
    #[arg(long)]
    groups: Option<String>,

    /// JSON experiment configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured problem type
    #[arg(long, value_enum)]
    problem_type: Option<CliProblemType>,

    /// Override the configured CV (number of folds or repeat:<int>_nfolds:<int>)
    #[arg(long)]
    cv: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs; only the preparation summary is written.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so that stdout only
/// contains the JSON summary.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            PrepareConfig::from_path(path)?
        }
        None => PrepareConfig::default(),
    };
    if let Some(problem_type) = args.problem_type {
        config.problem_type = problem_type.into();
    }
    if let Some(cv) = &args.cv {
        config.cv = cv_from_arg(cv);
    }

    info!("Loading dataset from: {}", args.input);
    let data = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(&args.input)))?
        .finish()
        .map_err(|e| anyhow!("Failed to read {}: {}", args.input, e))?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    // Named steps are resolved by the executor's factory; only their names are reported here.
    let feature_steps = std::mem::take(&mut config.preprocess_x);
    let confound_steps = std::mem::take(&mut config.preprocess_confounds);
    let target_step = config.preprocess_y.take();
    debug!(
        "Deferring {} named step(s) to the executor",
        feature_steps.len() + confound_steps.len() + usize::from(target_step.is_some())
    );

    let mut input = RawInput::table(data, args.features.clone(), args.target.clone());
    if !args.confounds.is_empty() {
        input = input.with_confounds(args.confounds.clone());
    }
    if let Some(groups) = &args.groups {
        input = input.with_groups(groups.as_str());
    }

    let prepared = Preparation::builder()
        .config(config)
        .on_warning(|_| {})
        .build()?
        .prepare(&input)?;

    let mut summary = prepared.summary();
    summary.feature_steps = feature_steps;
    summary.confound_steps = confound_steps;
    summary.target_step = target_step;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_human_readable_summary(&summary, &args);
    Ok(())
}

/// Print a human-readable summary of the preparation.
///
/// Uses `println!` on purpose: this is the command's output, not a log.
fn print_human_readable_summary(summary: &PreparationSummary, args: &Args) {
    println!();
    println!("{}", "=".repeat(80));
    println!("PREPARATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("DATA");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Samples: {}", summary.n_samples);
    println!("  Target: {}", summary.target);
    if let Some(groups) = &summary.groups {
        println!("  Groups: {}", groups);
    }
    println!();

    println!("{:<40} {:<12}", "Column", "Type");
    println!("{}", "-".repeat(52));
    for name in &summary.columns {
        let (base, column_type) = decode(name);
        println!(
            "{:<40} {:<12}",
            truncate_str(base, 39),
            column_type.as_str()
        );
    }
    println!();

    println!("PREPROCESSING");
    println!("{}", "-".repeat(40));
    println!("  Features: {}", list_or_none(&summary.feature_steps));
    println!("  Confounds: {}", list_or_none(&summary.confound_steps));
    println!(
        "  Target: {}",
        summary.target_step.as_deref().unwrap_or("none")
    );
    println!();

    println!("MODEL SELECTION");
    println!("{}", "-".repeat(40));
    println!("  CV: {}", summary.cv);
    for (name, value) in &summary.fixed_hyperparameters {
        println!("  {} = {}", name, value);
    }
    match &summary.search {
        Some(search) => {
            println!("  Grid search, inner CV: {}", search.cv);
            if let Some(scoring) = &search.scoring {
                println!("  Scoring: {}", scoring);
            }
            for (name, candidates) in &search.grid {
                let values: Vec<String> = candidates.iter().map(ToString::to_string).collect();
                println!("  {} in [{}]", name, values.join(", "));
            }
        }
        None => println!("  No hyperparameter search"),
    }
    println!();

    if !summary.warnings.is_empty() {
        println!("WARNINGS");
        println!("{}", "-".repeat(40));
        for warning in &summary.warnings {
            println!("  - {}", warning);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
}

/// `--cv` takes a fold count or the repeat grammar.
fn cv_from_arg(arg: &str) -> CvSpec {
    match arg.trim().parse::<usize>() {
        Ok(n_splits) => CvSpec::Folds(n_splits),
        Err(_) => CvSpec::from(arg),
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(" -> ")
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}
