//! kubeval CLI - evaluate Kubernetes support agent answers
//!
//! Usage:
//!   kubeval run                                 Run with ./kubeval.toml (if present)
//!   kubeval run --config kubeval.toml --quality high
//!   kubeval run --evaluator externally_tracked --sample 3
//!   kubeval run --concurrency 4 --output results/run.json
//!   kubeval classify "Pod is OOMKilled"         Show the category of a query
//!   kubeval examples --dir data/few_shot        List the example bank
//!
//! Ctrl-C stops a run early; the partial report is still written.

mod agent;

use agent::{MockAgent, QualityLevel};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kubeval_core::{
    load_example_dir, write_example_dir, write_report_json, CancellationToken, Dataset,
    EvaluationSystem, EvaluatorType, ExampleBank, QueryClassifier, RunConfig,
};
use kubeval_llm::{ClientSettings, CompletionClient, OpenAICompatibleClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "kubeval.toml";
const DEFAULT_DATASET: &str = "data/dataset.yaml";
const DEFAULT_EXAMPLE_DIR: &str = "data/few_shot";
const DEFAULT_OUTPUT_DIR: &str = "evaluation_results";

#[derive(Parser)]
#[command(name = "kubeval")]
#[command(about = "Kubernetes agent evaluation CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate mock-agent answers for every case in a dataset
    Run(RunArgs),
    /// Print the category assigned to a query
    Classify {
        /// Query text
        query: String,
    },
    /// List the example bank per category
    Examples {
        /// Example directory (defaults to the configured example_dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Config file (defaults to ./kubeval.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset YAML file
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Few-shot example directory
    #[arg(long)]
    examples: Option<PathBuf>,

    /// Scoring strategy: file_based, llm or externally_tracked
    #[arg(long)]
    evaluator: Option<String>,

    /// Promotion threshold in [0, 1]
    #[arg(long)]
    threshold: Option<f64>,

    /// Mock agent answer quality
    #[arg(long, value_enum, default_value_t = QualityLevel::Medium)]
    quality: QualityLevel,

    /// Only evaluate the first N cases
    #[arg(long)]
    sample: Option<usize>,

    /// Items scored at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Report path (defaults to a timestamped file in output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write promoted examples back to the example directory
    #[arg(long)]
    persist_promotions: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run(args) => {
            let exit_code = run_evaluation(args).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Commands::Classify { query } => classify(&query),
        Commands::Examples { dir, config } => list_examples(dir, config)?,
    }

    Ok(())
}

/// Config file, then OPENAI_* variables, then command-line flags
fn resolve_config(path: Option<&Path>) -> Result<RunConfig> {
    let mut config = match path {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).is_file() => RunConfig::load(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG))?,
        None => RunConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

fn build_client(config: &RunConfig) -> Result<Option<Arc<dyn CompletionClient>>> {
    if !config.evaluator_type.requires_model() {
        return Ok(None);
    }
    // validate() has already checked both are present
    let base_url = config.model.base_url.clone().unwrap_or_default();
    let model = config.model.model.clone().unwrap_or_default();

    let mut settings = ClientSettings::new(base_url, model).with_timeout(config.model.timeout());
    if let Some(key) = &config.model.api_key {
        settings = settings.with_api_key(key.clone());
    }
    let client: Arc<dyn CompletionClient> =
        Arc::new(OpenAICompatibleClient::new(settings).context("Failed to build model client")?);
    Ok(Some(client))
}

async fn run_evaluation(args: RunArgs) -> Result<i32> {
    let mut config = resolve_config(args.config.as_deref())?;

    if let Some(evaluator) = &args.evaluator {
        config.evaluator_type = evaluator.parse::<EvaluatorType>()?;
    }
    if let Some(threshold) = args.threshold {
        config.promotion_threshold = threshold;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(dataset) = args.dataset {
        config.dataset_path = Some(dataset);
    }
    if let Some(examples) = args.examples {
        config.example_dir = Some(examples);
    }
    if config.example_dir.is_none() && Path::new(DEFAULT_EXAMPLE_DIR).is_dir() {
        config.example_dir = Some(PathBuf::from(DEFAULT_EXAMPLE_DIR));
    }
    config.validate().context("Invalid configuration")?;

    let dataset_path = config
        .dataset_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET));
    let dataset = Dataset::load(&dataset_path)
        .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
    let cases = match args.sample {
        Some(n) => dataset.sample(n),
        None => dataset.test_cases.clone(),
    };

    let bank = match &config.example_dir {
        Some(dir) => load_example_dir(dir, config.dedup_policy)
            .with_context(|| format!("Failed to load examples from {}", dir.display()))?,
        None => ExampleBank::new().with_dedup_policy(config.dedup_policy),
    };
    let bank = Arc::new(bank);

    let client = build_client(&config)?;
    let system = EvaluationSystem::from_config(&config, bank.clone(), client)?
        .with_label(format!("mock-agent:{}", args.quality));

    let agent = MockAgent::new(args.quality);
    let items: Vec<_> = cases
        .into_iter()
        .map(|case| {
            let response = agent.respond(&case);
            case.into_item(response)
        })
        .collect();

    info!(
        dataset = %dataset.name,
        items = items.len(),
        quality = %agent.quality(),
        examples = bank.len(),
        "Running evaluation"
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with completed items");
            signal_token.cancel();
        }
    });

    let report = system.evaluate_batch_with_cancel(items, cancel).await;

    let output = args.output.unwrap_or_else(|| {
        let dir = config
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        dir.join(format!(
            "evaluation_results_{}_{}.json",
            args.quality,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ))
    });
    write_report_json(&output, &report)
        .with_context(|| format!("Failed to write report {}", output.display()))?;

    if args.persist_promotions && report.overall.promoted > 0 {
        if let Some(dir) = &config.example_dir {
            let written = write_example_dir(dir, &bank)
                .with_context(|| format!("Failed to write examples to {}", dir.display()))?;
            info!(files = written.len(), dir = %dir.display(), "Persisted example bank");
        }
    }

    println!("{}", report.render_summary());
    println!("Report written to {}", output.display());

    Ok(if report.is_cancelled() { 130 } else { 0 })
}

fn classify(query: &str) {
    let classifier = QueryClassifier::new();
    let category = classifier.classify(query);
    println!("{}", category);
    for (candidate, count) in classifier.match_counts(query) {
        if count > 0 {
            println!("  {:<16} {} indicator(s)", candidate.as_str(), count);
        }
    }
}

fn list_examples(dir: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config.as_deref())?;
    let dir = dir
        .or(config.example_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXAMPLE_DIR));
    let bank = load_example_dir(&dir, config.dedup_policy)
        .with_context(|| format!("Failed to load examples from {}", dir.display()))?;

    println!("{} example(s) in {}", bank.len(), dir.display());
    for (category, examples) in bank.snapshot() {
        println!("\n{} ({})", category, examples.len());
        for example in examples {
            let quality = example
                .quality_score
                .map(|q| format!("{:.2}", q))
                .unwrap_or_else(|| "-".to_string());
            println!("  {:<24} {:>5}  {}", example.id, quality, example.query_text);
        }
    }
    Ok(())
}

/// Initialize logging based on log level
fn init_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized

    Ok(())
}
