use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use flags::EmbedMode;
use std::io;
use std::path::PathBuf;

mod commands;
mod config;
mod dataset;
mod flags;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "actionplan")]
#[command(about = "Structured action plans for customer service requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Configuration file (default: ./actionplan.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Embedding model directory (overrides ACTIONPLAN_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Group dataset reasons into categories and write the labeled dataset
    Cluster(ClusterArgs),

    /// Train the category classifier on a labeled dataset
    Train(TrainArgs),

    /// Produce an action plan for one customer request
    Run(RunArgs),

    /// Print the JSON Schema of the action plan
    Schema,
}

#[derive(Args)]
struct ClusterArgs {
    /// Input dataset (JSON array or JSON Lines)
    #[arg(long)]
    dataset: PathBuf,

    /// Output path for the labeled dataset (JSON Lines)
    #[arg(long)]
    output: PathBuf,

    /// Number of categories to discover
    #[arg(long)]
    clusters: Option<usize>,

    /// Name a cluster, e.g. `--label 0=billing` (repeatable)
    #[arg(long = "label", value_name = "ID=NAME", value_parser = flags::parse_label)]
    labels: Vec<(usize, String)>,
}

#[derive(Args)]
struct TrainArgs {
    /// Labeled dataset (JSON array or JSON Lines)
    #[arg(long)]
    dataset: PathBuf,

    /// Where to save the classifier
    #[arg(long)]
    output: PathBuf,

    /// Neighbours consulted per prediction
    #[arg(long)]
    neighbors: Option<usize>,
}

#[derive(Args)]
struct RunArgs {
    /// Labeled dataset used for few-shot examples
    #[arg(long)]
    dataset: PathBuf,

    /// Classifier saved by `train`
    #[arg(long)]
    model: PathBuf,

    /// Customer request text, or `-` to read it from stdin
    text: String,

    /// Print the full trace (prediction, examples, prompt, result)
    #[arg(long)]
    explain: bool,

    /// Stop after building the prompt; do not call the generation service
    #[arg(long)]
    dry_run: bool,

    /// Few-shot examples to include
    #[arg(long)]
    examples: Option<usize>,

    /// Deadline for the whole request in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Generation endpoint base URL (overrides ACTIONPLAN_GENERATION_URL)
    #[arg(long)]
    generation_url: Option<String>,

    /// Generation model (overrides ACTIONPLAN_GENERATION_MODEL)
    #[arg(long)]
    generation_model: Option<String>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // ORT is extremely noisy
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(mode) = cli.embed_mode {
        config.set_embedding_mode(mode.as_str())?;
    }
    if let Some(dir) = &cli.model_dir {
        config.set_model_dir(dir.clone());
    }

    let output = match cli.command {
        Commands::Cluster(args) => {
            if let Some(clusters) = args.clusters {
                config.cluster.clusters = clusters;
            }
            for (id, name) in args.labels {
                config.set_cluster_label(id, name);
            }
            commands::cluster(&config, &args.dataset, &args.output).await?
        }
        Commands::Train(args) => {
            if let Some(neighbors) = args.neighbors {
                config.classifier.neighbors = neighbors;
            }
            commands::train(&config, &args.dataset, &args.output).await?
        }
        Commands::Run(args) => {
            if let Some(examples) = args.examples {
                config.pipeline.retrieval.examples = examples;
            }
            if args.deadline_ms.is_some() {
                config.pipeline.deadline_ms = args.deadline_ms;
            }
            if let Some(url) = args.generation_url {
                config.generation.base_url = url;
            }
            if let Some(model) = args.generation_model {
                config.generation.model = model;
            }
            commands::run(
                &config,
                commands::RunOptions {
                    dataset: &args.dataset,
                    model: &args.model,
                    text: &args.text,
                    explain: args.explain,
                    dry_run: args.dry_run,
                },
            )
            .await?
        }
        Commands::Schema => commands::schema(),
    };

    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .context("Failed to serialize output")?;
    print_stdout(&text)
}
