use std::{fmt::Display, path::PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use sift_cli::{
    commands::{analyze, datasets, kaggle, usage},
    config::{Overrides, load_or_default, resolve},
    render::{DatasetDetail, DatasetTable, KaggleTable, ReportView, UsageView},
};
use sift_core::{BASE_URL_ENV, Dashboard};
use sift_http::HttpBackend;

#[derive(Debug, Parser)]
#[command(name = "sift", about = "AI data analysis dashboard client", version)]
struct Cli {
    /// Path to the configuration file (defaults to ./sift.toml, then the user config dir)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base URL of the analysis backend
    #[arg(long, env = BASE_URL_ENV, value_name = "URL")]
    api_url: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List uploaded datasets
    Datasets,

    /// Show one dataset
    Dataset {
        id: String,
    },

    /// Upload a CSV, JSON or Excel file
    Upload {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Delete a dataset
    Delete {
        id: String,
    },

    /// Search and import Kaggle datasets
    #[command(subcommand)]
    Kaggle(KaggleCommand),

    /// Ask a question about a dataset
    Analyze(AnalyzeArgs),

    /// Show today's token usage
    Usage,

    /// Poll token usage until interrupted
    WatchUsage,
}

#[derive(Debug, Subcommand)]
enum KaggleCommand {
    /// Search Kaggle for CSV datasets
    Search {
        query: String,
        /// Number of results (1-50)
        #[arg(long, default_value_t = kaggle::DEFAULT_MAX_RESULTS)]
        max_results: u32,
    },

    /// Import a Kaggle dataset by its owner/slug reference
    Download {
        #[arg(value_name = "REF")]
        dataset_ref: String,
    },
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    /// Dataset to analyze
    #[arg(short, long, value_name = "ID")]
    dataset: String,

    /// The question, in plain language
    #[arg(required = true, num_args = 1.., value_name = "QUERY")]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = load_or_default(cli.config.as_deref())?;
    let settings = resolve(
        &file,
        Overrides {
            base_url: cli.api_url,
        },
    )?;

    let backend = HttpBackend::with_timeout(settings.client.clone(), settings.timeout)?;
    let dashboard = Dashboard::init(settings.client, backend);
    let json = cli.json;

    match cli.command {
        Commands::Datasets => {
            let list = datasets::list(&dashboard).await?;
            emit(json, &list, DatasetTable(&list))?;
        }
        Commands::Dataset { id } => {
            let dataset = datasets::show(&dashboard, &id).await?;
            emit(json, &dataset, DatasetDetail(&dataset))?;
        }
        Commands::Upload { path } => {
            let dataset = datasets::upload(&dashboard, &path).await?;
            emit(json, &dataset, DatasetDetail(&dataset))?;
        }
        Commands::Delete { id } => {
            datasets::delete(&dashboard, &id).await?;
            emit(json, &serde_json::json!({ "deleted": &id }), format!("deleted {id}"))?;
        }
        Commands::Kaggle(KaggleCommand::Search { query, max_results }) => {
            let results = kaggle::search(&dashboard, &query, max_results).await?;
            emit(json, &results, KaggleTable(&results))?;
        }
        Commands::Kaggle(KaggleCommand::Download { dataset_ref }) => {
            let dataset = kaggle::download(&dashboard, &dataset_ref).await?;
            emit(json, &dataset, DatasetDetail(&dataset))?;
        }
        Commands::Analyze(args) => {
            let query = args.query.join(" ");
            let report = analyze::analyze(&dashboard, &args.dataset, &query).await?;
            emit(json, &*report, ReportView(&report))?;
        }
        Commands::Usage => {
            let report = usage::snapshot(&dashboard).await?;
            emit(json, &report, UsageView(&report))?;
        }
        Commands::WatchUsage => {
            usage::watch(&dashboard, |report| emit(json, report, UsageView(report))).await?;
        }
    }

    dashboard.dispose();
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn emit<T>(json: bool, value: &T, text: impl Display) -> eyre::Result<()>
where
    T: Serialize + ?Sized,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
