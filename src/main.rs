//! deep-datasource: run DEEP queries and health checks from the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use deep_datasource::{
    check_health, DatasourceSettings, DispatchRequest, HttpTransport, QueryResult, QueryRouter,
};

#[derive(Parser)]
#[command(name = "deep-datasource")]
#[command(about = "Query a DEEP backend and render the results as frames")]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Backend {
    /// Path to a JSON settings file
    #[arg(short, long, conflicts_with = "url")]
    settings: Option<PathBuf>,

    /// Base URL of the DEEP backend
    #[arg(short, long)]
    url: Option<String>,
}

impl Backend {
    fn settings(&self) -> Result<DatasourceSettings> {
        match (&self.settings, &self.url) {
            (Some(path), _) => DatasourceSettings::load(path),
            (None, Some(url)) => Ok(DatasourceSettings::new(url.clone())),
            (None, None) => bail!("Either --settings or --url is required"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of queries and print the results as JSON
    Query {
        #[command(flatten)]
        backend: Backend,

        /// Path to a JSON request: {"headers": {...}, "queries": [...]}
        #[arg(short, long)]
        request: PathBuf,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
    /// Check that the backend answers as a DEEP instance
    Health {
        #[command(flatten)]
        backend: Backend,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn result_json(result: &QueryResult) -> Result<Value> {
    Ok(match result {
        Ok(frames) => json!({ "frames": serde_json::to_value(frames)? }),
        Err(err) => json!({ "error": err.to_string(), "status": err.status() }),
    })
}

fn run_query(backend: &Backend, request: &Path, pretty: bool) -> Result<ExitCode> {
    let settings = backend.settings()?;
    let contents = std::fs::read_to_string(request)
        .with_context(|| format!("Failed to read request file: {}", request.display()))?;
    let request: DispatchRequest = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse request file: {}", request.display()))?;

    let router = QueryRouter::from_settings(&settings)?;
    let results = router.dispatch(request);
    info!(results = results.len(), "queries complete");

    let mut output = BTreeMap::new();
    for (ref_id, result) in &results {
        output.insert(ref_id.as_str(), result_json(result)?);
    }

    let text = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(ExitCode::SUCCESS)
}

fn run_health(backend: &Backend) -> Result<ExitCode> {
    let settings = backend.settings()?;
    let transport = HttpTransport::new(&settings)?;
    let result = check_health(&transport, &settings.headers);

    println!("{}", serde_json::to_string(&result)?);
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match &cli.command {
        Commands::Query {
            backend,
            request,
            pretty,
        } => run_query(backend, request, *pretty),
        Commands::Health { backend } => run_health(backend),
    }
}
