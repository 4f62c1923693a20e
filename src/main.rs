use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldscout_cli::app::{App, RunMode};
use fieldscout_cli::config::AppConfig;
use fieldscout_cli::report::{render, save_report, OutputFormat};

/// FieldScout - plan-driven web research through automation agents
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Research request, e.g. "find an acer laptop under $1000"
    query: Option<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Do not write the report to the results directory
    #[arg(long)]
    no_save: bool,

    /// Directory for saved reports
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,

    /// OpenAI API key (overrides config file and environment)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Model used for plan drafting
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,

    /// HTTP endpoint of the browser-automation agent
    #[arg(long, value_name = "URL")]
    agent_endpoint: Option<String>,

    /// Run against canned collaborators without any network traffic
    #[arg(long)]
    offline: bool,

    /// Total drafting attempts before giving up
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Print build information and exit
    #[arg(long)]
    build_info: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.build_info {
        println!(
            "fieldscout {} (built {} from {})",
            env!("CARGO_PKG_VERSION"),
            env!("BUILD_DATE"),
            env!("GIT_HASH")
        );
        return Ok(());
    }

    init_logging(&cli.log_level)?;

    let mut config = AppConfig::load(cli.config.as_deref());
    apply_cli_overrides(&mut config, &cli);

    let query = match cli.query.as_deref() {
        Some(query) if !query.trim().is_empty() => query.trim().to_string(),
        _ => prompt_for_query()?,
    };

    let mode = if cli.offline {
        RunMode::Offline
    } else {
        RunMode::Online
    };
    let app = App::new(config.clone(), mode);

    match app.run(&query).await {
        Ok(report) => {
            println!("{}", render(&report, cli.output)?);
            if !cli.no_save && !report.result.records.is_empty() {
                let path = save_report(&report, &config.results_dir)?;
                println!("Report saved to {}", path.display());
            }
            Ok(())
        }
        Err(err) => {
            error!("research run failed: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level.parse().context("invalid log level")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(key) = &cli.api_key {
        config.llm.api_keys.insert(0, key.clone());
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.llm.api_base = api_base.clone();
    }
    if let Some(endpoint) = &cli.agent_endpoint {
        config.agent.endpoint = Some(endpoint.clone());
    }
    if let Some(results_dir) = &cli.results_dir {
        config.results_dir = results_dir.clone();
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.run.max_attempts = max_attempts;
    }
}

fn prompt_for_query() -> Result<String> {
    println!("FieldScout research assistant");
    println!();
    println!("Example requests:");
    println!("  - find an acer laptop under $1000");
    println!("  - find 3 rust conferences in europe in 2026");
    println!("  - find the current price of the iphone 16");
    println!();
    print!("What should I research? ");
    io::stdout().flush()?;

    let mut query = String::new();
    io::stdin()
        .read_line(&mut query)
        .context("failed to read query")?;
    let query = query.trim().to_string();
    if query.is_empty() {
        anyhow::bail!("no research request given");
    }
    Ok(query)
}
