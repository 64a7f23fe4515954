//! Report engine CLI - validate and run report definitions
//!
//! Usage:
//!   report-engine run <definition.json> [--user <id>] [--config <file>]
//!   report-engine validate <definition.json> [--user <id>]
//!   report-engine options
//!   report-engine bucket --driver <driver> --field <sql> --bucket <bucket>
//!
//! Examples:
//!   report-engine run reports/monthly_revenue.json --user 42
//!   report-engine bucket --driver pgsql --field '"orders"."created_at"' --bucket month

use clap::{Parser, Subcommand};
use report_engine::catalog::{report_options, MemoryCatalog};
use report_engine::config::Settings;
use report_engine::logging;
use report_engine::report::{ReportContext, ReportEngine, ReportEngineFactory, ReportError};
use report_engine::sql::{Bucket, Dialect, SqlDialect};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "report-engine")]
#[command(about = "Validate and run chart report definitions against SQL databases")]
#[command(version)]
struct Cli {
    /// Config file (overrides REPORT_ENGINE_CONFIG and default locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a report definition and print the chart data
    Run {
        /// Path to the definition JSON file
        file: PathBuf,

        /// Requesting user (needed for stored filters)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Validate a report definition without running it
    Validate {
        /// Path to the definition JSON file
        file: PathBuf,

        /// Requesting user (needed for stored filters)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List reportable entities and fields
    Options,

    /// Print the time bucket expression for a driver
    Bucket {
        /// Database driver (sqlite, pgsql, mysql)
        #[arg(short, long, default_value = "sqlite")]
        driver: String,

        /// Already-quoted column expression
        #[arg(short, long)]
        field: String,

        /// none, day, week, month, quarter or year
        #[arg(short, long)]
        bucket: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.logging);

    match cli.command {
        Commands::Run { file, user } => block_on(cmd_run(&settings, &file, user)),
        Commands::Validate { file, user } => block_on(cmd_validate(&settings, &file, user)),
        Commands::Options => cmd_options(&settings),
        Commands::Bucket {
            driver,
            field,
            bucket,
        } => cmd_bucket(&driver, &field, &bucket),
    }
}

fn block_on<F: std::future::Future<Output = ExitCode>>(future: F) -> ExitCode {
    match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(future),
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_run(settings: &Settings, file: &Path, user: Option<String>) -> ExitCode {
    let Some((engine, definition)) = prepare(settings, file) else {
        return ExitCode::FAILURE;
    };
    let ctx = ReportContext::new(user).with_query_timeout(settings.query.timeout());

    match engine.run(&definition, &ctx).await {
        Ok(result) => print_json(&result),
        Err(ReportError::Validation(invalid)) => {
            eprintln!("Invalid report definition:");
            for error in &invalid.errors {
                eprintln!("  error: {}", error);
            }
            for warning in &invalid.warnings {
                eprintln!("  warning: {}", warning);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Report failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_validate(settings: &Settings, file: &Path, user: Option<String>) -> ExitCode {
    let Some((engine, definition)) = prepare(settings, file) else {
        return ExitCode::FAILURE;
    };
    let ctx = ReportContext::new(user).with_query_timeout(settings.query.timeout());

    let outcome = engine.validate(&definition, &ctx).await;
    let code = print_json(&outcome);
    if outcome.valid {
        code
    } else {
        ExitCode::FAILURE
    }
}

fn cmd_options(settings: &Settings) -> ExitCode {
    let catalog = match settings.catalog.resolved_path() {
        Ok(Some(path)) => MemoryCatalog::from_file(path),
        Ok(None) => {
            eprintln!("No catalog configured ([catalog] path)");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match catalog {
        Ok(catalog) => print_json(&report_options(&catalog)),
        Err(e) => {
            eprintln!("Error loading catalog: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_bucket(driver: &str, field: &str, bucket: &str) -> ExitCode {
    let Some(bucket) = Bucket::parse(&bucket.trim().to_lowercase()) else {
        eprintln!("Bucket '{}' is not supported", bucket);
        return ExitCode::FAILURE;
    };
    println!("{}", Dialect::from_driver(driver).bucket_expr(field, bucket));
    ExitCode::SUCCESS
}

/// Build the configured engine and read the definition file.
fn prepare(settings: &Settings, file: &Path) -> Option<(Arc<dyn ReportEngine>, Value)> {
    let definition = match read_definition(file) {
        Ok(definition) => definition,
        Err(message) => {
            eprintln!("{}", message);
            return None;
        }
    };

    match ReportEngineFactory::new().from_settings(settings) {
        Ok(engine) => Some((engine, definition)),
        Err(e) => {
            eprintln!("Failed to build report engine: {}", e);
            None
        }
    }
}

fn read_definition(file: &Path) -> Result<Value, String> {
    let source = fs::read_to_string(file)
        .map_err(|e| format!("Error reading file '{}': {}", file.display(), e))?;
    serde_json::from_str(&source).map_err(|e| format!("Error parsing '{}': {}", file.display(), e))
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}
