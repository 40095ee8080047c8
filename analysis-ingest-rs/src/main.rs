use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use analysis_ingest::logging::init_logging;
use analysis_ingest::{AnalysisOrchestrator, Execution, IngestConfig};

/// Run one analysis for an execution record and print the result as JSON.
#[derive(Debug, Parser)]
#[command(name = "analysis-ingest", version, about)]
struct Cli {
    /// Path to the execution record (JSON)
    execution: PathBuf,

    /// Include external monitoring context
    #[arg(long)]
    monitoring: bool,

    /// Drop cached analyses for this execution before running
    #[arg(long)]
    invalidate: bool,

    /// Ignore any cached analysis (the fresh result is still cached)
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Logging setup failed: {}", e);
    }

    let execution: Execution = match std::fs::read_to_string(&cli.execution)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(execution) => execution,
        Err(e) => {
            error!(path = %cli.execution.display(), error = %e, "Failed to read execution record");
            return ExitCode::from(1);
        }
    };

    let orchestrator = match AnalysisOrchestrator::from_config(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "Failed to initialize orchestrator");
            return ExitCode::from(2);
        }
    };

    info!(
        execution_id = %execution.id,
        provider = %config.provider.kind,
        timeout_secs = orchestrator.timeout().as_secs(),
        "Starting analysis"
    );

    let maintenance = orchestrator.start_maintenance(config.cache.sweep_interval);

    if cli.invalidate {
        orchestrator.invalidate(&execution.id);
    }

    let record = if cli.no_cache {
        orchestrator.refresh(&execution, cli.monitoring).await
    } else {
        orchestrator.analyze(&execution, cli.monitoring).await
    };
    maintenance.abort();

    match serde_json::to_string_pretty(&record) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize analysis record");
            ExitCode::from(1)
        }
    }
}
