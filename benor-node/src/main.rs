use std::path::Path;

use benor_node::{
    cli::{Cli, Commands},
    launch_network,
    runtime::{build_runtime, NodeReport},
    simulate,
};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());

    match cli.command {
        Commands::Node(args) => {
            let config = args.into_config()?;
            let runtime = build_runtime(&config).await?;
            info!(node = %config.id, addr = %runtime.local_addr()?, "node ready, waiting for /start. Press Ctrl+C to stop.");
            runtime.serve_until(shutdown_signal()).await?;
        }
        Commands::Launch(args) => {
            let plan = args.into_plan()?;
            let reports = launch_network(&plan).await?;
            print_reports(&reports)?;
        }
        Commands::Simulate { cluster, drop_rate } => {
            let plan = cluster.into_plan()?.with_drop_rate(drop_rate);
            plan.validate()?;
            let reports = simulate(&plan).await?;
            print_reports(&reports)?;
        }
    }
    Ok(())
}

/// Stdout gets everything but the `consensus` target; with a log file,
/// that target goes to the file.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (consensus_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().unwrap_or(path.as_os_str());
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                    metadata.target() == "consensus"
                }));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_filter(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,benor_node=debug".into()))
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target() != "consensus"
        }));

    tracing_subscriber::registry()
        .with(consensus_layer)
        .with(stdout_layer)
        .init();

    guard
}

fn print_reports(reports: &[NodeReport]) -> Result<(), Box<dyn std::error::Error>> {
    for report in reports {
        println!("node {}: {} {}", report.id, report.outcome, serde_json::to_string(&report.state)?);
    }

    let decided: Vec<&str> = reports
        .iter()
        .filter(|r| r.outcome.starts_with("decided"))
        .map(|r| r.outcome.as_str())
        .collect();
    match decided.first() {
        Some(first) if decided.iter().all(|d| d == first) => info!(value = %first, nodes = decided.len(), "agreement reached"),
        Some(_) => error!(?decided, "nodes disagree"),
        None => info!("no node decided"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
    }
    info!("shutting down");
}
