//! `simulate` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use ironnode_cli::simulation::{
    simulated_endpoints, NodeProfile, SimulatedNodes, Simulation, SimulationConfig,
};
use ironnode_cli::{CliError, CoreServices};
use tracing::{info, warn};
use write_behind::RequestLogStore;

use crate::cli::SimulateArgs;

/// Execute the `simulate` command
pub async fn run_simulate(args: &SimulateArgs) -> Result<()> {
    if let Some(ref path) = args.config {
        info!(config = %path.display(), "Loading configuration");
        if !path.exists() {
            return Err(CliError::config_not_found(path.display().to_string()).into());
        }
    }

    let config =
        config_loader::ConfigLoader::load(args.config.as_deref()).map_err(CliError::from)?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let profile = NodeProfile::new(Duration::from_millis(args.latency_ms), args.failure_rate)
        .with_jitter(args.jitter);
    profile.validate()?;

    let endpoints = simulated_endpoints(&config.nodes, args.nodes);
    let store = RequestLogStore::from_settings(&config.request_log)
        .context("Failed to open request log store")?;
    let services = CoreServices::init(&config, SimulatedNodes::new(profile), store)?;

    let simulation_config = SimulationConfig {
        mode: args.mode,
        requests: args.requests,
        max_attempts: args.max_attempts.unwrap_or(config.dispatcher.max_attempts),
        batch_size: args.batch_size,
        chain: args.chain.clone(),
        shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
    };

    info!(
        mode = args.mode.as_str(),
        requests = args.requests,
        endpoints = endpoints.len(),
        latency_ms = args.latency_ms,
        failure_rate = args.failure_rate,
        "Starting simulation"
    );

    let simulation = Simulation::new(simulation_config, services, endpoints)?;

    tokio::select! {
        result = simulation.run() => {
            let stats = result.context("Simulation failed")?;
            info!(
                operations = stats.dispatch.operations,
                succeeded = stats.dispatch.succeeded,
                dropped_logs = stats.dropped_logs(),
                duration_secs = stats.duration.as_secs_f64(),
                throughput = format!("{:.2}", stats.throughput()),
                "Simulation completed"
            );
            stats.print_summary();
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, abandoning simulation");
        }
    }

    info!("IronNode finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
