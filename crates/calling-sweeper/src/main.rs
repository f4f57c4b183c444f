//! Calling Sweeper
//!
//! Destroys calling service instances left behind by aborted test runs.
//! Instances are discovered across all shards and selected by name.

mod config;

use anyhow::Context;
use calling_client::{CallingServiceClient, ClientConfig};
use common::config::ObservabilityConfig;
use common::observability::init_tracing;
use config::SweeperConfig;
use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use tracing::{error, info, warn};

const DEFAULT_LOG_FILTER: &str = "calling=info";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let vars: HashMap<String, String> = env::vars().collect();

    let observability = ObservabilityConfig::from_vars(DEFAULT_LOG_FILTER, &vars)
        .context("Invalid observability configuration")?;
    init_tracing(&observability).context("Failed to initialise tracing")?;

    let client_config = ClientConfig::from_vars(&vars).map_err(|e| {
        error!(target: "calling.sweeper", "Failed to load configuration: {}", e);
        e
    })?;
    let sweeper_config = SweeperConfig::from_vars(&vars).map_err(|e| {
        error!(target: "calling.sweeper", "Failed to load configuration: {}", e);
        e
    })?;

    info!(
        target: "calling.sweeper",
        base_url = %client_config.base_url,
        shards = ?client_config.shards,
        name_filter = %sweeper_config.name_filter,
        dry_run = sweeper_config.dry_run,
        "Configuration loaded successfully"
    );

    let client = CallingServiceClient::new(&client_config)?;

    if sweeper_config.dry_run {
        let instances = client.get_all_running_instances().await?;
        let mut matching = 0_usize;
        for instance in instances
            .iter()
            .filter(|i| i.name_contains(&sweeper_config.name_filter))
        {
            matching += 1;
            info!(
                target: "calling.sweeper",
                instance_id = %instance.id,
                name = instance.name.as_deref().unwrap_or_default(),
                status = %instance.status,
                "Would stop instance"
            );
        }
        info!(
            target: "calling.sweeper",
            running = instances.len(),
            matching,
            "Dry run complete"
        );
        return Ok(ExitCode::SUCCESS);
    }

    let report = client
        .stop_instances_by_name(&sweeper_config.name_filter)
        .await?;

    for failure in &report.failed {
        warn!(
            target: "calling.sweeper",
            instance_id = %failure.instance_id,
            error = %failure.error,
            "Instance could not be stopped"
        );
    }
    info!(
        target: "calling.sweeper",
        stopped = report.stopped.len(),
        failed = report.failed.len(),
        "Sweep complete"
    );

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
