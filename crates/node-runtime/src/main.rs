//! # DNS Stream Analyzer Node
//!
//! ```text
//! dsa-node --rpc-port 50051 --store-addr redis://localhost:6379 --rule-suffix 70
//! ```
//!
//! Runs until Ctrl+C, then shuts down gateway first and logs the final
//! counters. Exits non-zero on any startup error.

use anyhow::{Context, Result};
use clap::Parser;
use node_runtime::{Cli, NodeRuntime};
use shared_types::Classify;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config();

    dsa_telemetry::init_telemetry(&config.telemetry).context("Failed to initialize telemetry")?;

    let runtime = match NodeRuntime::start(config).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, class = ?e.class(), "Node failed to start");
            return Err(e).context("Startup failed");
        }
    };

    info!(rpc = %runtime.local_addr(), "Node running. Press Ctrl+C to stop.");

    let report = runtime
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await?;

    if let Some(detector) = report.detector {
        info!(
            processed = detector.processed,
            matched = detector.matched,
            blocked = detector.blocked,
            rewound = detector.rewound,
            "Detector totals"
        );
    }
    Ok(())
}
