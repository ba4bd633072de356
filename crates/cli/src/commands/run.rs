//! Run command - continuous harvest loop

use anyhow::{Context, Result};
use harvester_domain::usecases::HarvestPass;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::args::RunArgs;
use crate::config::AppConfig;
use crate::wiring;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let shutdown = CancellationToken::new();
    let components = wiring::build(&config, shutdown.clone()).await?;
    let harvester = components.harvester;

    tracing::info!(
        once = args.once,
        sources = harvester.registrations().len(),
        poll_interval_secs = config.harvest.poll_interval_secs,
        target_count = ?config.harvest.target_count,
        "Starting harvester run"
    );

    if args.once {
        let pass = harvester.harvest_once().await;
        print_pass(&pass);
        return Ok(());
    }

    // Set up graceful shutdown
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                signal_token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    });

    harvester
        .run(shutdown)
        .await
        .context("Harvest loop failed to start")?;

    tracing::info!(
        passes = harvester.state().passes(),
        seen = harvester.state().seen_count(),
        "harvester run completed"
    );
    Ok(())
}

fn print_pass(pass: &HarvestPass) {
    println!("Pass {}", pass.pass_id);
    println!(
        "  Sources: {} ok, {} failed, {} skipped",
        pass.sources_ok, pass.sources_failed, pass.sources_skipped
    );
    println!(
        "  Items:   {} fetched, {} new",
        pass.items.len(),
        pass.newly_seen
    );
    match pass.stored_total() {
        Some(total) => println!("  Store:   {} total", total),
        None => println!("  Store:   not updated"),
    }
    if let Some(reset) = pass.retry_after {
        println!("  Rate limited, next window in {}s", reset.as_secs());
    }
}
