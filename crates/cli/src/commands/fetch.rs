//! Fetch command - resolve the item list once

use anyhow::Result;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::args::FetchArgs;
use crate::commands::print_items;
use crate::config::AppConfig;
use crate::wiring;

pub async fn execute(args: FetchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = AppConfig::load(config_path.as_deref())?;

    // The process exits right after answering
    config.resolver.background_harvest = false;

    let components = wiring::build(&config, CancellationToken::new()).await?;
    let resolution = if args.refresh {
        components.resolver.refresh().await
    } else {
        components.resolver.resolve().await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolution.items)?);
    } else {
        print_items(&resolution.items);
        println!();
        println!(
            "{} items (origin: {})",
            resolution.items.len(),
            resolution.origin.as_str()
        );
    }

    if resolution.origin.is_degraded() {
        tracing::warn!(
            origin = resolution.origin.as_str(),
            "Served a fallback result; live sources returned nothing"
        );
    }

    Ok(())
}
