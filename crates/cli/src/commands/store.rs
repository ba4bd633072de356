//! Store command - inspect the durable store

use anyhow::{Context, Result};
use harvester_domain::usecases::sort_for_presentation;
use std::path::PathBuf;

use crate::args::{StoreArgs, StoreCommands};
use crate::commands::print_items;
use crate::config::AppConfig;
use crate::wiring;

pub async fn execute(args: StoreArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = wiring::build_store(&config).await?;

    match args.command {
        StoreCommands::Count => {
            let count = store.count().await.context("Failed to count stored items")?;
            println!("{}", count);
        }
        StoreCommands::List { json } => {
            let mut items = store.load().await.context("Failed to load stored items")?;
            sort_for_presentation(&mut items);

            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("Store is empty");
            } else {
                print_items(&items);
                println!();
                println!("{} items", items.len());
            }
        }
    }

    Ok(())
}
