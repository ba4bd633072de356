//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// harvester: collect open-source resources and tech news into a durable, cached list
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the continuous harvest loop
    Run(RunArgs),

    /// Resolve the item list through cache, store, live harvest and fallback
    Fetch(FetchArgs),

    /// Serve the item list over HTTP
    Serve(ServeArgs),

    /// Inspect the durable store
    Store(StoreArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single harvest pass and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip the cache and force a live harvest pass
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides serve.bind)
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    #[command(subcommand)]
    pub command: StoreCommands,
}

#[derive(Subcommand, Debug)]
pub enum StoreCommands {
    /// Print the number of stored items
    Count,

    /// List stored items in presentation order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration after file and environment layering
    Show,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Check specific component (config, store, cache, sources)
    #[arg(long)]
    pub check: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
