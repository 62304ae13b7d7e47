use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Builds an offline text corpus from the document store.
#[derive(Debug, Parser)]
#[command(name = "corpus-collector", version)]
pub struct Cli {
    /// RON run configuration.
    #[arg(short, long, global = true, default_value = "collector.ron")]
    pub config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every not yet ingested document and write it to the data directory.
    Collect {
        /// Stop after this many documents instead of the store's count.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print how many documents match the configured filter.
    Count,
    /// Print the most recent update time of the configured document type.
    Latest,
}
