//! Command line interface

pub mod commands;

use clap::{Parser, Subcommand};

use commands::import::ImportCommands;
use commands::inspect::InspectCommands;

#[derive(Parser, Debug)]
#[command(name = "batch-import")]
#[command(about = "Create or update entities in bulk from CSV and spreadsheet files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a file into the configured entity type
    Import(ImportCommands),
    /// Show how a file would be read, without touching the store
    Inspect(InspectCommands),
}
