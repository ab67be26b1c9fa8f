mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => cli::commands::import::handle_import_command(args).await,
        Commands::Inspect(args) => cli::commands::inspect::handle_inspect_command(args).await,
    }
}
