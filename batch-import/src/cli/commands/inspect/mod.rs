//! `inspect` command

mod handler;

pub use handler::handle_inspect_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectCommands {
    /// File to inspect
    pub file: PathBuf,

    /// Settings file (default: ./batch-import.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
