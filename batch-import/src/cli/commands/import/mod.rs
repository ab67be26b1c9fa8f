//! `import` command

mod handler;

pub use handler::handle_import_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ImportCommands {
    /// CSV, xlsx, xls or ods file to import
    pub file: PathBuf,

    /// Settings file (default: ./batch-import.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Validate and report without saving anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
