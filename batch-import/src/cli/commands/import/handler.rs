//! Import command handler

use anyhow::{Context, Result};
use colored::*;
use std::time::{Duration, Instant};

use super::ImportCommands;
use batch_import::config::Settings;
use batch_import::import::{
    FlashMessage, ImportOptions, ImportReport, Importer, MessageLevel, SqliteStore,
};

/// Handle the import command
pub async fn handle_import_command(args: ImportCommands) -> Result<()> {
    // Handle --no-color flag
    if args.no_color || args.json {
        colored::control::set_override(false);
    }

    if !args.file.exists() {
        anyhow::bail!("Import file does not exist: {}", args.file.display());
    }

    let (settings_path, settings) =
        Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    log::info!("Using settings from {}", settings_path.display());

    let store = SqliteStore::connect(&settings.store.database_url, settings.schema.clone())
        .await
        .with_context(|| format!("Failed to open store: {}", settings.store.database_url))?;

    let importer = Importer::new(&settings.import, &settings.schema, &store)
        .context("Invalid import configuration")?
        .with_options(ImportOptions {
            dry_run: args.dry_run,
            reader: settings.reader,
        });

    let started = Instant::now();
    let report = importer.import_file(&args.file).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print_report(&report, started.elapsed());
    }

    if report.is_aborted() {
        anyhow::bail!("Import aborted");
    }
    Ok(())
}

fn print_report(report: &ImportReport, elapsed: Duration) {
    for message in &report.messages {
        print_message(message);
    }

    if !report.ignored_columns.is_empty() {
        println!(
            "{} {}",
            "Ignored columns:".yellow(),
            report.ignored_columns.join(", ")
        );
    }

    if !report.is_aborted() {
        println!();
        println!(
            "{} inserted, {} updated, {} rejected",
            report.inserted.to_string().green().bold(),
            report.updated.to_string().cyan().bold(),
            report.rejected.len().to_string().red().bold()
        );
        if report.dry_run {
            println!("{}", "Dry run, nothing was saved".dimmed());
        }
    }

    if let Some(detail) = &report.detail {
        println!("{}", detail.dimmed());
    }
    println!(
        "{}",
        format!("Time: {:.2}ms", elapsed.as_secs_f64() * 1000.0).dimmed()
    );
}

fn print_message(message: &FlashMessage) {
    let marker = match message.level {
        MessageLevel::Success => "✓".green().bold(),
        MessageLevel::Info => "i".cyan().bold(),
        MessageLevel::Error => "✗".red().bold(),
    };
    match message.row {
        Some(row) => println!("{} {} {}", marker, format!("row {}:", row).dimmed(), message.text),
        None => println!("{} {}", marker, message.text),
    }
}
