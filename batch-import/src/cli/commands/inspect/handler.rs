//! Inspect command handler

use anyhow::{Context, Result};
use colored::*;

use super::InspectCommands;
use batch_import::config::Settings;
use batch_import::import::matrix::ColumnName;
use batch_import::import::reader::read_path;
use batch_import::import::FieldInspector;

/// Handle the inspect command
pub async fn handle_inspect_command(args: InspectCommands) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    if !args.file.exists() {
        anyhow::bail!("File does not exist: {}", args.file.display());
    }

    let (_, settings) = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    let entity_type = &settings.import.entity_type;

    let table = read_path(&args.file, &settings.reader)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let matrix = table.into_matrix();

    println!(
        "{} {} {}",
        "File:".bold(),
        args.file.display(),
        format!("-> {}", entity_type).dimmed()
    );
    println!();

    for (name, exists) in matrix.header_info(entity_type, &settings.schema) {
        if exists {
            let column = ColumnName::parse(&name);
            let field = settings
                .schema
                .resolve_field(entity_type, column.field())
                .unwrap_or_else(|| column.field().to_string());
            let field_type = settings
                .schema
                .field_type(entity_type, &field)
                .or_else(|| column.type_hint())
                .unwrap_or_default();
            println!(
                "  {} {} {}",
                "✓".green(),
                name.bold(),
                format!("({}: {})", field, field_type).dimmed()
            );
        } else {
            println!("  {} {} {}", "✗".yellow(), name, "(ignored)".dimmed());
        }
    }

    let updates = matrix
        .records()
        .iter()
        .filter(|r| r.discriminator().is_some())
        .count();
    println!();
    println!(
        "{} records ({} inserts, {} updates)",
        matrix.len().to_string().bold(),
        matrix.len() - updates,
        updates
    );

    let violations = matrix.validate();
    if !violations.is_empty() {
        println!();
        for violation in &violations {
            println!("{} {}", "✗".red().bold(), violation);
        }
        anyhow::bail!("File has {} structural problems", violations.len());
    }

    Ok(())
}
