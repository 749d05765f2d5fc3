//! `outeria init` command implementation.

use miette::{IntoDiagnostic, Result};
use outeria_core::{scaffold, Config};

/// Write the scaffold. Existing files are kept unless `force`.
pub fn run(config: &Config, force: bool) -> Result<()> {
    let report = scaffold::init(&config.cwd, force)
        .map_err(|e| miette::miette!(code = "INIT_WRITE_FAILED", "{}", e))?;

    if config.json_logs {
        let output = serde_json::json!({
            "ok": true,
            "created": report.created,
            "overwritten": report.overwritten,
            "skipped": report.skipped,
        });
        println!("{}", serde_json::to_string(&output).into_diagnostic()?);
        return Ok(());
    }

    if !report.created.is_empty() {
        println!("Created:");
        for file in &report.created {
            println!("  + {file}");
        }
    }
    if !report.overwritten.is_empty() {
        println!("Overwritten:");
        for file in &report.overwritten {
            println!("  ~ {file}");
        }
    }
    if !report.skipped.is_empty() {
        println!("Skipped (already exists, use --force to overwrite):");
        for file in &report.skipped {
            println!("  - {file}");
        }
    }
    println!("\nDone! Run `outeria build` and then `outeria serve`.");
    Ok(())
}
