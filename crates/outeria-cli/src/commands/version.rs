use miette::{IntoDiagnostic, Result};
use outeria_core::version::{version_string, VERSION};

pub fn run(json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({ "name": "outeria", "version": VERSION });
        println!("{}", serde_json::to_string(&output).into_diagnostic()?);
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
