//! `outeria serve` command implementation.

use super::load_project;
use miette::{IntoDiagnostic, Result};
use outeria_core::{dev, Config};

/// Run the dev server until Ctrl-C. Flags override `outeria.json`.
pub fn run(config: &Config, port: Option<u16>, host: Option<String>) -> Result<()> {
    let mut project = load_project(config)?;
    if let Some(port) = port {
        project.server.port = port;
    }
    if let Some(host) = host {
        project.server.host = host;
    }

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime
        .block_on(dev::serve(&project))
        .map_err(|e| miette::miette!(code = e.code(), "{}", e))
}
