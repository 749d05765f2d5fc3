//! `outeria build` command implementation.

use super::load_project;
use miette::{IntoDiagnostic, MietteDiagnostic, Report, Result};
use outeria_core::build::watch as watcher;
use outeria_core::{dev, BuildError, BuildOptions, BuildReport, Config, Pipeline};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Serialize)]
struct BuildErrorJson {
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

/// One build result, as printed with `--json`.
#[derive(Serialize)]
struct BuildResultJson<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a BuildReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<BuildErrorJson>,
}

impl<'a> BuildResultJson<'a> {
    fn new(result: &'a Result<BuildReport, BuildError>) -> Self {
        match result {
            Ok(report) => Self {
                ok: true,
                report: Some(report),
                error: None,
            },
            Err(err) => Self {
                ok: false,
                report: None,
                error: Some(BuildErrorJson {
                    code: err.code(),
                    stage: err.failed_stage().map(|s| s.as_str()),
                    message: err.to_string(),
                    location: err.location().map(str::to_string),
                }),
            },
        }
    }
}

/// Run one build. Exits non-zero on failure.
pub fn run(config: &Config, options: BuildOptions) -> Result<()> {
    let pipeline = Pipeline::new(load_project(config)?);
    let result = pipeline.run(options);

    if config.json_logs {
        println!(
            "{}",
            serde_json::to_string(&BuildResultJson::new(&result)).into_diagnostic()?
        );
        if result.is_err() {
            std::process::exit(1);
        }
        return Ok(());
    }

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(err) => Err(diagnostic(&err)),
    }
}

/// Build, then rebuild on change until Ctrl-C.
pub fn watch(config: &Config, options: BuildOptions) -> Result<()> {
    let pipeline = Pipeline::new(load_project(config)?);
    let json = config.json_logs;

    let stop = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime.spawn({
        let stop = Arc::clone(&stop);
        async move {
            dev::shutdown_signal().await;
            stop.store(true, Ordering::SeqCst);
        }
    });

    if !json {
        println!("Watching {} (Ctrl+C to stop)", watcher::watch_root(&pipeline).display());
    }

    watcher::watch(&pipeline, options, &stop, |result| {
        if json {
            match serde_json::to_string(&BuildResultJson::new(result)) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to serialize build result"),
            }
            return;
        }
        match result {
            Ok(report) => print_report(report),
            Err(err) => eprintln!("{:?}", diagnostic(err)),
        }
    })
    .map_err(|e| miette::miette!(code = e.code(), "{}", e))
}

fn diagnostic(err: &BuildError) -> Report {
    let mut diag = MietteDiagnostic::new(err.to_string()).with_code(err.code());
    if let Some(location) = err.location() {
        diag = diag.with_help(format!("at {location}"));
    }
    Report::new(diag)
}

fn print_report(report: &BuildReport) {
    let mode = if report.production {
        "production"
    } else {
        "development"
    };
    println!(
        "Built {} module(s), {} stylesheet(s) in {}ms ({mode})",
        report.modules.len(),
        report.stylesheets.len(),
        report.duration_ms
    );

    let width = report
        .artifacts
        .iter()
        .map(|a| a.path.len())
        .max()
        .unwrap_or(0);
    for artifact in &report.artifacts {
        println!(
            "  {:<width$}  {:>9}  {}",
            artifact.path,
            format_size(artifact.bytes),
            artifact.hash
        );
    }
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
    }

    #[test]
    fn test_error_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(outeria_core::ProjectConfig::with_root(dir.path()));
        let result = pipeline.run(BuildOptions::production());

        let json = serde_json::to_value(BuildResultJson::new(&result)).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["code"], "BUILD_ENTRY_NOT_FOUND");
        assert_eq!(json["error"]["stage"], "transpile");
        assert!(json.get("report").is_none());
    }
}
