//! Project scaffold written by `outeria init`.
//!
//! The entry module exports a no-op `initialize(element)` and imports the
//! stylesheet so the styles stage has something to extract. The call that
//! initializes components on `<body>` lives in `static/index.html`, not in
//! the bundle.
//!
//! Non-destructive unless forced: existing files are left alone.

use crate::error::Error;
use outeria_util::fs::atomic_write;
use serde::Serialize;
use std::path::Path;

/// A file written by [`init`].
#[derive(Debug, Clone, Copy)]
pub struct Template {
    /// Path relative to the project root.
    pub path: &'static str,
    pub content: &'static str,
}

/// Scaffold files, in write order.
pub const TEMPLATES: &[Template] = &[
    Template {
        path: "src/outeria.ts",
        content: include_str!("../../templates/outeria.ts"),
    },
    Template {
        path: "src/outeria.scss",
        content: include_str!("../../templates/outeria.scss"),
    },
    Template {
        path: "static/index.html",
        content: include_str!("../../templates/index.html"),
    },
    Template {
        path: "outeria.json",
        content: include_str!("../../templates/outeria.json"),
    },
];

/// Outcome of [`init`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub created: Vec<&'static str>,
    pub overwritten: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
}

/// Write the scaffold into `root`. Existing files are skipped unless `force`.
pub fn init(root: &Path, force: bool) -> Result<InitReport, Error> {
    let mut report = InitReport::default();

    for template in TEMPLATES {
        let path = root.join(template.path);
        let exists = path.exists();
        if exists && !force {
            tracing::debug!(path = template.path, "exists, skipping");
            report.skipped.push(template.path);
            continue;
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        atomic_write(&path, template.content.as_bytes()).map_err(|source| Error::Write {
            path: path.clone(),
            source,
        })?;

        if exists {
            report.overwritten.push(template.path);
        } else {
            report.created.push(template.path);
        }
    }

    tracing::info!(
        created = report.created.len(),
        overwritten = report.overwritten.len(),
        skipped = report.skipped.len(),
        "scaffold written"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use tempfile::tempdir;

    fn template(path: &str) -> &'static str {
        TEMPLATES
            .iter()
            .find(|t| t.path == path)
            .map(|t| t.content)
            .unwrap()
    }

    #[test]
    fn test_entry_exports_noop_initialize_without_call() {
        let entry = template("src/outeria.ts");
        assert!(entry.contains("import \"./outeria.scss\";"));
        assert!(entry.contains("export const initialize = (element: HTMLElement): void => {};"));
        assert!(!entry.contains("initialize(document.body)"));
    }

    #[test]
    fn test_host_page_calls_initialize() {
        let html = template("static/index.html");
        assert!(html.contains("/dist/outeria.min.css"));
        assert!(html.contains("/dist/outeria.min.js"));
        assert!(html.contains("Outeria.initialize(document.body);"));
    }

    #[test]
    fn test_config_template_matches_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("outeria.json"), template("outeria.json")).unwrap();
        let loaded = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, ProjectConfig::with_root(dir.path()));
    }

    #[test]
    fn test_init_creates_then_skips() {
        let dir = tempdir().unwrap();

        let first = init(dir.path(), false).unwrap();
        assert_eq!(first.created.len(), TEMPLATES.len());
        assert!(first.skipped.is_empty());
        assert!(dir.path().join("src/outeria.ts").is_file());
        assert!(dir.path().join("static/index.html").is_file());

        std::fs::write(dir.path().join("src/outeria.ts"), "// mine\n").unwrap();
        let second = init(dir.path(), false).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.skipped.len(), TEMPLATES.len());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/outeria.ts")).unwrap(),
            "// mine\n"
        );
    }

    #[test]
    fn test_init_force_overwrites() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/outeria.ts"), "// mine\n").unwrap();

        let report = init(dir.path(), true).unwrap();
        assert_eq!(report.overwritten, vec!["src/outeria.ts"]);
        assert_eq!(report.created.len(), TEMPLATES.len() - 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/outeria.ts")).unwrap(),
            template("src/outeria.ts")
        );
    }
}
