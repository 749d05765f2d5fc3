//! Runtime and project configuration.
//!
//! `Config` carries CLI-level settings (working directory, logging).
//! `ProjectConfig` describes the project layout: where the entry lives, where the
//! bundle goes, and which directories the dev server mounts. It is read from an
//! optional `outeria.json` at the project root; every field has a default matching
//! the stock boilerplate, so a project without the file builds and serves as-is.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional project config file.
pub const CONFIG_FILE: &str = "outeria.json";

/// Environment variable whose presence selects watch (non-production) builds.
pub const WATCH_ENV: &str = "ROLLUP_WATCH";

/// Default dev server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Runtime configuration for the outeria CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory (project root).
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Project layout and tool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project root. Not read from the file; set by [`ProjectConfig::load`].
    #[serde(skip)]
    pub root: PathBuf,
    /// Bundle settings.
    pub bundle: BundleConfig,
    /// Dev server settings.
    pub server: ServerConfig,
}

/// Bundle pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    /// Entry module, relative to the project root.
    pub input: PathBuf,
    /// Output bundle, relative to the project root.
    pub file: PathBuf,
    /// Global variable name for script-tag consumers.
    pub name: String,
    /// Emit `.map` files for the bundle and the extracted stylesheet.
    pub sourcemap: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("src/outeria.ts"),
            file: PathBuf::from("dist/outeria.min.js"),
            name: "Outeria".to_string(),
            sourcemap: true,
        }
    }
}

/// Dev server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
    /// Development mode: no caching, files re-read per request.
    pub dev: bool,
    /// Directory mounted at `/`.
    pub static_dir: PathBuf,
    /// Directory mounted at `dist_prefix`.
    pub dist_dir: PathBuf,
    /// URL prefix for `dist_dir`.
    pub dist_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "127.0.0.1".to_string(),
            dev: true,
            static_dir: PathBuf::from("static"),
            dist_dir: PathBuf::from("dist"),
            dist_prefix: "/dist".to_string(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            bundle: BundleConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Defaults rooted at `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load `outeria.json` from `root`, falling back to defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(root = %root.display(), "no {CONFIG_FILE}, using defaults");
            return Ok(Self::with_root(root));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let mut config: Self =
            serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
                path: path.clone(),
                source,
            })?;
        config.root = root.to_path_buf();
        tracing::debug!(path = %path.display(), "loaded project config");
        Ok(config)
    }

    /// Absolute path of the entry module.
    #[must_use]
    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.bundle.input)
    }

    /// Absolute path of the output bundle.
    #[must_use]
    pub fn bundle_path(&self) -> PathBuf {
        self.root.join(&self.bundle.file)
    }

    /// Absolute path of the extracted stylesheet: the bundle path with `.css`
    /// in place of `.js` (`outeria.min.js` → `outeria.min.css`).
    #[must_use]
    pub fn stylesheet_path(&self) -> PathBuf {
        self.bundle_path().with_extension("css")
    }

    /// Absolute path of the static root.
    #[must_use]
    pub fn static_root(&self) -> PathBuf {
        self.root.join(&self.server.static_dir)
    }

    /// Absolute path of the dist root.
    #[must_use]
    pub fn dist_root(&self) -> PathBuf {
        self.root.join(&self.server.dist_dir)
    }
}

/// Sourcemap path for an artifact: `<file>.map`.
#[must_use]
pub fn map_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".map");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_boilerplate_layout() {
        let config = ProjectConfig::with_root("/project");
        assert_eq!(config.entry_path(), PathBuf::from("/project/src/outeria.ts"));
        assert_eq!(
            config.bundle_path(),
            PathBuf::from("/project/dist/outeria.min.js")
        );
        assert_eq!(
            config.stylesheet_path(),
            PathBuf::from("/project/dist/outeria.min.css")
        );
        assert_eq!(config.bundle.name, "Outeria");
        assert!(config.bundle.sourcemap);
        assert_eq!(config.server.port, 3000);
        assert!(config.server.dev);
        assert_eq!(config.server.dist_prefix, "/dist");
    }

    #[test]
    fn test_map_path() {
        assert_eq!(
            map_path(Path::new("dist/outeria.min.js")),
            PathBuf::from("dist/outeria.min.js.map")
        );
        assert_eq!(
            map_path(Path::new("dist/outeria.min.css")),
            PathBuf::from("dist/outeria.min.css.map")
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.bundle, BundleConfig::default());
    }

    #[test]
    fn test_load_partial_override() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"server": {"port": 8080}, "bundle": {"name": "Widget"}}"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir, PathBuf::from("static"));
        assert_eq!(config.bundle.name, "Widget");
        assert_eq!(config.bundle.input, PathBuf::from("src/outeria.ts"));
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"serve": {}}"#).unwrap();

        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }), "{err}");
    }
}
