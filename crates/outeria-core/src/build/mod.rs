//! The bundle pipeline.
//!
//! Turns the entry module and the stylesheets it imports into the
//! distributable artifacts:
//!
//! - `dist/outeria.min.js` (+ `.map`): UMD bundle exposing the global `Outeria`
//! - `dist/outeria.min.css` (+ `.map`): extracted, prefixed, minified styles
//!
//! Stages run in a fixed order: **styles**, **transpile**, **minify**. Only
//! minify depends on [`BuildOptions::production`]. Everything is produced in
//! memory and written in one atomic step, so a failed build never leaves a
//! partial or stale bundle behind.

pub mod codes;
pub mod watch;

use crate::bundler::{emit_umd, BundleError, BundleOptions, Bundler};
use crate::compiler::{CompilerBackend, CompilerError, MinifyOptions, SwcBackend};
use crate::config::{map_path, ProjectConfig, WATCH_ENV};
use crate::css::{extract_styles, load_stylesheet, CssError, CssOptions};
use outeria_util::fs::{atomic_write_all, relative_display, remove_if_exists};
use outeria_util::hash::short_hash;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Sass compilation, prefixing, minification and extraction of CSS.
    Styles,
    /// Type stripping, module wrapping, UMD emission.
    Transpile,
    /// Whole-bundle compression and mangling (production only).
    Minify,
}

impl Stage {
    /// All stages, in execution order.
    pub const ALL: [Stage; 3] = [Stage::Styles, Stage::Transpile, Stage::Minify];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Styles => "styles",
            Self::Transpile => "transpile",
            Self::Minify => "minify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildOptions {
    /// Run the minify stage.
    pub production: bool,
    /// Emit `.map` files.
    pub sourcemap: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::production()
    }
}

impl BuildOptions {
    /// Minified build with source maps.
    #[must_use]
    pub fn production() -> Self {
        Self {
            production: true,
            sourcemap: true,
        }
    }

    /// Readable build with source maps.
    #[must_use]
    pub fn development() -> Self {
        Self {
            production: false,
            sourcemap: true,
        }
    }

    /// Production unless `ROLLUP_WATCH` is set (to anything).
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            production: std::env::var_os(WATCH_ENV).is_none(),
            sourcemap: true,
        }
    }

    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    #[must_use]
    pub fn with_sourcemap(mut self, sourcemap: bool) -> Self {
        self.sourcemap = sourcemap;
        self
    }
}

/// Build failure.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{stage} stage failed: {message}")]
    Stage {
        stage: Stage,
        code: &'static str,
        message: String,
        location: Option<String>,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    fn stage(stage: Stage, code: &'static str, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            code,
            message: message.into(),
            location: None,
        }
    }

    fn styles(err: CssError) -> Self {
        Self::Stage {
            stage: Stage::Styles,
            code: codes::BUILD_STYLES_FAILED,
            message: format!("{}: {}", err.code, err.message),
            location: err.location,
        }
    }

    fn transpile(err: BundleError) -> Self {
        let code = if err.code == "BUNDLE_ENTRY_NOT_FOUND" {
            codes::BUILD_ENTRY_NOT_FOUND
        } else {
            codes::BUILD_TRANSPILE_FAILED
        };
        let location = err.location.clone().or_else(|| err.path.clone());
        Self::Stage {
            stage: Stage::Transpile,
            code,
            message: format!("{}: {}", err.code, err.message),
            location,
        }
    }

    fn minify(err: CompilerError) -> Self {
        Self::Stage {
            stage: Stage::Minify,
            code: codes::BUILD_MINIFY_FAILED,
            location: err.location(),
            message: err.to_string(),
        }
    }

    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Stage { code, .. } => code,
            Self::Write { .. } => codes::BUILD_WRITE_FAILED,
        }
    }

    /// Failing stage, if the failure happened inside one.
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::Write { .. } => None,
        }
    }

    /// `file:line:column` (or file) the failure points at.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Stage { location, .. } => location.as_deref(),
            Self::Write { .. } => None,
        }
    }
}

/// A written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Path relative to the project root.
    pub path: String,
    /// Size in bytes.
    pub bytes: usize,
    /// Short BLAKE3 content hash.
    pub hash: String,
}

/// Summary of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub production: bool,
    pub sourcemap: bool,
    /// Stages that ran, in order.
    pub stages: Vec<Stage>,
    /// Bundled modules, dependencies first.
    pub modules: Vec<String>,
    /// Extracted stylesheets, in import order.
    pub stylesheets: Vec<String>,
    pub artifacts: Vec<Artifact>,
    pub duration_ms: u64,
    /// Every file read by the build: modules, stylesheets and Sass partials.
    #[serde(skip)]
    pub inputs: Vec<PathBuf>,
}

/// Number of hex chars in [`Artifact::hash`].
const ARTIFACT_HASH_LEN: usize = 16;

/// Artifacts produced in memory, plus what the report needs.
struct Produced {
    files: Vec<(PathBuf, Vec<u8>)>,
    stages: Vec<Stage>,
    modules: Vec<String>,
    stylesheets: Vec<String>,
    inputs: Vec<PathBuf>,
}

/// The bundle pipeline for one project.
pub struct Pipeline {
    config: ProjectConfig,
    backend: SwcBackend,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            config,
            backend: SwcBackend::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Paths of every artifact the pipeline can write.
    #[must_use]
    pub fn artifact_paths(&self) -> [PathBuf; 4] {
        let bundle = self.config.bundle_path();
        let stylesheet = self.config.stylesheet_path();
        [
            map_path(&bundle),
            bundle,
            map_path(&stylesheet),
            stylesheet,
        ]
    }

    /// Run every stage and write the artifacts.
    ///
    /// On failure nothing is written and any bundle from an earlier build is
    /// removed.
    pub fn run(&self, options: BuildOptions) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        let options = options.with_sourcemap(options.sourcemap && self.config.bundle.sourcemap);
        info!(
            entry = %self.config.bundle.input.display(),
            production = options.production,
            "build started"
        );

        let produced = match self.produce(options) {
            Ok(produced) => produced,
            Err(err) => {
                self.remove_stale();
                return Err(err);
            }
        };

        if let Err(source) = atomic_write_all(&produced.files) {
            self.remove_stale();
            return Err(BuildError::Write {
                path: self.config.dist_root(),
                source,
            });
        }

        // Artifacts this build did not produce (e.g. maps when source maps are
        // off) would no longer match the bundle.
        for path in self.artifact_paths() {
            if !produced.files.iter().any(|(p, _)| *p == path) {
                if let Err(e) = remove_if_exists(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove outdated artifact");
                }
            }
        }

        let artifacts = produced
            .files
            .iter()
            .map(|(path, bytes)| Artifact {
                path: relative_display(&self.config.root, path),
                bytes: bytes.len(),
                hash: short_hash(bytes, ARTIFACT_HASH_LEN),
            })
            .collect();

        let report = BuildReport {
            production: options.production,
            sourcemap: options.sourcemap,
            stages: produced.stages,
            modules: produced.modules,
            stylesheets: produced.stylesheets,
            artifacts,
            duration_ms: start.elapsed().as_millis() as u64,
            inputs: produced.inputs,
        };
        info!(duration_ms = report.duration_ms, modules = report.modules.len(), "build finished");
        Ok(report)
    }

    fn produce(&self, options: BuildOptions) -> Result<Produced, BuildError> {
        // Module paths in the graph are canonical.
        let root = &dunce::canonicalize(&self.config.root).unwrap_or_else(|_| self.config.root.clone());
        let bundle_path = self.config.bundle_path();
        let bundle_file = file_name(&bundle_path);
        let stylesheet_path = self.config.stylesheet_path();
        let stylesheet_file = file_name(&stylesheet_path);

        let bundle_options = BundleOptions {
            sourcemap: options.sourcemap,
            ..Default::default()
        };
        let graph = Bundler::new(&self.backend, root)
            .build_graph(&self.config.bundle.input, &bundle_options)
            .map_err(BuildError::transpile)?;
        debug!(modules = graph.len(), stylesheets = graph.stylesheets().len(), "module graph built");

        let mut files = Vec::with_capacity(4);
        let mut stages = Vec::with_capacity(3);
        let mut inputs: Vec<PathBuf> = graph.iter().map(|(_, module)| module.path.clone()).collect();
        inputs.extend(graph.stylesheets().iter().cloned());

        // styles
        let stylesheets: Vec<String> = graph
            .stylesheets()
            .iter()
            .map(|p| relative_display(root, p))
            .collect();
        if !stylesheets.is_empty() {
            let compiled = graph
                .stylesheets()
                .iter()
                .zip(&stylesheets)
                .map(|(path, name)| load_stylesheet(path, name.clone()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(BuildError::styles)?;
            inputs.extend(compiled.iter().flat_map(|style| style.loaded.iter().cloned()));

            let css = extract_styles(
                &compiled,
                &CssOptions {
                    minify: true,
                    sourcemap: options.sourcemap,
                    targets: None,
                },
            )
            .map_err(BuildError::styles)?;

            let mut code = css.code;
            if let Some(map) = css.source_map {
                code.push_str(&format!("\n/*# sourceMappingURL={stylesheet_file}.map */\n"));
                files.push((map_path(&stylesheet_path), map.into_bytes()));
            }
            files.push((stylesheet_path, code.into_bytes()));
        }
        stages.push(Stage::Styles);

        // transpile
        let bundle = emit_umd(&graph, &self.config.bundle.name).map_err(BuildError::transpile)?;
        stages.push(Stage::Transpile);

        // minify
        let (mut code, map) = if options.production {
            let minified = self
                .backend
                .minify(
                    &bundle_file,
                    &bundle.code,
                    &MinifyOptions::default().with_sourcemap(options.sourcemap),
                )
                .map_err(BuildError::minify)?;
            stages.push(Stage::Minify);

            let map = match (&minified.source_map, options.sourcemap) {
                (Some(minified_map), true) => Some(
                    bundle
                        .compose_minified(&bundle_file, minified_map)
                        .map_err(sourcemap_error)?,
                ),
                _ => None,
            };
            (minified.code, map)
        } else {
            let map = if options.sourcemap {
                Some(bundle.source_map(&bundle_file).map_err(sourcemap_error)?)
            } else {
                None
            };
            (bundle.code.clone(), map)
        };

        if let Some(map) = map {
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(&format!("//# sourceMappingURL={bundle_file}.map\n"));
            files.push((map_path(&bundle_path), map.into_bytes()));
        }
        files.push((bundle_path, code.into_bytes()));

        Ok(Produced {
            files,
            stages,
            modules: bundle.modules,
            stylesheets,
            inputs,
        })
    }

    /// Delete artifacts of an earlier build so they are not served as current.
    fn remove_stale(&self) {
        for path in self.artifact_paths() {
            match remove_if_exists(&path) {
                Ok(true) => debug!(path = %path.display(), "removed stale artifact"),
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale artifact"),
            }
        }
    }
}

fn sourcemap_error(err: crate::bundler::sourcemap::SourceMapError) -> BuildError {
    BuildError::stage(Stage::Transpile, codes::BUILD_SOURCEMAP_FAILED, err.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
