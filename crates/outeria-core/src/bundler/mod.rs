//! TypeScript bundler.
//!
//! Bundles the entry module and everything it imports relatively into one
//! UMD script.
//!
//! ## Usage
//!
//! ```ignore
//! use outeria_core::bundler::{Bundler, BundleOptions};
//! use outeria_core::compiler::SwcBackend;
//!
//! let backend = SwcBackend::new();
//! let bundler = Bundler::new(&backend, project_root);
//! let graph = bundler.build_graph(Path::new("src/outeria.ts"), &options)?;
//! let output = emit_umd(&graph, "Outeria")?;
//! ```
//!
//! ## Architecture
//!
//! 1. **Resolution** - Resolve relative specifiers to file paths
//! 2. **Graph** - Transpile modules breadth-first from the entry, collecting
//!    module dependencies and stylesheet imports
//! 3. **Emit** - Wrap modules in a registry inside a UMD factory
//!
//! Imports come from each module's syntax tree, so text that merely looks
//! like an `import` (inside a template literal, say) never joins the graph.

mod emit;
mod graph;
mod resolve;
pub mod sourcemap;

pub use emit::{emit_umd, BundleOutput};
pub use graph::{Module, ModuleGraph, ModuleId};
pub use resolve::{resolve, ResolveError, MODULE_EXTENSIONS};

use crate::compiler::{
    CompilerBackend, CompilerError, EsTarget, Import, SourceMapKind, TranspileSpec,
};
use crate::css::is_stylesheet;
use outeria_util::fs::relative_display;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Bundle options.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Keep per-module compiler source maps for the bundle map.
    pub sourcemap: bool,
    /// Syntax level of the emitted code.
    pub target: EsTarget,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            sourcemap: true,
            target: EsTarget::ES2020,
        }
    }
}

/// Bundler error.
#[derive(Debug)]
pub struct BundleError {
    pub code: &'static str,
    pub message: String,
    /// Module the error concerns.
    pub path: Option<String>,
    /// `file:line:column` of a compiler diagnostic.
    pub location: Option<String>,
}

impl BundleError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            location: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn from_compiler(err: CompilerError, path: String) -> Self {
        Self {
            code: "BUNDLE_TRANSPILE_ERROR",
            location: err.location(),
            message: err.to_string(),
            path: Some(path),
        }
    }
}

impl std::fmt::Display for BundleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.location, &self.path) {
            (Some(location), _) => write!(f, "{}: {} ({})", self.code, self.message, location),
            (None, Some(path)) => write!(f, "{}: {} ({})", self.code, self.message, path),
            (None, None) => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for BundleError {}

impl From<ResolveError> for BundleError {
    fn from(err: ResolveError) -> Self {
        BundleError {
            code: "BUNDLE_RESOLVE_ERROR",
            message: err.to_string(),
            path: Some(err.from),
            location: None,
        }
    }
}

/// A transpiled module whose imports are not yet linked.
struct Loaded {
    path: PathBuf,
    name: String,
    source: String,
    code: String,
    map: Option<String>,
    imports: Vec<Import>,
}

/// The bundler.
pub struct Bundler<'a> {
    backend: &'a dyn CompilerBackend,
    root: PathBuf,
}

impl<'a> Bundler<'a> {
    /// Create a bundler that transpiles with `backend`; module names are
    /// reported relative to `root`.
    #[must_use]
    pub fn new(backend: &'a dyn CompilerBackend, root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            root: root.into(),
        }
    }

    /// Build the module graph from `entry`.
    ///
    /// Modules are discovered breadth-first; each level of the search is
    /// transpiled in parallel. The entry gets module ID 0.
    pub fn build_graph(&self, entry: &Path, options: &BundleOptions) -> Result<ModuleGraph, BundleError> {
        let entry_path = if entry.is_absolute() {
            entry.to_path_buf()
        } else {
            self.root.join(entry)
        };

        let entry_path = dunce::canonicalize(&entry_path).map_err(|e| {
            BundleError::new(
                "BUNDLE_ENTRY_NOT_FOUND",
                format!("Cannot find entry point: {e}"),
            )
            .with_path(entry.display().to_string())
        })?;

        let mut graph = ModuleGraph::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        seen.insert(entry_path.clone());
        let mut frontier = vec![entry_path];
        // (from, specifier, target, dynamic); linked once every target is loaded.
        let mut links: Vec<(ModuleId, String, PathBuf, bool)> = Vec::new();

        while !frontier.is_empty() {
            let loaded: Vec<Result<Loaded, BundleError>> = frontier
                .par_iter()
                .map(|path| self.load(path, options))
                .collect();

            let mut next = Vec::new();
            for module in loaded {
                let module = module?;
                tracing::debug!(module = %module.name, imports = module.imports.len(), "transpiled");

                let id = graph.add(Module {
                    path: module.path.clone(),
                    name: module.name.clone(),
                    source: module.source,
                    code: module.code,
                    map: module.map,
                    imports: module.imports.clone(),
                    dependencies: Vec::new(),
                    dynamic_dependencies: Vec::new(),
                });

                for import in module.imports {
                    let resolved = resolve(&import.specifier, &module.path)?;

                    if is_stylesheet(&resolved) {
                        if import.dynamic {
                            return Err(BundleError::new(
                                "BUNDLE_DYNAMIC_STYLESHEET",
                                format!(
                                    "Stylesheet '{}' cannot be imported dynamically",
                                    import.specifier
                                ),
                            )
                            .with_path(module.name.clone()));
                        }
                        graph.add_stylesheet(resolved);
                        continue;
                    }

                    if seen.insert(resolved.clone()) {
                        next.push(resolved.clone());
                    }
                    links.push((id, import.specifier, resolved, import.dynamic));
                }
            }

            frontier = next;
        }

        for (from, specifier, target, dynamic) in links {
            graph.link(from, &specifier, &target, dynamic);
        }

        Ok(graph)
    }

    fn load(&self, path: &Path, options: &BundleOptions) -> Result<Loaded, BundleError> {
        let name = relative_display(&self.root, path);

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.backend.supports_extension(ext) {
            return Err(BundleError::new(
                "BUNDLE_UNSUPPORTED_FILE",
                format!("Cannot bundle '{name}': unsupported file type"),
            )
            .with_path(name));
        }

        let source = std::fs::read_to_string(path).map_err(|e| {
            BundleError::new("BUNDLE_READ_ERROR", e.to_string()).with_path(name.clone())
        })?;

        let spec = TranspileSpec::new(name.clone())
            .with_target(options.target)
            .with_sourcemaps(if options.sourcemap {
                SourceMapKind::External
            } else {
                SourceMapKind::None
            });

        let output = self
            .backend
            .transpile(&spec, &source)
            .map_err(|e| BundleError::from_compiler(e, name.clone()))?;

        Ok(Loaded {
            path: path.to_path_buf(),
            name,
            source,
            code: output.code,
            map: output.source_map,
            imports: output.imports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SwcBackend;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_build_graph_collects_modules_and_styles() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root,
            "src/outeria.ts",
            "import './outeria.scss';\nimport { label } from './label';\nexport const initialize = (element: HTMLElement): void => { void label; };\n",
        );
        write(&root, "src/outeria.scss", ".outeria { color: red; }\n");
        write(
            &root,
            "src/label.ts",
            "import './label.css';\nexport const label: string = 'outeria';\n",
        );
        write(&root, "src/label.css", ".label { margin: 0; }\n");

        let backend = SwcBackend::new();
        let graph = Bundler::new(&backend, &root)
            .build_graph(Path::new("src/outeria.ts"), &BundleOptions::default())
            .unwrap();

        assert_eq!(graph.len(), 2);
        let entry = graph.get(0).unwrap();
        assert_eq!(entry.name, "src/outeria.ts");
        assert!(entry.map.is_some());
        assert!(!entry.code.contains("HTMLElement"));
        assert_eq!(graph.resolve_specifier(0, "./label"), Some(1));
        assert_eq!(entry.dependencies, vec![1]);

        let styles: Vec<String> = graph
            .stylesheets()
            .iter()
            .map(|p| relative_display(&root, p))
            .collect();
        assert_eq!(styles, vec!["src/outeria.scss", "src/label.css"]);
    }

    #[test]
    fn test_build_graph_entry_not_found() {
        let dir = tempdir().unwrap();
        let backend = SwcBackend::new();
        let err = Bundler::new(&backend, dir.path())
            .build_graph(Path::new("src/outeria.ts"), &BundleOptions::default())
            .unwrap_err();
        assert_eq!(err.code, "BUNDLE_ENTRY_NOT_FOUND");
    }

    #[test]
    fn test_build_graph_syntax_error_has_location() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root,
            "src/outeria.ts",
            "export const initialize = (element: HTMLElement) => {\n",
        );

        let backend = SwcBackend::new();
        let err = Bundler::new(&backend, &root)
            .build_graph(Path::new("src/outeria.ts"), &BundleOptions::default())
            .unwrap_err();

        assert_eq!(err.code, "BUNDLE_TRANSPILE_ERROR");
        assert!(err.location.unwrap().starts_with("src/outeria.ts:"));
    }

    #[test]
    fn test_build_graph_ignores_import_text_in_templates() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "src/outeria.ts",
            "export const tpl = `line\nimport x from './nope';\nend`;\nexport const initialize = (element: HTMLElement): void => {};\n",
        );

        let backend = SwcBackend::new();
        let graph = Bundler::new(&backend, dir.path())
            .build_graph(Path::new("src/outeria.ts"), &BundleOptions::default())
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.get(0).unwrap().imports.is_empty());
    }

    #[test]
    fn test_build_graph_unresolved_import() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/outeria.ts", "import { x } from './missing';\nexport const y = x;\n");

        let backend = SwcBackend::new();
        let err = Bundler::new(&backend, dir.path())
            .build_graph(Path::new("src/outeria.ts"), &BundleOptions::default())
            .unwrap_err();
        assert_eq!(err.code, "BUNDLE_RESOLVE_ERROR");
        assert!(err.message.contains("./missing"));
    }

    #[test]
    fn test_build_graph_without_sourcemaps() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/outeria.ts", "export const initialize = (element: HTMLElement) => {};\n");

        let backend = SwcBackend::new();
        let options = BundleOptions {
            sourcemap: false,
            ..Default::default()
        };
        let graph = Bundler::new(&backend, dir.path())
            .build_graph(Path::new("src/outeria.ts"), &options)
            .unwrap();
        assert!(graph.get(0).unwrap().map.is_none());
    }
}
