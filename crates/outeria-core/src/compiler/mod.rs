//! Compiler backend abstraction for transpilation and minification.
//!
//! The rest of outeria never calls SWC directly: the bundler asks a
//! `CompilerBackend` to turn one TypeScript/JSX module into plain JavaScript,
//! and the pipeline's final stage asks it to compress and mangle the whole
//! bundle.
//!
//! ## Usage
//!
//! ```ignore
//! use outeria_core::compiler::{CompilerBackend, SwcBackend, TranspileSpec};
//!
//! let backend = SwcBackend::new();
//! let spec = TranspileSpec::new("src/outeria.ts");
//! let output = backend.transpile(&spec, source)?;
//! ```

pub mod minify;
pub mod registry;
pub mod spec;
pub mod swc;

pub use minify::MinifyOptions;
pub use registry::{EXPORT_HELPER, EXPORT_STAR_HELPER};
pub use spec::{
    Diagnostic, DiagnosticSeverity, EsTarget, SourceMapKind, TranspileOutput, TranspileSpec,
};
pub use swc::SwcBackend;

use std::fmt;

/// A module request found in a module's syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// The import specifier (e.g., "./utils", "./outeria.scss").
    pub specifier: String,
    /// Whether this is a dynamic `import()`.
    pub dynamic: bool,
}

/// Error during compilation.
#[derive(Debug)]
pub struct CompilerError {
    /// Error code.
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Compiler diagnostics (if available).
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilerError {
    /// Create a new compiler error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Create an error with diagnostics.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_PARSE_ERROR", message)
    }

    /// Create a transform error.
    #[must_use]
    pub fn transform_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_TRANSFORM_ERROR", message)
    }

    /// Create an unsupported file type error.
    #[must_use]
    pub fn unsupported_file(message: impl Into<String>) -> Self {
        Self::new("COMPILER_UNSUPPORTED_FILE", message)
    }

    /// Location of the first diagnostic that has one.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        self.diagnostics.iter().find_map(Diagnostic::location)
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        for diag in &self.diagnostics {
            write!(f, "\n  - {}: {}", diag.severity.as_str(), diag.message)?;
            if let Some(location) = diag.location() {
                write!(f, " at {location}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for CompilerError {}

/// Compiler backend trait.
///
/// The trait is `Send + Sync` so modules can be transpiled in parallel.
pub trait CompilerBackend: Send + Sync {
    /// Get the backend name (e.g., "swc").
    fn name(&self) -> &'static str;

    /// Transpile one module: strip types, lower JSX, rewrite module syntax
    /// for the bundle registry, emit plain JavaScript.
    fn transpile(&self, spec: &TranspileSpec, source: &str)
        -> Result<TranspileOutput, CompilerError>;

    /// Compress and mangle a complete script.
    ///
    /// `filename` names the input in the returned source map.
    fn minify(
        &self,
        filename: &str,
        source: &str,
        options: &MinifyOptions,
    ) -> Result<TranspileOutput, CompilerError>;

    /// Check if this backend supports the given file extension.
    fn supports_extension(&self, ext: &str) -> bool {
        matches!(
            ext.to_lowercase().as_str(),
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "mts" | "cjs" | "cts"
        )
    }
}
