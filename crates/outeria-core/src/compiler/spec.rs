//! Transpilation specification types.
//!
//! A `TranspileSpec` captures every option that affects the output of a single
//! module transpile, so two runs with equal specs and equal sources produce
//! byte-identical output.

use super::Import;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source map generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapKind {
    /// No source map.
    #[default]
    None,
    /// External `.map` file.
    External,
}

impl SourceMapKind {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::External => "external",
        }
    }
}

/// ECMAScript syntax level of the emitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EsTarget {
    /// ECMAScript 2015 (ES6).
    #[serde(rename = "es2015")]
    ES2015,
    /// ECMAScript 2017.
    #[serde(rename = "es2017")]
    ES2017,
    /// ECMAScript 2020.
    #[default]
    #[serde(rename = "es2020")]
    ES2020,
    /// ECMAScript 2022.
    #[serde(rename = "es2022")]
    ES2022,
    /// Latest ECMAScript features.
    #[serde(rename = "esnext")]
    ESNext,
}

impl EsTarget {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ES2015 => "es2015",
            Self::ES2017 => "es2017",
            Self::ES2020 => "es2020",
            Self::ES2022 => "es2022",
            Self::ESNext => "esnext",
        }
    }
}

impl std::fmt::Display for EsTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Warning message.
    Warning,
    /// Error message.
    Error,
}

impl DiagnosticSeverity {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A compiler diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: DiagnosticSeverity,
    /// Human-readable message.
    pub message: String,
    /// Source file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Line number (1-indexed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Column number (1-indexed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    /// Set the source location.
    #[must_use]
    pub fn with_location(mut self, file: PathBuf, line: u32, column: u32) -> Self {
        self.file = Some(file);
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// `file:line:column`, when the location is known.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => {
                Some(format!("{}:{}:{}", file.display(), line, col))
            }
            (Some(file), _, _) => Some(file.display().to_string()),
            _ => None,
        }
    }
}

/// Transpilation specification for one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranspileSpec {
    /// Input path; the extension selects the syntax (TS, TSX, JS, JSX).
    pub input_path: PathBuf,
    /// Source map generation mode.
    #[serde(default)]
    pub sourcemaps: SourceMapKind,
    /// ECMAScript target.
    #[serde(default)]
    pub target: EsTarget,
}

impl TranspileSpec {
    /// Create a new transpile spec with default options.
    #[must_use]
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            sourcemaps: SourceMapKind::default(),
            target: EsTarget::default(),
        }
    }

    /// Set the source map mode.
    #[must_use]
    pub fn with_sourcemaps(mut self, sourcemaps: SourceMapKind) -> Self {
        self.sourcemaps = sourcemaps;
        self
    }

    /// Set the ECMAScript target.
    #[must_use]
    pub fn with_target(mut self, target: EsTarget) -> Self {
        self.target = target;
        self
    }
}

/// Output of a transpile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOutput {
    /// Generated JavaScript.
    pub code: String,
    /// V3 source map JSON, when requested.
    pub source_map: Option<String>,
    /// Modules the code requires, taken from the syntax tree.
    pub imports: Vec<Import>,
    /// Names the module exports.
    pub exports: Vec<String>,
}

impl TranspileOutput {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source_map: None,
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_source_map(mut self, map: impl Into<String>) -> Self {
        self.source_map = Some(map.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = TranspileSpec::new("src/outeria.ts");
        assert_eq!(spec.sourcemaps, SourceMapKind::None);
        assert_eq!(spec.target, EsTarget::ES2020);
    }

    #[test]
    fn test_target_serde_names() {
        let json = serde_json::to_string(&EsTarget::ES2015).unwrap();
        assert_eq!(json, "\"es2015\"");
        let target: EsTarget = serde_json::from_str("\"esnext\"").unwrap();
        assert_eq!(target, EsTarget::ESNext);
    }

    #[test]
    fn test_diagnostic_location() {
        let diag = Diagnostic::error("Unexpected token").with_location(
            PathBuf::from("src/outeria.ts"),
            3,
            7,
        );
        assert_eq!(diag.location().as_deref(), Some("src/outeria.ts:3:7"));
        assert_eq!(Diagnostic::error("x").location(), None);
    }
}
