//! Import specifier resolution.
//!
//! Only relative specifiers (`./x`, `../x`) are bundled. Anything else is
//! reported as unresolvable: the bundle has no package lookup.

use std::path::{Path, PathBuf};

/// Extensions probed, in order, for extensionless specifiers.
pub const MODULE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

const INDEX_FILES: &[&str] = &["index.ts", "index.tsx", "index.js", "index.jsx"];

/// Error during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub specifier: String,
    pub from: String,
    pub message: String,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cannot resolve '{}' from '{}': {}",
            self.specifier, self.from, self.message
        )
    }
}

impl std::error::Error for ResolveError {}

/// Resolve `specifier` as imported by the file `from`.
pub fn resolve(specifier: &str, from: &Path) -> Result<PathBuf, ResolveError> {
    let error = |message: &str| ResolveError {
        specifier: specifier.to_string(),
        from: from.display().to_string(),
        message: message.to_string(),
    };

    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return Err(error("only relative imports can be bundled"));
    }

    let from_dir = from.parent().unwrap_or(Path::new("."));
    let target = from_dir.join(specifier);

    let found = probe(&target).ok_or_else(|| error("File not found"))?;
    dunce::canonicalize(&found).map_err(|e| error(&e.to_string()))
}

/// Try the path as-is, then with each module extension, then as a directory.
fn probe(target: &Path) -> Option<PathBuf> {
    if target.is_file() {
        return Some(target.to_path_buf());
    }

    for ext in MODULE_EXTENSIONS {
        let with_ext = PathBuf::from(format!("{}.{ext}", target.display()));
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }

    if target.is_dir() {
        return INDEX_FILES
            .iter()
            .map(|index| target.join(index))
            .find(|p| p.is_file());
    }

    None
}
