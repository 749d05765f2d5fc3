//! Stable error codes for the build pipeline.
//!
//! All codes are SCREAMING_SNAKE_CASE and stable across versions.

/// Entry module does not exist.
pub const BUILD_ENTRY_NOT_FOUND: &str = "BUILD_ENTRY_NOT_FOUND";

/// Styles stage failed (Sass compile, CSS parse, prefixing, printing).
pub const BUILD_STYLES_FAILED: &str = "BUILD_STYLES_FAILED";

/// Transpile stage failed (parse, resolve, module wrapping).
pub const BUILD_TRANSPILE_FAILED: &str = "BUILD_TRANSPILE_FAILED";

/// Minify stage failed.
pub const BUILD_MINIFY_FAILED: &str = "BUILD_MINIFY_FAILED";

/// Source map generation failed.
pub const BUILD_SOURCEMAP_FAILED: &str = "BUILD_SOURCEMAP_FAILED";

/// Artifacts could not be written.
pub const BUILD_WRITE_FAILED: &str = "BUILD_WRITE_FAILED";

/// Watch mode error.
pub const BUILD_WATCH_ERROR: &str = "BUILD_WATCH_ERROR";
