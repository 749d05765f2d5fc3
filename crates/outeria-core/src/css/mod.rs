//! Stylesheet processing using lightningcss.
//!
//! Provides:
//! - Sass/SCSS compilation (via grass)
//! - Autoprefixer (vendor prefixes for the configured browser targets)
//! - Minification
//! - Extraction of every stylesheet in the module graph into one file, with
//!   a V3 source map

pub mod sass;

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stylesheet extraction options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssOptions {
    /// Enable minification.
    pub minify: bool,
    /// Emit a source map.
    pub sourcemap: bool,
    /// Browser targets for prefixing (defaults to [`default_browser_targets`]).
    pub targets: Option<Browsers>,
}

/// One stylesheet after Sass compilation, ready for lightningcss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    /// Source name recorded in the source map (project-relative path).
    pub name: String,
    /// Plain CSS.
    pub css: String,
    /// Sass partials read while compiling.
    pub loaded: Vec<PathBuf>,
}

/// Extracted stylesheet.
#[derive(Debug, Clone)]
pub struct CssOutput {
    /// The transformed CSS code.
    pub code: String,
    /// V3 source map JSON, when requested.
    pub source_map: Option<String>,
}

/// Read a stylesheet from disk, compiling it first if it is Sass.
pub fn load_stylesheet(path: &Path, name: impl Into<String>) -> Result<CompiledStyle, CssError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        CssError::new(
            "CSS_IO_ERROR",
            format!("Failed to read {}: {e}", path.display()),
        )
    })?;

    let name = name.into();
    let (css, loaded) = if sass::is_sass_file(path) {
        let output = sass::compile_sass(path, &source).map_err(|mut e| {
            // Report the project-relative name, not the absolute path.
            let shown = path.display().to_string();
            e.location = e.location.map(|location| match location.strip_prefix(&shown) {
                Some(position) => format!("{name}{position}"),
                None => location,
            });
            e
        })?;
        (output.css, output.loaded)
    } else {
        (source, Vec::new())
    };

    Ok(CompiledStyle { name, css, loaded })
}

/// Merge stylesheets, in order, into one prefixed (and optionally minified)
/// stylesheet.
///
/// Each input keeps its own entry in the source map's `sources`. Positions
/// refer to the CSS after Sass compilation.
pub fn extract_styles(styles: &[CompiledStyle], options: &CssOptions) -> Result<CssOutput, CssError> {
    let mut merged: Option<StyleSheet> = None;

    for (index, style) in styles.iter().enumerate() {
        let parser_options = ParserOptions {
            filename: style.name.clone(),
            source_index: index as u32,
            ..Default::default()
        };

        let sheet = StyleSheet::parse(&style.css, parser_options).map_err(|e| {
            let location = e
                .loc
                .as_ref()
                .map(|loc| format!("{}:{}:{}", loc.filename, loc.line + 1, loc.column));
            CssError::new("CSS_PARSE_ERROR", e.kind.to_string()).with_location(location)
        })?;

        match merged.as_mut() {
            None => merged = Some(sheet),
            Some(target) => {
                target.sources.extend(sheet.sources);
                target.rules.0.extend(sheet.rules.0);
            }
        }
    }

    let Some(mut stylesheet) = merged else {
        return Ok(CssOutput {
            code: String::new(),
            source_map: None,
        });
    };

    let browsers = options.targets.unwrap_or_else(default_browser_targets);

    stylesheet
        .minify(MinifyOptions {
            targets: Targets::from(browsers),
            ..Default::default()
        })
        .map_err(|e| CssError::new("CSS_TRANSFORM_ERROR", e.to_string()))?;

    let mut source_map = if options.sourcemap {
        let mut map = SourceMap::new("/");
        for (index, style) in styles.iter().enumerate() {
            map.add_source(&style.name);
            map.set_source_content(index, &style.css)
                .map_err(|e| CssError::new("CSS_SOURCEMAP_ERROR", e.to_string()))?;
        }
        Some(map)
    } else {
        None
    };

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: options.minify,
            source_map: source_map.as_mut(),
            targets: Targets::from(browsers),
            ..Default::default()
        })
        .map_err(|e| CssError::new("CSS_PRINT_ERROR", e.to_string()))?;

    let source_map = source_map
        .map(|mut map| {
            map.to_json(None)
                .map_err(|e| CssError::new("CSS_SOURCEMAP_ERROR", e.to_string()))
        })
        .transpose()?;

    Ok(CssOutput {
        code: output.code,
        source_map,
    })
}

/// Check if a specifier or path names a stylesheet.
#[must_use]
pub fn is_stylesheet(path: &Path) -> bool {
    sass::is_sass_file(path)
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("css"))
}

/// Default browser targets for prefixing.
///
/// Roughly browserslist's `defaults`: Chrome 80+, Firefox 75+, Safari 13+,
/// Edge 80+.
#[must_use]
pub fn default_browser_targets() -> Browsers {
    Browsers {
        chrome: Some(80 << 16),
        firefox: Some(75 << 16),
        safari: Some(13 << 16),
        edge: Some(80 << 16),
        ..Default::default()
    }
}

/// Stylesheet processing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssError {
    /// Error code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// `file:line:column`, when known.
    pub location: Option<String>,
}

impl CssError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    /// Sass compilation failure.
    #[must_use]
    pub fn sass(message: impl Into<String>) -> Self {
        Self::new("CSS_SASS_ERROR", message)
    }

    #[must_use]
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }
}

impl fmt::Display for CssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CssError {}
