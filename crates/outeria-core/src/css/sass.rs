//! Sass/SCSS preprocessing using grass.
//!
//! Compiles `.scss` and `.sass` stylesheets to plain CSS. The result is fed to
//! lightningcss for prefixing and minification, so grass always emits the
//! expanded style here.

use super::CssError;
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};

/// Compiled Sass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SassOutput {
    /// Plain CSS, expanded style.
    pub css: String,
    /// Files read through `@use`/`@import`/`@forward`, in load order.
    pub loaded: Vec<PathBuf>,
}

/// Reads from disk like [`grass::StdFs`] and remembers what it read.
#[derive(Debug, Default)]
struct RecordingFs {
    loaded: RefCell<Vec<PathBuf>>,
}

impl grass::Fs for RecordingFs {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let bytes = std::fs::read(path)?;
        // grass joins `../` imports onto the importer's directory.
        let path = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut loaded = self.loaded.borrow_mut();
        if !loaded.contains(&path) {
            loaded.push(path);
        }
        Ok(bytes)
    }
}

/// Compile a Sass/SCSS stylesheet to CSS.
///
/// `path` selects the syntax (`.sass` is the indented syntax) and its parent
/// directory is searched for partials. Errors carry `path:line:column`.
pub fn compile_sass(path: &Path, source: &str) -> Result<SassOutput, CssError> {
    let is_indented = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sass"));

    let fs = RecordingFs::default();
    let mut grass_options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .fs(&fs);

    if is_indented {
        grass_options = grass_options.input_syntax(grass::InputSyntax::Sass);
    }

    if let Some(parent) = path.parent() {
        grass_options = grass_options.load_path(parent);
    }

    let css = grass::from_string(source.to_string(), &grass_options).map_err(|e| {
        let rendered = e.to_string();
        let message = rendered
            .lines()
            .next()
            .unwrap_or("Sass compile error")
            .trim_start_matches("Error: ")
            .to_string();
        let location = sass_error_position(&rendered)
            .map(|(line, column)| format!("{}:{line}:{column}", path.display()));
        CssError::sass(message).with_location(location)
    })?;

    Ok(SassOutput {
        css,
        loaded: fs.loaded.into_inner(),
    })
}

/// Pull `line:column` out of grass's rendered error.
///
/// grass ends its report with a trace line such as
/// `  stdin 3:5  root stylesheet`.
fn sass_error_position(rendered: &str) -> Option<(u32, u32)> {
    rendered
        .lines()
        .rev()
        .filter(|line| line.trim_end().ends_with("root stylesheet"))
        .find_map(|line| {
            line.split_whitespace().find_map(|token| {
                let (line, column) = token.split_once(':')?;
                Some((line.parse().ok()?, column.parse().ok()?))
            })
        })
}

/// Check if a file is a Sass/SCSS file.
#[must_use]
pub fn is_sass_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("scss") || e.eq_ignore_ascii_case("sass"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(scss: &str) -> String {
        compile_sass(Path::new("outeria.scss"), scss).unwrap().css
    }

    #[test]
    fn test_variables_and_nesting() {
        let css = compile(
            r"
            $accent: #336699;
            .outeria {
                .title {
                    color: $accent;
                }
            }
        ",
        );
        assert!(css.contains(".outeria .title"));
        assert!(css.contains("color: #336699"));
    }

    #[test]
    fn test_mixins() {
        let css = compile(
            r"
            @mixin center {
                display: flex;
                align-items: center;
            }
            .outeria { @include center; }
        ",
        );
        assert!(css.contains("display: flex"));
        assert!(css.contains("align-items: center"));
    }

    #[test]
    fn test_indented_syntax() {
        let sass = "$size: 4px\n.box\n  margin: $size * 2\n";
        let output = compile_sass(Path::new("theme.sass"), sass).unwrap();
        assert!(output.loaded.is_empty());
        assert!(output.css.contains("margin: 8px"));
    }

    #[test]
    fn test_partials_resolve_next_to_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("_colors.scss"), "$ink: #111;\n").unwrap();
        let entry = dir.path().join("outeria.scss");

        let output = compile_sass(&entry, "@import 'colors';\n.outeria { color: $ink; }\n").unwrap();
        assert!(output.css.contains("color: #111"));
        assert_eq!(output.loaded.len(), 1);
        assert!(output.loaded[0].ends_with("_colors.scss"), "{:?}", output.loaded);
    }

    #[test]
    fn test_loaded_partials_are_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("styles")).unwrap();
        std::fs::write(root.join("styles/_vars.scss"), "$gap: 3px;\n").unwrap();

        let output = compile_sass(
            &root.join("src/outeria.scss"),
            "@import '../styles/vars';\n.outeria { margin: $gap; }\n",
        )
        .unwrap();
        assert!(output.css.contains("margin: 3px"));
        assert_eq!(output.loaded, vec![root.join("styles/_vars.scss")]);
    }

    #[test]
    fn test_error_has_location() {
        let err = compile_sass(
            Path::new("src/outeria.scss"),
            ".outeria {\n  color: $missing;\n}\n",
        )
        .unwrap_err();

        assert_eq!(err.code, "CSS_SASS_ERROR");
        assert!(err.message.contains("Undefined variable"), "{}", err.message);
        let location = err.location.unwrap();
        assert!(location.starts_with("src/outeria.scss:2:"), "{location}");
    }

    #[test]
    fn test_sass_error_position() {
        let rendered = "Error: expected \"}\".\n  ╷\n3 │ }\n  ╵\n  stdin 3:5  root stylesheet";
        assert_eq!(sass_error_position(rendered), Some((3, 5)));
        assert_eq!(sass_error_position("Error: boom"), None);
    }

    #[test]
    fn test_is_sass_file() {
        assert!(is_sass_file(Path::new("outeria.scss")));
        assert!(is_sass_file(Path::new("theme.sass")));
        assert!(!is_sass_file(Path::new("reset.css")));
        assert!(!is_sass_file(Path::new("outeria.ts")));
    }
}
