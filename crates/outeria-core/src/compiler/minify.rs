//! Whole-script minification.
//!
//! Runs on the finished bundle, after the module wrapper is in place, so
//! names that leak between modules (`__require`, the registry helpers) are
//! mangled along with everything else. Exported property names are strings on
//! `exports` and survive.

use super::swc::span_diagnostic;
use super::{CompilerError, TranspileOutput};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minifier settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinifyOptions {
    /// Dead-code elimination, constant folding, statement merging.
    pub compress: bool,
    /// Shorten local identifiers.
    pub mangle: bool,
    /// Produce a source map from minified to input positions.
    pub sourcemap: bool,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            compress: true,
            mangle: true,
            sourcemap: false,
        }
    }
}

impl MinifyOptions {
    /// Set source map generation.
    #[must_use]
    pub fn with_sourcemap(mut self, sourcemap: bool) -> Self {
        self.sourcemap = sourcemap;
        self
    }
}

pub(super) fn minify_with_swc(
    filename: &str,
    source: &str,
    options: &MinifyOptions,
) -> Result<TranspileOutput, CompilerError> {
    use swc_common::{
        comments::SingleThreadedComments, sync::Lrc, FileName, Globals, Mark, SourceMap, Spanned,
        GLOBALS,
    };
    use swc_ecma_ast::{EsVersion, Program};
    use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
    use swc_ecma_minifier::option::{ExtraOptions, MinifyOptions as SwcMinifyOptions};
    use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};
    use swc_ecma_transforms_base::{fixer::fixer, resolver};
    use swc_ecma_visit::FoldWith;

    let cm: Lrc<SourceMap> = Lrc::default();
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let comments = SingleThreadedComments::default();
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::Es2020,
        StringInput::from(&*fm),
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    let script = parser.parse_script().map_err(|e| {
        let message = e.kind().msg().to_string();
        let diag = span_diagnostic(&cm, e.span(), Path::new(filename), message.clone());
        CompilerError::parse_error(format!("Failed to parse bundle: {message}"))
            .with_diagnostics(vec![diag])
    })?;

    let minified = GLOBALS.set(&Globals::default(), || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();

        let program = Program::Script(script)
            .fold_with(&mut resolver(unresolved_mark, top_level_mark, false));

        let swc_options = SwcMinifyOptions {
            compress: options.compress.then(Default::default),
            mangle: options.mangle.then(Default::default),
            ..Default::default()
        };

        let program = swc_ecma_minifier::optimize(
            program,
            cm.clone(),
            Some(&comments),
            None,
            &swc_options,
            &ExtraOptions {
                unresolved_mark,
                top_level_mark,
                mangle_name_cache: None,
            },
        );

        program.fold_with(&mut fixer(Some(&comments)))
    });

    let script = match minified {
        Program::Script(s) => s,
        Program::Module(_) => {
            return Err(CompilerError::transform_error(
                "Minifier returned a module for script input",
            ))
        }
    };

    let mut buf = Vec::new();
    let mut src_map_buf = Vec::new();
    {
        let writer = JsWriter::new(
            cm.clone(),
            "\n",
            &mut buf,
            options.sourcemap.then_some(&mut src_map_buf),
        );
        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default()
                .with_minify(true)
                .with_target(EsVersion::Es2020),
            cm: cm.clone(),
            comments: None,
            wr: writer,
        };
        emitter
            .emit_script(&script)
            .map_err(|e| CompilerError::transform_error(format!("Failed to emit: {e}")))?;
    }

    let code = String::from_utf8(buf)
        .map_err(|e| CompilerError::transform_error(format!("Invalid UTF-8 output: {e}")))?;

    let mut output = TranspileOutput::new(code);
    if options.sourcemap {
        let mut map_buf = Vec::new();
        cm.build_source_map(&src_map_buf)
            .to_writer(&mut map_buf)
            .map_err(|e| {
                CompilerError::transform_error(format!("Failed to write source map: {e}"))
            })?;
        let map = String::from_utf8(map_buf)
            .map_err(|e| CompilerError::transform_error(format!("Invalid source map: {e}")))?;
        output = output.with_source_map(map);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"(function (global) {
    function computeGreeting(personName) {
        var unusedValue = 1 + 2;
        return "Hello, " + personName;
    }
    global.greet = computeGreeting;
})(this);
"#;

    #[test]
    fn test_minify_shrinks_and_mangles() {
        let output = minify_with_swc("bundle.js", SAMPLE, &MinifyOptions::default()).unwrap();

        assert!(output.code.len() < SAMPLE.len());
        assert!(!output.code.contains("personName"));
        assert!(!output.code.contains("unusedValue"));
        assert!(output.code.contains("greet"));
        assert!(output.source_map.is_none());
    }

    #[test]
    fn test_minify_without_mangle_keeps_names() {
        let options = MinifyOptions {
            compress: false,
            mangle: false,
            sourcemap: false,
        };
        let output = minify_with_swc("bundle.js", SAMPLE, &options).unwrap();
        assert!(output.code.contains("personName"));
    }

    #[test]
    fn test_minify_source_map() {
        let options = MinifyOptions::default().with_sourcemap(true);
        let output = minify_with_swc("bundle.js", SAMPLE, &options).unwrap();
        let map = output.source_map.unwrap();
        assert!(map.contains("bundle.js"));
        assert!(map.contains("\"mappings\""));
    }

    #[test]
    fn test_minify_parse_error() {
        let err = minify_with_swc("bundle.js", "function (", &MinifyOptions::default())
            .unwrap_err();
        assert_eq!(err.code, "COMPILER_PARSE_ERROR");
        assert!(err.location().unwrap().starts_with("bundle.js:1:"));
    }
}
