//! SWC compiler backend implementation.
//!
//! - TypeScript type stripping (`.ts`, `.tsx`, `.mts`, `.cts`)
//! - JSX lowering for component files (`.jsx`, `.tsx`)
//! - Module syntax rewritten for the bundle registry (see [`super::registry`])
//! - Inline ("bundled") runtime helpers: any helper a transform needs is
//!   emitted into the module itself, never imported from a helpers package
//! - Source map generation

#![allow(clippy::default_trait_access)]
#![allow(clippy::map_unwrap_or)]

use super::minify::{minify_with_swc, MinifyOptions};
use super::registry::rewrite_module;
use super::spec::{Diagnostic, EsTarget, SourceMapKind};
use super::{CompilerBackend, CompilerError, TranspileOutput, TranspileSpec};
use swc_common::{sync::Lrc, SourceMap, Span, Spanned};

/// SWC-based compiler backend.
///
/// `SwcBackend` is `Send + Sync`; each call builds its own `SourceMap` and
/// `Globals`, so calls are independent and can run on any thread.
#[derive(Debug, Clone, Default)]
pub struct SwcBackend {
    _private: (),
}

impl SwcBackend {
    /// Create a new SWC backend with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn is_typescript(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_lowercase().as_str(), "ts" | "tsx" | "mts" | "cts"))
            .unwrap_or(false)
    }

    fn is_jsx(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_lowercase().as_str(), "jsx" | "tsx"))
            .unwrap_or(false)
    }
}

impl CompilerBackend for SwcBackend {
    fn name(&self) -> &'static str {
        "swc"
    }

    fn transpile(
        &self,
        spec: &TranspileSpec,
        source: &str,
    ) -> Result<TranspileOutput, CompilerError> {
        let ext = spec
            .input_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if !self.supports_extension(ext) {
            return Err(CompilerError::unsupported_file(format!(
                "Cannot transpile {}",
                spec.input_path.display()
            )));
        }

        if source.is_empty() {
            return Ok(TranspileOutput::new(""));
        }

        let is_ts = Self::is_typescript(&spec.input_path);
        let is_jsx = Self::is_jsx(&spec.input_path);
        compile_with_swc(spec, source, is_ts, is_jsx)
    }

    fn minify(
        &self,
        filename: &str,
        source: &str,
        options: &MinifyOptions,
    ) -> Result<TranspileOutput, CompilerError> {
        minify_with_swc(filename, source, options)
    }
}

/// Map an SWC error span to a diagnostic with a 1-indexed location.
pub(super) fn span_diagnostic(
    cm: &Lrc<SourceMap>,
    span: Span,
    path: &std::path::Path,
    message: String,
) -> Diagnostic {
    let loc = cm.lookup_char_pos(span.lo);
    Diagnostic::error(message).with_location(
        path.to_path_buf(),
        loc.line as u32,
        loc.col_display as u32 + 1,
    )
}

pub(super) fn es_version(target: EsTarget) -> swc_ecma_ast::EsVersion {
    use swc_ecma_ast::EsVersion;

    match target {
        EsTarget::ES2015 => EsVersion::Es2015,
        EsTarget::ES2017 => EsVersion::Es2017,
        EsTarget::ES2020 => EsVersion::Es2020,
        EsTarget::ES2022 => EsVersion::Es2022,
        EsTarget::ESNext => EsVersion::EsNext,
    }
}

fn compile_with_swc(
    spec: &TranspileSpec,
    source: &str,
    is_ts: bool,
    is_jsx: bool,
) -> Result<TranspileOutput, CompilerError> {
    use swc_common::{comments::SingleThreadedComments, FileName, Globals, Mark, GLOBALS};
    use swc_ecma_ast::Program;
    use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
    use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
    use swc_ecma_transforms_base::helpers::{inject_helpers, Helpers, HELPERS};
    use swc_ecma_transforms_base::{fixer::fixer, hygiene::hygiene, resolver};
    use swc_ecma_transforms_react::{react, Options as ReactOptions, Runtime};
    use swc_ecma_transforms_typescript::strip;
    use swc_ecma_visit::FoldWith;

    let cm: Lrc<SourceMap> = Default::default();

    let filename = spec
        .input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input.js");
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let syntax = if is_ts {
        Syntax::Typescript(TsSyntax {
            tsx: is_jsx,
            ..Default::default()
        })
    } else {
        Syntax::Es(EsSyntax {
            jsx: is_jsx,
            ..Default::default()
        })
    };

    let target = es_version(spec.target);
    let comments = SingleThreadedComments::default();

    let lexer = Lexer::new(syntax, target, StringInput::from(&*fm), Some(&comments));
    let mut parser = Parser::new_from(lexer);

    let module = parser.parse_module().map_err(|e| {
        let message = e.kind().msg().to_string();
        let diag = span_diagnostic(&cm, e.span(), &spec.input_path, message.clone());
        CompilerError::parse_error(format!("Failed to parse: {message}")).with_diagnostics(vec![diag])
    })?;

    let recovered: Vec<Diagnostic> = parser
        .take_errors()
        .into_iter()
        .map(|e| span_diagnostic(&cm, e.span(), &spec.input_path, e.kind().msg().to_string()))
        .collect();
    if !recovered.is_empty() {
        let summary = recovered
            .iter()
            .map(|d| d.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CompilerError::parse_error(summary).with_diagnostics(recovered));
    }

    let (output, interface) = GLOBALS.set(&Globals::default(), || {
        HELPERS.set(&Helpers::new(false), || {
            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();

            let mut program = Program::Module(module);
            program = program.fold_with(&mut resolver(unresolved_mark, top_level_mark, is_ts));

            if is_ts {
                program = program.fold_with(&mut strip(unresolved_mark, top_level_mark));
            }

            let mut module = match program {
                Program::Module(m) => m,
                Program::Script(s) => swc_ecma_ast::Module {
                    span: s.span,
                    body: s
                        .body
                        .into_iter()
                        .map(swc_ecma_ast::ModuleItem::Stmt)
                        .collect(),
                    shebang: s.shebang,
                },
            };

            if is_jsx {
                // Classic: a UMD bundle cannot import `react/jsx-runtime`.
                let react_options = ReactOptions {
                    runtime: Some(Runtime::Classic),
                    ..Default::default()
                };

                module = module.fold_with(&mut react(
                    cm.clone(),
                    Some(&comments),
                    react_options,
                    top_level_mark,
                    unresolved_mark,
                ));
            }

            let interface = rewrite_module(&mut module, unresolved_mark)?;

            module = module.fold_with(&mut inject_helpers(unresolved_mark));
            module = module.fold_with(&mut hygiene());
            module = module.fold_with(&mut fixer(Some(&comments)));

            Ok::<_, CompilerError>((module, interface))
        })
    })?;

    let mut buf = Vec::new();
    let mut src_map_buf = Vec::new();

    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, Some(&mut src_map_buf));

        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default().with_target(target),
            cm: cm.clone(),
            comments: Some(&comments),
            wr: writer,
        };

        emitter
            .emit_module(&output)
            .map_err(|e| CompilerError::transform_error(format!("Failed to emit: {e}")))?;
    }

    let code = String::from_utf8(buf)
        .map_err(|e| CompilerError::transform_error(format!("Invalid UTF-8 output: {e}")))?;

    let mut result = TranspileOutput::new(code);
    result.imports = interface.imports;
    result.exports = interface.exports;
    if spec.sourcemaps == SourceMapKind::External {
        let srcmap = cm.build_source_map(&src_map_buf);
        let mut map_buf = Vec::new();
        srcmap.to_writer(&mut map_buf).map_err(|e| {
            CompilerError::transform_error(format!("Failed to write source map: {e}"))
        })?;
        let map = String::from_utf8(map_buf)
            .map_err(|e| CompilerError::transform_error(format!("Invalid source map: {e}")))?;
        result = result.with_source_map(map);
    }
    Ok(result)
}
