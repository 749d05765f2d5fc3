//! Bundle output emission.
//!
//! Generates the UMD bundle from the module graph. Each module becomes a
//! registry entry keyed by module ID: the module function, whose code the
//! compiler already rewrote to `require(specifier)` and getter exports, plus
//! the map from each specifier to a module ID. The entry's exports are
//! re-exposed through getters on the UMD `exports` object, which is the
//! global (`Outeria`) for plain script tags.

use super::graph::{Module, ModuleGraph, ModuleId};
use super::sourcemap::{self, LineMap, LineOrigin, MapSource, ModuleLines, SourceMapError};
use super::BundleError;
use crate::compiler::{EXPORT_HELPER, EXPORT_STAR_HELPER};
use crate::css::is_stylesheet;
use std::collections::BTreeMap;
use std::path::Path;

/// The emitted bundle before minification.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    /// The bundled code.
    pub code: String,
    /// Origin of every line of `code`.
    pub lines: LineMap,
    /// Source map inputs, indexed by module ID.
    pub sources: Vec<MapSource>,
    /// Module names, in emission order.
    pub modules: Vec<String>,
}

impl BundleOutput {
    /// V3 source map for `code`.
    pub fn source_map(&self, file: &str) -> Result<String, SourceMapError> {
        sourcemap::bundle_map(file, &self.sources, &self.lines)
    }

    /// V3 source map for a minified version of `code`, given the minifier's
    /// map from minified positions to positions in `code`.
    pub fn compose_minified(&self, file: &str, minified_map: &str) -> Result<String, SourceMapError> {
        sourcemap::compose_minified(file, minified_map, &self.sources, &self.lines)
    }
}

#[derive(Default)]
struct Writer {
    code: String,
    lines: LineMap,
}

impl Writer {
    fn line(&mut self, text: &str, origin: Option<LineOrigin>) {
        self.code.push_str(text);
        self.code.push('\n');
        self.lines.push(origin);
    }

    fn lines(&mut self, text: &str) {
        for line in text.lines() {
            self.line(line, None);
        }
    }
}

fn registry() -> String {
    format!(
        "  var __modules = {{}};
  var __cache = {{}};

  function __require(id) {{
    var cached = __cache[id];
    if (cached) return cached.exports;
    var module = __cache[id] = {{ exports: {{}} }};
    var entry = __modules[id];
    entry[0](module, module.exports, function (specifier) {{
      return __require(entry[1][specifier]);
    }});
    return module.exports;
  }}

  function {EXPORT_HELPER}(target, getters) {{
    Object.keys(getters).forEach(function (name) {{
      Object.defineProperty(target, name, {{ enumerable: true, get: getters[name] }});
    }});
  }}

  function {EXPORT_STAR_HELPER}(target, source) {{
    Object.keys(source).forEach(function (name) {{
      if (name === 'default' || Object.prototype.hasOwnProperty.call(target, name)) return;
      Object.defineProperty(target, name, {{
        enumerable: true,
        get: function () {{ return source[name]; }}
      }});
    }});
  }}
"
    )
}

/// Emit a UMD bundle exposing the entry module's exports as `global_name`.
pub fn emit_umd(graph: &ModuleGraph, global_name: &str) -> Result<BundleOutput, BundleError> {
    let order = graph.toposort();
    let entry: ModuleId = 0;
    if graph.get(entry).is_none() {
        return Err(BundleError::new(
            "BUNDLE_INTERNAL_ERROR",
            "Cannot emit an empty module graph",
        ));
    }

    let mut out = Writer::default();

    out.lines(&format!(
        "(function (global, factory) {{
  typeof exports === 'object' && typeof module !== 'undefined' ? factory(exports) :
  typeof define === 'function' && define.amd ? define(['exports'], factory) :
  (global = typeof globalThis !== 'undefined' ? globalThis : global || self, factory({} = {{}}));
}})(this, (function (exports) {{ 'use strict';
",
        global_accessor(global_name)
    ));
    out.lines(&registry());

    let mut modules = Vec::with_capacity(order.len());
    for &id in &order {
        let module = graph.get(id).ok_or_else(|| {
            BundleError::new("BUNDLE_INTERNAL_ERROR", format!("Module {id} not found in graph"))
        })?;

        let dependencies = dependency_map(id, module, graph)?;

        out.line("", None);
        out.line(&format!("  // {}", module.name), None);
        out.line(
            &format!("  __modules[{id}] = [function (module, exports, require) {{"),
            None,
        );
        for (index, text) in module.code.lines().enumerate() {
            let origin = LineOrigin {
                module: id as u32,
                line: index as u32,
            };
            out.line(text, Some(origin));
        }
        out.line(&format!("  }}, {dependencies}];"), None);
        modules.push(module.name.clone());
    }

    out.lines(&format!(
        "
  var __entry = __require({entry});
  Object.keys(__entry).forEach(function (key) {{
    Object.defineProperty(exports, key, {{
      enumerable: true,
      get: function () {{ return __entry[key]; }}
    }});
  }});

  Object.defineProperty(exports, '__esModule', {{ value: true }});

}}));"
    ));

    let sources = graph
        .iter()
        .map(|(_, module)| {
            let lines = match &module.map {
                Some(map) => ModuleLines::from_map(map).map_err(|e| {
                    BundleError::new("BUNDLE_SOURCEMAP_ERROR", e.to_string())
                        .with_path(module.name.clone())
                })?,
                None => ModuleLines::identity(module.code.lines().count()),
            };
            Ok(MapSource {
                name: module.name.clone(),
                content: module.source.clone(),
                lines,
            })
        })
        .collect::<Result<Vec<_>, BundleError>>()?;

    Ok(BundleOutput {
        code: out.code,
        lines: out.lines,
        sources,
        modules,
    })
}

/// `global.Name` for identifiers, `global["..."]` otherwise.
fn global_accessor(name: &str) -> String {
    let is_ident = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        format!("global.{name}")
    } else {
        format!(
            "global[{}]",
            serde_json::to_string(name).unwrap_or_else(|_| "\"\"".to_string())
        )
    }
}

/// `{"./dep": 1, ...}` for every module `module` requires.
///
/// Stylesheet imports are extracted, not required, and have no entry.
fn dependency_map(id: ModuleId, module: &Module, graph: &ModuleGraph) -> Result<String, BundleError> {
    let mut map = BTreeMap::new();
    for import in &module.imports {
        match graph.resolve_specifier(id, &import.specifier) {
            Some(target) => {
                map.insert(import.specifier.as_str(), target);
            }
            None if is_stylesheet(Path::new(&import.specifier)) => {}
            None => {
                return Err(BundleError::new(
                    "BUNDLE_UNRESOLVED_IMPORT",
                    format!("Import '{}' was not resolved", import.specifier),
                )
                .with_path(module.name.clone()));
            }
        }
    }
    serde_json::to_string(&map)
        .map_err(|e| BundleError::new("BUNDLE_INTERNAL_ERROR", e.to_string()).with_path(module.name.clone()))
}
