//! V3 source maps for the bundle.
//!
//! Mappings are line-level: every bundle line that came from a module maps
//! to the original position of that module's transpiled line, using the
//! per-module map the compiler produced. After minification the minifier's
//! map (minified → bundle) is pushed through the same tables, so the final
//! map points at the TypeScript sources either way.

use serde::{Deserialize, Serialize};

const B64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Source map error.
#[derive(Debug, thiserror::Error)]
pub enum SourceMapError {
    #[error("invalid VLQ mapping: {0}")]
    Vlq(String),

    #[error("invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// VLQ-encode a signed integer and append to output string.
pub fn vlq_encode(value: i64, out: &mut String) {
    #[allow(clippy::cast_sign_loss)]
    let mut v = (if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    }) as u64;
    loop {
        let mut digit = (v & 0x1f) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0x20; // continuation bit
        }
        out.push(B64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

/// Decode every VLQ value in one segment.
pub fn vlq_decode(segment: &str) -> Result<Vec<i64>, SourceMapError> {
    let mut values = Vec::new();
    let mut value: u64 = 0;
    let mut shift = 0u32;

    for byte in segment.bytes() {
        let digit = B64
            .iter()
            .position(|&b| b == byte)
            .ok_or_else(|| SourceMapError::Vlq(format!("unexpected character {:?}", byte as char)))?
            as u64;

        if shift > 60 {
            return Err(SourceMapError::Vlq(format!("value too large in {segment:?}")));
        }
        value |= (digit & 0x1f) << shift;

        if digit & 0x20 == 0 {
            let magnitude = (value >> 1) as i64;
            values.push(if value & 1 == 1 { -magnitude } else { magnitude });
            value = 0;
            shift = 0;
        } else {
            shift += 5;
        }
    }

    if shift != 0 {
        return Err(SourceMapError::Vlq(format!("truncated segment {segment:?}")));
    }
    Ok(values)
}

/// One decoded mapping segment with absolute positions (all 0-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub gen_col: u32,
    pub source: u32,
    pub src_line: u32,
    pub src_col: u32,
}

/// Decode a `mappings` string into segments per generated line.
///
/// Segments without a source position are dropped.
pub fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, SourceMapError> {
    let mut lines = Vec::new();
    let (mut source, mut src_line, mut src_col) = (0i64, 0i64, 0i64);

    for line in mappings.split(';') {
        let mut segments = Vec::new();
        let mut gen_col = 0i64;

        for raw in line.split(',').filter(|s| !s.is_empty()) {
            let fields = vlq_decode(raw)?;
            gen_col += fields[0];
            if fields.len() < 4 {
                continue;
            }
            source += fields[1];
            src_line += fields[2];
            src_col += fields[3];

            let to_u32 = |v: i64| {
                u32::try_from(v).map_err(|_| SourceMapError::Vlq(format!("negative position in {raw:?}")))
            };
            segments.push(Segment {
                gen_col: to_u32(gen_col)?,
                source: to_u32(source)?,
                src_line: to_u32(src_line)?,
                src_col: to_u32(src_col)?,
            });
        }
        lines.push(segments);
    }

    Ok(lines)
}

/// Source map JSON as read and written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceMap {
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

/// A mapping with absolute positions (all 0-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mapping {
    pub gen_line: u32,
    pub gen_col: u32,
    pub source: u32,
    pub src_line: u32,
    pub src_col: u32,
}

/// Collects sources and mappings, then encodes a V3 map.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    mappings: Vec<Mapping>,
}

impl SourceMapBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file and return its index.
    pub fn add_source(&mut self, name: &str, content: Option<&str>) -> u32 {
        let idx = self.sources.len() as u32;
        self.sources.push(name.to_string());
        self.sources_content.push(content.map(str::to_string));
        idx
    }

    pub fn add_mapping(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    /// Encode the `mappings` field.
    #[must_use]
    pub fn encode_mappings(&self) -> String {
        let mut sorted = self.mappings.clone();
        sorted.sort_unstable();
        sorted.dedup_by(|a, b| a.gen_line == b.gen_line && a.gen_col == b.gen_col);

        let mut out = String::new();
        let mut line = 0u32;
        let mut first_on_line = true;
        let mut prev_col = 0i64;
        let (mut prev_source, mut prev_src_line, mut prev_src_col) = (0i64, 0i64, 0i64);

        for m in &sorted {
            while line < m.gen_line {
                out.push(';');
                line += 1;
                first_on_line = true;
                prev_col = 0;
            }
            if !first_on_line {
                out.push(',');
            }
            first_on_line = false;

            vlq_encode(i64::from(m.gen_col) - prev_col, &mut out);
            vlq_encode(i64::from(m.source) - prev_source, &mut out);
            vlq_encode(i64::from(m.src_line) - prev_src_line, &mut out);
            vlq_encode(i64::from(m.src_col) - prev_src_col, &mut out);

            prev_col = i64::from(m.gen_col);
            prev_source = i64::from(m.source);
            prev_src_line = i64::from(m.src_line);
            prev_src_col = i64::from(m.src_col);
        }

        out
    }

    #[must_use]
    pub fn to_raw(&self, file: &str) -> RawSourceMap {
        RawSourceMap {
            version: 3,
            file: Some(file.to_string()),
            sources: self.sources.clone(),
            sources_content: self.sources_content.clone(),
            names: Vec::new(),
            mappings: self.encode_mappings(),
        }
    }

    pub fn to_json(&self, file: &str) -> Result<String, SourceMapError> {
        Ok(serde_json::to_string(&self.to_raw(file))?)
    }
}

/// Where a bundle line came from: a line of a transpiled module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOrigin {
    pub module: u32,
    pub line: u32,
}

/// Origin of every line of the emitted bundle; `None` for wrapper lines.
#[derive(Debug, Clone, Default)]
pub struct LineMap {
    lines: Vec<Option<LineOrigin>>,
}

impl LineMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, origin: Option<LineOrigin>) {
        self.lines.push(origin);
    }

    #[must_use]
    pub fn get(&self, line: u32) -> Option<LineOrigin> {
        self.lines.get(line as usize).copied().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Original `(line, column)` of each line of a transpiled module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleLines(Vec<Option<(u32, u32)>>);

impl ModuleLines {
    /// First mapped position on each generated line of a compiler map.
    pub fn from_map(json: &str) -> Result<Self, SourceMapError> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        let lines = decode_mappings(&raw.mappings)?
            .into_iter()
            .map(|segments| segments.first().map(|s| (s.src_line, s.src_col)))
            .collect();
        Ok(Self(lines))
    }

    /// Line `n` maps to line `n`, for modules compiled without a map.
    #[must_use]
    pub fn identity(line_count: usize) -> Self {
        Self((0..line_count as u32).map(|l| Some((l, 0))).collect())
    }

    #[must_use]
    pub fn get(&self, line: u32) -> Option<(u32, u32)> {
        self.0.get(line as usize).copied().flatten()
    }
}

/// One original module as it appears in the bundle map.
#[derive(Debug, Clone)]
pub struct MapSource {
    /// Project-relative path.
    pub name: String,
    /// Original source text.
    pub content: String,
    pub lines: ModuleLines,
}

fn builder_for(sources: &[MapSource]) -> SourceMapBuilder {
    let mut builder = SourceMapBuilder::new();
    for source in sources {
        builder.add_source(&source.name, Some(&source.content));
    }
    builder
}

fn resolve(origin: LineOrigin, sources: &[MapSource]) -> Option<(u32, u32)> {
    sources.get(origin.module as usize)?.lines.get(origin.line)
}

/// Map of the unminified bundle.
pub fn bundle_map(file: &str, sources: &[MapSource], lines: &LineMap) -> Result<String, SourceMapError> {
    let mut builder = builder_for(sources);

    for gen_line in 0..lines.len() as u32 {
        let Some(origin) = lines.get(gen_line) else {
            continue;
        };
        if let Some((src_line, src_col)) = resolve(origin, sources) {
            builder.add_mapping(Mapping {
                gen_line,
                gen_col: 0,
                source: origin.module,
                src_line,
                src_col,
            });
        }
    }

    builder.to_json(file)
}

/// Map of the minified bundle: the minifier's map (minified → bundle)
/// composed with the bundle's line origins.
pub fn compose_minified(
    file: &str,
    minified_map: &str,
    sources: &[MapSource],
    lines: &LineMap,
) -> Result<String, SourceMapError> {
    let raw: RawSourceMap = serde_json::from_str(minified_map)?;
    let mut builder = builder_for(sources);

    for (gen_line, segments) in decode_mappings(&raw.mappings)?.into_iter().enumerate() {
        let mut last = None;
        for segment in segments {
            let Some(origin) = lines.get(segment.src_line) else {
                continue;
            };
            let Some((src_line, src_col)) = resolve(origin, sources) else {
                continue;
            };
            if last == Some((origin.module, src_line)) {
                continue;
            }
            last = Some((origin.module, src_line));
            builder.add_mapping(Mapping {
                gen_line: gen_line as u32,
                gen_col: segment.gen_col,
                source: origin.module,
                src_line,
                src_col,
            });
        }
    }

    builder.to_json(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlq_encode_known_values() {
        let encode = |v| {
            let mut s = String::new();
            vlq_encode(v, &mut s);
            s
        };
        assert_eq!(encode(0), "A");
        assert_eq!(encode(1), "C");
        assert_eq!(encode(-1), "D");
        assert_eq!(encode(16), "gB");
        assert_eq!(encode(-17), "jB");
    }

    #[test]
    fn test_vlq_decode_segment() {
        assert_eq!(vlq_decode("AAgBC").unwrap(), vec![0, 0, 16, 1]);
        assert!(vlq_decode("g").is_err());
        assert!(vlq_decode("A!").is_err());
    }

    #[test]
    fn test_decode_mappings_accumulates_across_lines() {
        // line 0: col 0 -> src 0 line 0 col 0; col 4 -> line 0 col 2
        // line 1: col 2 -> line 1 col 0
        let lines = decode_mappings("AAAA,IAAE;EACF").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][1], Segment { gen_col: 4, source: 0, src_line: 0, src_col: 2 });
        assert_eq!(lines[1][0], Segment { gen_col: 2, source: 0, src_line: 1, src_col: 0 });
    }

    #[test]
    fn test_builder_encodes_relative_columns_per_line() {
        let mut builder = SourceMapBuilder::new();
        builder.add_source("a.ts", Some("x"));
        builder.add_mapping(Mapping { gen_line: 0, gen_col: 0, source: 0, src_line: 0, src_col: 0 });
        builder.add_mapping(Mapping { gen_line: 0, gen_col: 4, source: 0, src_line: 0, src_col: 2 });
        builder.add_mapping(Mapping { gen_line: 1, gen_col: 2, source: 0, src_line: 1, src_col: 0 });

        assert_eq!(builder.encode_mappings(), "AAAA,IAAE;EACF");
    }

    #[test]
    fn test_to_json_shape() {
        let mut builder = SourceMapBuilder::new();
        builder.add_source("src/outeria.ts", Some("export {}"));
        let json: serde_json::Value =
            serde_json::from_str(&builder.to_json("outeria.min.js").unwrap()).unwrap();

        assert_eq!(json["version"], 3);
        assert_eq!(json["file"], "outeria.min.js");
        assert_eq!(json["sources"][0], "src/outeria.ts");
        assert_eq!(json["sourcesContent"][0], "export {}");
    }

    fn two_sources() -> Vec<MapSource> {
        vec![
            MapSource {
                name: "src/util.ts".into(),
                content: "export const a = 1;\n".into(),
                lines: ModuleLines::identity(1),
            },
            MapSource {
                name: "src/outeria.ts".into(),
                content: "import { a } from './util';\n\nexport const b = a;\n".into(),
                // transpiled line 1 came from original line 2
                lines: ModuleLines(vec![Some((0, 0)), Some((2, 0))]),
            },
        ]
    }

    fn wrapper_lines() -> LineMap {
        let mut lines = LineMap::new();
        lines.push(None);
        lines.push(Some(LineOrigin { module: 0, line: 0 }));
        lines.push(None);
        lines.push(Some(LineOrigin { module: 1, line: 0 }));
        lines.push(Some(LineOrigin { module: 1, line: 1 }));
        lines
    }

    #[test]
    fn test_bundle_map_line_level() {
        let json = bundle_map("bundle.js", &two_sources(), &wrapper_lines()).unwrap();
        let raw: RawSourceMap = serde_json::from_str(&json).unwrap();
        let decoded = decode_mappings(&raw.mappings).unwrap();

        assert!(decoded[0].is_empty());
        assert_eq!((decoded[1][0].source, decoded[1][0].src_line), (0, 0));
        assert!(decoded[2].is_empty());
        assert_eq!((decoded[3][0].source, decoded[3][0].src_line), (1, 0));
        assert_eq!((decoded[4][0].source, decoded[4][0].src_line), (1, 2));
    }

    #[test]
    fn test_compose_minified() {
        // One minified line; segments point back at bundle lines 1 and 4.
        let mut minified = SourceMapBuilder::new();
        minified.add_source("bundle.js", None);
        minified.add_mapping(Mapping { gen_line: 0, gen_col: 0, source: 0, src_line: 0, src_col: 0 });
        minified.add_mapping(Mapping { gen_line: 0, gen_col: 10, source: 0, src_line: 1, src_col: 4 });
        minified.add_mapping(Mapping { gen_line: 0, gen_col: 30, source: 0, src_line: 4, src_col: 4 });
        let minified_json = minified.to_json("bundle.js").unwrap();

        let json =
            compose_minified("outeria.min.js", &minified_json, &two_sources(), &wrapper_lines())
                .unwrap();
        let raw: RawSourceMap = serde_json::from_str(&json).unwrap();
        assert_eq!(raw.sources, vec!["src/util.ts", "src/outeria.ts"]);

        let decoded = decode_mappings(&raw.mappings).unwrap();
        assert_eq!(
            decoded[0],
            vec![
                Segment { gen_col: 10, source: 0, src_line: 0, src_col: 0 },
                Segment { gen_col: 30, source: 1, src_line: 2, src_col: 0 },
            ]
        );
    }

    #[test]
    fn test_module_lines_from_map() {
        let mut builder = SourceMapBuilder::new();
        builder.add_source("outeria.ts", None);
        builder.add_mapping(Mapping { gen_line: 0, gen_col: 0, source: 0, src_line: 3, src_col: 0 });
        builder.add_mapping(Mapping { gen_line: 0, gen_col: 6, source: 0, src_line: 3, src_col: 8 });
        builder.add_mapping(Mapping { gen_line: 2, gen_col: 0, source: 0, src_line: 5, src_col: 1 });

        let lines = ModuleLines::from_map(&builder.to_json("outeria.js").unwrap()).unwrap();
        assert_eq!(lines.get(0), Some((3, 0)));
        assert_eq!(lines.get(1), None);
        assert_eq!(lines.get(2), Some((5, 1)));
        assert_eq!(lines.get(9), None);
    }
}
