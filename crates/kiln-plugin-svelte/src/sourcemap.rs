//! Source map helpers built on `oxc_sourcemap`
//!
//! Maps arrive from collaborators as raw JSON text. They are only decoded
//! when a position has to be traced or the referenced sources listed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use oxc_sourcemap::SourceMap;

/// A position in the pre-preprocessing source.
///
/// `line` is 1-based and `column` 0-based, matching compiler positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub line: u32,
    pub column: u32,
    pub source: String,
}

fn parse(map: &str) -> Option<SourceMap> {
    match SourceMap::from_json_string(map) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(error = ?err, "ignoring unparsable source map");
            None
        }
    }
}

/// Traces a generated position back through `map`.
///
/// Returns `None` when no mapping with a source covers the position.
pub fn trace_original(map: &str, line: u32, column: u32) -> Option<OriginalPosition> {
    let map = parse(map)?;
    let lookup_table = map.generate_lookup_table();
    let token = map.lookup_token(&lookup_table, line.checked_sub(1)?, column)?;
    let source_id = token.get_source_id()?;
    let source = map.get_source(source_id)?;

    Some(OriginalPosition {
        line: token.get_src_line() + 1,
        column: token.get_src_col(),
        source: source.to_string(),
    })
}

/// Lists the sources referenced by `map`
pub fn sources(map: &str) -> Vec<String> {
    parse(map)
        .map(|map| map.get_sources().map(|source| source.to_string()).collect())
        .unwrap_or_default()
}

/// Encodes a JSON source map as a self-contained data URL
pub fn to_data_url(map: &str) -> String {
    format!(
        "data:application/json;charset=utf-8;base64,{}",
        STANDARD.encode(map)
    )
}

/// Trailing comment for compiled scripts
pub fn script_comment(map: &str) -> String {
    format!("//# sourceMappingURL={}", to_data_url(map))
}

/// Trailing comment for stylesheets
pub fn stylesheet_comment(map: &str) -> String {
    format!("/*# sourceMappingURL={} */", to_data_url(map))
}
