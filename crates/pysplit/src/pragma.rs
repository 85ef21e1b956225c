//! `# pragma: newfile("name.py")` markers
//!
//! A marker comment at the start of a line opens a named group: the top-level code that
//! follows it, up to the next marker, is written to one file of that name instead of
//! being split per definition.

use once_cell::sync::Lazy;
use regex::Regex;
use ruff_text_size::{Ranged, TextSize};

use crate::{module_naming::sanitize_module_name, parser::SourceModule};

static PRAGMA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^#\s*pragma:\s*newfile\(\s*["']([^"']+)["']\s*\)"#)
        .expect("pragma pattern is valid")
});

/// A group marker found in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaMarker {
    /// Offset of the marker comment
    pub offset: TextSize,
    /// Module name of the group, sanitized
    pub module_name: String,
    /// 1-based line of the marker
    pub line: usize,
}

/// Whether `line` is a group marker comment
pub fn is_pragma_line(line: &str) -> bool {
    PRAGMA_RE.is_match(line.trim_end())
}

/// Find every group marker outside of statements, in source order
pub fn find_pragmas(module: &SourceModule) -> Vec<PragmaMarker> {
    let source = module.source();
    let mut markers = Vec::new();
    let mut offset = 0usize;

    for (line_index, line) in source.split_inclusive('\n').enumerate() {
        let line_offset = TextSize::try_from(offset).unwrap_or_default();
        offset += line.len();

        let Some(captures) = PRAGMA_RE.captures(line.trim_end()) else {
            continue;
        };
        // A marker inside a string or a nested block is just text
        if module
            .body()
            .iter()
            .any(|stmt| stmt.range().contains(line_offset))
        {
            continue;
        }
        markers.push(PragmaMarker {
            offset: line_offset,
            module_name: sanitize_module_name(&captures[1]),
            line: line_index + 1,
        });
    }
    markers
}

/// Group name in effect at `offset`, if any
pub fn group_at(markers: &[PragmaMarker], offset: TextSize) -> Option<&PragmaMarker> {
    markers.iter().rev().find(|marker| marker.offset <= offset)
}
