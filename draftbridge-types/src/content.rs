//! Canonical content model for mirrored documents.
//!
//! Word-processor and slide-deck content is an ordered mapping of
//! section-name → text; spreadsheet content is a sparse mapping of
//! A1-style cell references → scalar values. Every shape has a canonical
//! text rendering (and a parser back from it) — byte-identity checks,
//! conflict snapshots, diffs and merge input all operate on that text.

use crate::Error;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Section name used for body text that appears before the first heading.
pub const PREAMBLE_SECTION: &str = "__preamble__";

/// The content shape a document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Ordered named sections (word processor, slide deck).
    Sections,
    /// Sparse cell-reference map (spreadsheet).
    Cells,
}

/// A scalar spreadsheet cell value.
///
/// A raw cell whose text parses as a finite number AND re-serializes to the
/// identical string is numeric; anything else is text. The distinction must
/// survive pull/push round trips or downstream calculations silently
/// corrupt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Classifies a raw cell string as numeric or textual.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() && n.to_string() == trimmed => CellValue::Number(n),
            _ => CellValue::Text(trimmed.to_string()),
        }
    }

    /// Returns the numeric value, if this cell is numeric.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(_) => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Canonical content of a document, in the shape appropriate to its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DocumentContent {
    /// Ordered section-name → text mapping.
    Sections(IndexMap<String, String>),
    /// Cell-reference → scalar mapping.
    Cells(BTreeMap<String, CellValue>),
}

impl DocumentContent {
    /// Returns the content kind.
    #[must_use]
    pub fn kind(&self) -> ContentKind {
        match self {
            DocumentContent::Sections(_) => ContentKind::Sections,
            DocumentContent::Cells(_) => ContentKind::Cells,
        }
    }

    /// Returns an empty content value of the given kind.
    #[must_use]
    pub fn empty(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Sections => DocumentContent::Sections(IndexMap::new()),
            ContentKind::Cells => DocumentContent::Cells(BTreeMap::new()),
        }
    }

    /// Returns true if the content holds no sections/cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            DocumentContent::Sections(s) => s.is_empty(),
            DocumentContent::Cells(c) => c.is_empty(),
        }
    }

    /// Renders the canonical text form: a heading-delimited stream for
    /// sections, `REF = value` lines for cells.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        match self {
            DocumentContent::Sections(sections) => serialize_sections(sections),
            DocumentContent::Cells(cells) => cells
                .iter()
                .map(|(reference, value)| format!("{reference} = {value}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Parses content back from its canonical text form.
    ///
    /// Section parsing never fails (unrecognized lines are body text);
    /// cell parsing rejects lines without a `REF = value` shape.
    pub fn from_canonical(kind: ContentKind, text: &str) -> crate::Result<Self> {
        match kind {
            ContentKind::Sections => Ok(DocumentContent::Sections(parse_sections(text))),
            ContentKind::Cells => Ok(DocumentContent::Cells(parse_cells(text)?)),
        }
    }

    /// Returns the section mapping, if this is section content.
    #[must_use]
    pub fn as_sections(&self) -> Option<&IndexMap<String, String>> {
        match self {
            DocumentContent::Sections(s) => Some(s),
            DocumentContent::Cells(_) => None,
        }
    }

    /// Returns the cell mapping, if this is cell content.
    #[must_use]
    pub fn as_cells(&self) -> Option<&BTreeMap<String, CellValue>> {
        match self {
            DocumentContent::Cells(c) => Some(c),
            DocumentContent::Sections(_) => None,
        }
    }
}

// ── Section stream ───────────────────────────────────────────────

/// Returns the heading text if a line is a markdown-style heading
/// (one to three `#` followed by whitespace and non-empty text).
fn heading_text(line: &str) -> Option<&str> {
    let stripped = line.trim_start_matches('#');
    let level = line.len() - stripped.len();
    if !(1..=3).contains(&level) {
        return None;
    }
    let rest = stripped.strip_prefix(|c: char| c == ' ' || c == '\t')?;
    let text = rest.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parses a heading-delimited text stream into ordered named sections.
/// Body text before the first heading lands under [`PREAMBLE_SECTION`];
/// sections with empty bodies are dropped.
fn parse_sections(text: &str) -> IndexMap<String, String> {
    let mut sections = IndexMap::new();
    let mut current = PREAMBLE_SECTION.to_string();
    let mut body: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if let Some(heading) = heading_text(line) {
            let joined = body.join("\n");
            let trimmed = joined.trim();
            let previous = std::mem::replace(&mut current, heading.to_string());
            if !trimmed.is_empty() {
                sections.insert(previous, trimmed.to_string());
            }
            body.clear();
        } else {
            body.push(line);
        }
    }

    let joined = body.join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        sections.insert(current, trimmed.to_string());
    }

    sections
}

/// Serializes named sections back into the heading-delimited stream.
/// The preamble section is emitted without a heading line.
fn serialize_sections(sections: &IndexMap<String, String>) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (heading, section_body) in sections {
        if heading != PREAMBLE_SECTION {
            parts.push(format!("# {heading}"));
        }
        parts.push(section_body.clone());
        parts.push(String::new());
    }
    parts.join("\n")
}

// ── Cell maps ────────────────────────────────────────────────────

fn parse_cells(text: &str) -> crate::Result<BTreeMap<String, CellValue>> {
    let mut cells = BTreeMap::new();
    for line in text.split('\n') {
        if line.trim().is_empty() {
            continue;
        }
        let (reference, raw) = line
            .split_once(" = ")
            .ok_or_else(|| Error::Content(format!("cell line without separator: {line:?}")))?;
        let reference = reference.trim();
        split_cell_ref(reference)
            .ok_or_else(|| Error::Content(format!("invalid cell reference: {reference:?}")))?;
        cells.insert(reference.to_string(), CellValue::parse(raw));
    }
    Ok(cells)
}

/// Splits an A1-style cell reference into (column letters, 1-based row).
/// Returns `None` if the reference is malformed.
#[must_use]
pub fn split_cell_ref(reference: &str) -> Option<(&str, u32)> {
    let digits_at = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(digits_at);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((letters, row))
}

/// Converts column letters to a 1-based column index (`A` → 1, `AA` → 27).
#[must_use]
pub fn column_letter_to_index(letters: &str) -> u32 {
    letters
        .bytes()
        .fold(0u32, |index, b| index * 26 + u32::from(b - b'A' + 1))
}

/// Converts a 1-based column index back to column letters.
#[must_use]
pub fn index_to_column_letter(index: u32) -> String {
    let mut result = String::new();
    let mut remaining = index;
    while remaining > 0 {
        let modulo = (remaining - 1) % 26;
        result.insert(0, char::from(b'A' + modulo as u8));
        remaining = (remaining - 1) / 26;
    }
    result
}
