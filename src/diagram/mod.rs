//! Diagram file model, resolution against a schema, and the JSONC codec.
//!
//! A diagram file (`*.erd-pets.json`) names the SQL file it belongs to and
//! holds any number of diagrams. Each diagram is an ordered list of table
//! entries (explicit names or wildcard patterns) plus optional relation
//! styling rules. Fields this crate does not interpret (`notes`, `arrows`,
//! anything else) are carried through untouched.

pub mod codec;
pub mod pattern;
pub mod resolve;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

pub use codec::{DiagramFileParse, parse, serialize, strip_comments};
pub use pattern::{Glob, TablePattern, is_wildcard};
pub use resolve::{
    RelationStyle, RelationStyler, Resolution, ResolvedTableEntry, resolve, resolve_relation,
    resolve_with_config, set_table_visibility,
};

/// File name suffix of diagram files.
pub const FILE_EXTENSION: &str = ".erd-pets.json";

#[derive(Debug, Error)]
pub enum DiagramFileError {
    #[error("Diagram \"{0}\" not found")]
    UnknownDiagram(String),
    #[error("Failed to encode diagram file: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn rounded(self) -> Self {
        Self::new(self.x.round(), self.y.round())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
}

impl LineStyle {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "solid" => Some(Self::Solid),
            "dashed" => Some(Self::Dashed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramFile {
    /// Path of the SQL schema file, relative to the diagram file.
    #[serde(rename = "sql")]
    pub sql_path: String,
    pub diagrams: Vec<DiagramDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiagramFile {
    /// A new file with a single `main` diagram showing every table.
    pub fn new(sql_path: impl Into<String>) -> Self {
        Self {
            sql_path: sql_path.into(),
            diagrams: vec![DiagramDefinition {
                id: "main".to_string(),
                title: "Main".to_string(),
                tables: vec![DiagramTableEntry::new("*")],
                relations: None,
                extra: Map::new(),
            }],
            extra: Map::new(),
        }
    }

    pub fn diagram(&self, id: &str) -> Option<&DiagramDefinition> {
        self.diagrams.iter().find(|d| d.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramDefinition {
    pub id: String,
    pub title: String,
    pub tables: Vec<DiagramTableEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<Vec<RelationRule>>,
    /// `notes`, `arrows` and other annotation data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiagramDefinition {
    pub fn relations(&self) -> &[RelationRule] {
        self.relations.as_deref().unwrap_or(&[])
    }
}

/// One line of a diagram's `tables` list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagramTableEntry {
    /// Qualified table name or wildcard pattern.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_coord"
    )]
    pub x: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_coord"
    )]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiagramTableEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn at(name: impl Into<String>, pos: Position) -> Self {
        Self {
            x: Some(pos.x),
            y: Some(pos.y),
            ..Self::new(name)
        }
    }

    pub fn is_wildcard(&self) -> bool {
        is_wildcard(&self.name)
    }

    pub fn is_visible(&self) -> bool {
        self.visible != Some(false)
    }

    /// The entry's own position, when both coordinates are given.
    pub fn position(&self) -> Option<Position> {
        Some(Position::new(self.x?, self.y?))
    }
}

/// Styling rule for foreign-key edges, matched on `schema.table.column` globs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRule {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<LineStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RelationRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            line: None,
            color: None,
            visible: None,
            extra: Map::new(),
        }
    }
}

/// Whole-number coordinates are written without a fraction.
fn serialize_coord<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => serializer.serialize_i64(*v as i64),
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization_omits_absent_fields() {
        let entry = DiagramTableEntry::at("public.users", Position::new(100.0, 42.5));
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"name":"public.users","x":100,"y":42.5}"#);
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let json = r#"{"id":"d","title":"D","tables":[],"notes":[{"text":"hi"}],"arrows":[]}"#;
        let d: DiagramDefinition = serde_json::from_str(json).unwrap();
        assert!(d.extra.contains_key("notes"));
        assert!(d.extra.contains_key("arrows"));
        assert_eq!(serde_json::to_string(&d).unwrap(), json);
    }

    #[test]
    fn test_new_file_template() {
        let file = DiagramFile::new("schema.sql");
        let main = file.diagram("main").unwrap();
        assert_eq!(main.tables, vec![DiagramTableEntry::new("*")]);
        assert!(main.relations().is_empty());
    }

    #[test]
    fn test_entry_position_requires_both_coordinates() {
        let mut entry = DiagramTableEntry::new("t");
        entry.x = Some(1.0);
        assert_eq!(entry.position(), None);
        entry.y = Some(2.0);
        assert_eq!(entry.position(), Some(Position::new(1.0, 2.0)));
    }

    #[test]
    fn test_line_style_names() {
        assert_eq!(LineStyle::from_str("dashed"), Some(LineStyle::Dashed));
        assert_eq!(LineStyle::from_str("dotted"), None);
        assert_eq!(serde_json::to_string(&LineStyle::Solid).unwrap(), "\"solid\"");
    }
}
