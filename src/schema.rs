//! Normalized schema model produced by the DDL parser.

use serde::Serialize;
use std::fmt;

/// Schema used for table names written without a qualifier.
pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Lowercased, whitespace-normalized type expression, e.g. `varchar(5)[]`.
    #[serde(rename = "type")]
    pub typ: String,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub qualified_name: String,
    pub columns: Vec<Column>,
    /// Primary key columns in declaration order.
    pub primary_key: Vec<String>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>, columns: Vec<Column>) -> Self {
        let schema = schema.into();
        let name = name.into();
        let qualified_name = format!("{}.{}", schema, name);
        let primary_key = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self {
            schema,
            name,
            qualified_name,
            columns,
            primary_key,
        }
    }

    /// Flag `column` as part of the primary key.
    ///
    /// Returns `false` when the table has no such column.
    pub fn mark_primary_key(&mut self, column: &str) -> bool {
        let Some(col) = self.columns.iter_mut().find(|c| c.name == column) else {
            return false;
        };
        col.is_primary_key = true;
        if !self.primary_key.iter().any(|c| c == column) {
            self.primary_key.push(column.to_string());
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    /// Empty when the target had no primary key to resolve against.
    pub target_column: String,
}

impl ForeignKey {
    pub fn is_resolved(&self) -> bool {
        !self.target_column.is_empty()
    }
}

/// A diagnostic collected while parsing SQL, reading a diagram file or
/// resolving a diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModel {
    pub tables: Vec<Table>,
    pub foreign_keys: Vec<ForeignKey>,
    pub diagnostics: Vec<ParseError>,
}

impl SchemaModel {
    pub fn table(&self, qualified_name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.qualified_name == qualified_name)
    }

    /// True when `table.column` is the source of some foreign key.
    pub fn is_foreign_key(&self, table: &str, column: &str) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.source_table == table && fk.source_column == column)
    }
}

/// Qualify a bare table name with the default schema.
pub fn qualify(name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{}.{}", DEFAULT_SCHEMA, name)
    }
}
