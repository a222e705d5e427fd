//! Table-name wildcards and relation globs.

use crate::schema::{Table, qualify};
use regex::Regex;

pub fn is_wildcard(name: &str) -> bool {
    name.ends_with('*')
}

/// A diagram table entry name, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TablePattern<'a> {
    /// `*`
    All,
    /// `schema.*`
    Schema(&'a str),
    /// `schema.prefix*`
    SchemaPrefix { schema: &'a str, prefix: &'a str },
    /// `prefix*`, matched against the qualified name across schemas
    Prefix(&'a str),
    /// A single table; bare names are qualified with the default schema.
    Exact(String),
}

impl<'a> TablePattern<'a> {
    pub fn parse(name: &'a str) -> Self {
        let Some(head) = name.strip_suffix('*') else {
            return Self::Exact(qualify(name));
        };
        if head.is_empty() {
            return Self::All;
        }
        match head.split_once('.') {
            Some((schema, "")) => Self::Schema(schema),
            Some((schema, prefix)) => Self::SchemaPrefix { schema, prefix },
            None => Self::Prefix(head),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }

    /// Schema and name are compared as separate parts, so a quoted schema
    /// containing a dot is never split.
    pub fn matches(&self, table: &Table) -> bool {
        let (schema, name) = (table.schema.as_str(), table.name.as_str());
        match self {
            Self::All => true,
            Self::Schema(s) => schema == *s,
            Self::SchemaPrefix { schema: s, prefix } => schema == *s && name.starts_with(prefix),
            Self::Prefix(prefix) => qualified_starts_with(schema, name, prefix),
            Self::Exact(q) => {
                q.len() == schema.len() + 1 + name.len() && qualified_starts_with(schema, name, q)
            }
        }
    }
}

/// Whether `schema.name` starts with `prefix`, without building the string.
fn qualified_starts_with(schema: &str, name: &str, prefix: &str) -> bool {
    match prefix.strip_prefix(schema) {
        Some(rest) => match rest.strip_prefix('.') {
            Some(rest) => name.starts_with(rest),
            None => rest.is_empty(),
        },
        None => schema.starts_with(prefix),
    }
}

/// A relation-rule glob: `*` matches any run of characters, dots included;
/// everything else is literal.
#[derive(Debug, Clone)]
pub struct Glob {
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("(?s)^{}$", body))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}
