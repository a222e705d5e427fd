//! Resolution of a diagram's table entries and relation rules against a
//! parsed schema.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::pattern::{Glob, TablePattern};
use super::{DiagramDefinition, DiagramTableEntry, LineStyle, Position, RelationRule};
use crate::layout::{PlacementConfig, Placer};
use crate::schema::{ForeignKey, ParseError, Table, qualify};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTableEntry {
    pub qualified_name: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub from_wildcard: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_pattern: Option<String>,
}

impl ResolvedTableEntry {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub resolved: Vec<ResolvedTableEntry>,
    pub errors: Vec<ParseError>,
}

pub fn resolve(
    diagram: &DiagramDefinition,
    tables: &[Table],
    existing: Option<&HashMap<String, Position>>,
) -> Resolution {
    resolve_with_config(diagram, tables, existing, &PlacementConfig::default())
}

pub fn resolve_with_config(
    diagram: &DiagramDefinition,
    tables: &[Table],
    existing: Option<&HashMap<String, Position>>,
    config: &PlacementConfig,
) -> Resolution {
    let mut errors = Vec::new();
    // qualified name -> latest entry matching it
    let mut state: HashMap<&str, &DiagramTableEntry> = HashMap::new();

    for entry in &diagram.tables {
        let pattern = TablePattern::parse(&entry.name);
        if pattern.is_wildcard() {
            let mut matched = 0;
            for table in tables.iter().filter(|t| pattern.matches(t)) {
                state.insert(&table.qualified_name, entry);
                matched += 1;
            }
            if matched == 0 {
                warn!(diagram = %diagram.id, pattern = %entry.name, "wildcard matches no table");
                errors.push(ParseError::new(format!(
                    "No tables found matching pattern \"{}\"",
                    entry.name
                )));
            }
        } else {
            match tables.iter().find(|t| pattern.matches(t)) {
                Some(table) => {
                    state.insert(&table.qualified_name, entry);
                }
                None => {
                    warn!(diagram = %diagram.id, table = %entry.name, "table missing from schema");
                    errors.push(ParseError::new(format!(
                        "Table \"{}\" not found in SQL",
                        entry.name
                    )));
                }
            }
        }
    }

    let visible: Vec<(&Table, &DiagramTableEntry)> = tables
        .iter()
        .filter_map(|t| state.get(t.qualified_name.as_str()).map(|e| (t, *e)))
        .filter(|(_, e)| e.is_visible())
        .collect();

    let fixed: Vec<Option<Position>> = visible
        .iter()
        .map(|(table, entry)| {
            existing
                .and_then(|m| m.get(&table.qualified_name).copied())
                .or_else(|| explicit_position(entry))
        })
        .collect();

    let mut placer = Placer::new(config);
    for ((table, _), pos) in visible.iter().zip(&fixed) {
        if let Some(pos) = pos {
            placer.occupy(*pos, config.metrics.table_size(table));
        }
    }

    let resolved: Vec<ResolvedTableEntry> = visible
        .iter()
        .zip(fixed)
        .map(|((table, entry), pos)| {
            let pos = pos.unwrap_or_else(|| placer.place(config.metrics.table_size(table)));
            let from_wildcard = entry.is_wildcard();
            ResolvedTableEntry {
                qualified_name: table.qualified_name.clone(),
                x: pos.x,
                y: pos.y,
                id: entry.id.clone(),
                color: entry.color.clone(),
                from_wildcard,
                original_pattern: from_wildcard.then(|| entry.name.clone()),
            }
        })
        .collect();

    debug!(
        diagram = %diagram.id,
        entries = diagram.tables.len(),
        resolved = resolved.len(),
        errors = errors.len(),
        "resolved diagram"
    );

    Resolution { resolved, errors }
}

/// Wildcard entries never pin a position; explicit ones do when both
/// coordinates are present.
fn explicit_position(entry: &DiagramTableEntry) -> Option<Position> {
    if entry.is_wildcard() {
        None
    } else {
        entry.position()
    }
}

/// Index of the last entry matching `table`, the one resolution takes.
pub fn governing_entry(entries: &[DiagramTableEntry], table: &Table) -> Option<usize> {
    entries
        .iter()
        .rposition(|e| TablePattern::parse(&e.name).matches(table))
}

/// Show or hide one table, returning the updated entry list.
pub fn set_table_visibility(
    entries: &[DiagramTableEntry],
    table: &Table,
    visible: bool,
) -> Vec<DiagramTableEntry> {
    let mut out = entries.to_vec();
    let governing = governing_entry(entries, table);
    let explicit = governing.filter(|&i| !entries[i].is_wildcard());

    match (visible, explicit) {
        (false, Some(i)) => out[i].visible = Some(false),
        (false, None) => out.push(DiagramTableEntry {
            visible: Some(false),
            ..DiagramTableEntry::new(table.qualified_name.as_str())
        }),
        (true, Some(i)) => {
            if out[i].visible == Some(false) {
                out[i].visible = None;
            }
        }
        (true, None) => {
            let shown = governing.is_some_and(|i| entries[i].is_visible());
            if !shown {
                out.push(DiagramTableEntry::new(table.qualified_name.as_str()));
            }
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationStyle {
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<LineStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl RelationStyle {
    fn from_rule(rule: &RelationRule) -> Self {
        if rule.visible == Some(false) {
            return Self {
                hidden: true,
                ..Self::default()
            };
        }
        Self {
            hidden: false,
            line: Some(rule.line.unwrap_or_default()),
            color: rule.color.clone(),
        }
    }
}

struct CompiledRule<'a> {
    from: Option<Glob>,
    to: Option<Glob>,
    rule: &'a RelationRule,
}

/// Relation rules with their globs compiled once, for styling many edges.
pub struct RelationStyler<'a> {
    rules: Vec<CompiledRule<'a>>,
}

impl<'a> RelationStyler<'a> {
    pub fn new(rules: &'a [RelationRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                from: compile(&rule.from),
                to: compile(&rule.to),
                rule,
            })
            .collect();
        Self { rules }
    }

    /// First rule whose `from` and `to` globs both match wins.
    pub fn style(&self, fk: &ForeignKey) -> RelationStyle {
        let from_path = format!("{}.{}", fk.source_table, fk.source_column);
        let to_path = format!("{}.{}", fk.target_table, fk.target_column);
        self.rules
            .iter()
            .find(|r| {
                r.from.as_ref().is_some_and(|g| g.is_match(&from_path))
                    && r.to.as_ref().is_some_and(|g| g.is_match(&to_path))
            })
            .map(|r| RelationStyle::from_rule(r.rule))
            .unwrap_or_default()
    }
}

/// A rule whose glob cannot be compiled never matches.
fn compile(pattern: &str) -> Option<Glob> {
    match Glob::new(pattern) {
        Ok(glob) => Some(glob),
        Err(e) => {
            warn!(pattern, error = %e, "ignoring relation pattern");
            None
        }
    }
}

pub fn resolve_relation(fk: &ForeignKey, rules: &[RelationRule]) -> RelationStyle {
    RelationStyler::new(rules).style(fk)
}

/// Qualified names with an explicit (non-wildcard) entry.
pub(crate) fn explicit_names(entries: &[DiagramTableEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| !e.is_wildcard())
        .map(|e| qualify(&e.name))
        .collect()
}
