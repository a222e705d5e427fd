//! Render-ready view of one diagram: positioned tables and styled edges.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::diagram::{DiagramDefinition, LineStyle, Position, RelationStyler, resolve_with_config};
use crate::layout::PlacementConfig;
use crate::schema::{ParseError, SchemaModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    Tables,
    Pk,
    PkFk,
    #[default]
    All,
}

impl DetailLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "tables" => Some(Self::Tables),
            "pk" => Some(Self::Pk),
            "pk_fk" => Some(Self::PkFk),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn includes(self, is_pk: bool, is_fk: bool) -> bool {
        match self {
            Self::Tables => false,
            Self::Pk => is_pk,
            Self::PkFk => is_pk || is_fk,
            Self::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramView {
    pub tables: Vec<TableNode>,
    pub edges: Vec<EdgeView>,
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableNode {
    pub qualified_name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub from_wildcard: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_pattern: Option<String>,
    pub columns: Vec<ColumnView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
    pub is_pk: bool,
    pub is_fk: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeView {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub line: LineStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl DiagramView {
    pub fn build(
        schema: &SchemaModel,
        diagram: &DiagramDefinition,
        existing: Option<&HashMap<String, Position>>,
        detail: DetailLevel,
    ) -> Self {
        Self::build_with_config(schema, diagram, existing, detail, &PlacementConfig::default())
    }

    pub fn build_with_config(
        schema: &SchemaModel,
        diagram: &DiagramDefinition,
        existing: Option<&HashMap<String, Position>>,
        detail: DetailLevel,
        config: &PlacementConfig,
    ) -> Self {
        let resolution = resolve_with_config(diagram, &schema.tables, existing, config);

        let tables: Vec<TableNode> = resolution
            .resolved
            .into_iter()
            .filter_map(|entry| {
                let table = schema.table(&entry.qualified_name)?;
                let columns: Vec<ColumnView> = table
                    .columns
                    .iter()
                    .filter_map(|c| {
                        let is_fk = schema.is_foreign_key(&table.qualified_name, &c.name);
                        detail.includes(c.is_primary_key, is_fk).then(|| ColumnView {
                            name: c.name.clone(),
                            typ: c.typ.clone(),
                            is_pk: c.is_primary_key,
                            is_fk,
                        })
                    })
                    .collect();
                let (width, height) = config.metrics.node_size(
                    &table.qualified_name,
                    columns.iter().map(|c| (c.name.as_str(), c.typ.as_str())),
                );
                Some(TableNode {
                    qualified_name: entry.qualified_name,
                    x: entry.x,
                    y: entry.y,
                    width,
                    height,
                    id: entry.id,
                    color: entry.color,
                    from_wildcard: entry.from_wildcard,
                    original_pattern: entry.original_pattern,
                    columns,
                })
            })
            .collect();

        let shown: HashSet<&str> = tables.iter().map(|t| t.qualified_name.as_str()).collect();
        let styler = RelationStyler::new(diagram.relations());
        let edges = schema
            .foreign_keys
            .iter()
            .filter(|fk| {
                shown.contains(fk.source_table.as_str()) && shown.contains(fk.target_table.as_str())
            })
            .filter_map(|fk| {
                let style = styler.style(fk);
                (!style.hidden).then(|| EdgeView {
                    source_table: fk.source_table.clone(),
                    source_column: fk.source_column.clone(),
                    target_table: fk.target_table.clone(),
                    target_column: fk.target_column.clone(),
                    line: style.line.unwrap_or_default(),
                    color: style.color,
                })
            })
            .collect();

        DiagramView {
            tables,
            edges,
            errors: resolution.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{DiagramTableEntry, RelationRule};
    use crate::sql;
    use serde_json::Map;

    const SQL: &str = "
        CREATE TABLE users (id int PRIMARY KEY, name text, email text);
        CREATE TABLE orders (id int PRIMARY KEY, user_id int REFERENCES users, note text);
        CREATE TABLE audit.log (id int, created_by int REFERENCES users (id));
    ";

    fn diagram(tables: &[&str], relations: Option<Vec<RelationRule>>) -> DiagramDefinition {
        DiagramDefinition {
            id: "d".into(),
            title: "D".into(),
            tables: tables.iter().map(|t| DiagramTableEntry::new(*t)).collect(),
            relations,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_view_all_detail() {
        let schema = sql::parse(SQL);
        let view = DiagramView::build(&schema, &diagram(&["*"], None), None, DetailLevel::All);

        assert_eq!(view.tables.len(), 3);
        assert_eq!(view.tables[0].columns.len(), 3);
        assert_eq!(view.edges.len(), 2);
        assert!(view.edges.iter().all(|e| e.line == LineStyle::Solid));
    }

    #[test]
    fn test_view_pk_fk_detail() {
        let schema = sql::parse(SQL);
        let view = DiagramView::build(&schema, &diagram(&["*"], None), None, DetailLevel::PkFk);
        let orders = &view.tables[1];
        let names: Vec<&str> = orders.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "user_id"]);
        assert!(orders.columns[1].is_fk);

        let view = DiagramView::build(&schema, &diagram(&["*"], None), None, DetailLevel::Tables);
        assert!(view.tables.iter().all(|t| t.columns.is_empty()));
    }

    #[test]
    fn test_edges_need_both_endpoints_visible() {
        let schema = sql::parse(SQL);
        let view = DiagramView::build(
            &schema,
            &diagram(&["public.*"], None),
            None,
            DetailLevel::All,
        );
        assert_eq!(view.tables.len(), 2);
        assert_eq!(view.edges.len(), 1);
        assert_eq!(view.edges[0].source_table, "public.orders");
    }

    #[test]
    fn test_hidden_relations_are_dropped() {
        let schema = sql::parse(SQL);
        let mut hide = RelationRule::new("audit.*", "*");
        hide.visible = Some(false);
        let mut dashed = RelationRule::new("*", "*");
        dashed.line = Some(LineStyle::Dashed);
        dashed.color = Some("#888".into());

        let view = DiagramView::build(
            &schema,
            &diagram(&["*"], Some(vec![hide, dashed])),
            None,
            DetailLevel::All,
        );
        assert_eq!(view.edges.len(), 1);
        assert_eq!(view.edges[0].line, LineStyle::Dashed);
        assert_eq!(view.edges[0].color.as_deref(), Some("#888"));
    }

    #[test]
    fn test_resolution_errors_are_carried() {
        let schema = sql::parse(SQL);
        let view = DiagramView::build(&schema, &diagram(&["billing.*"], None), None, DetailLevel::All);
        assert!(view.tables.is_empty());
        assert_eq!(view.errors.len(), 1);
    }

    #[test]
    fn test_detail_level_names() {
        assert_eq!(DetailLevel::from_str("pk_fk"), Some(DetailLevel::PkFk));
        assert_eq!(DetailLevel::from_str("none"), None);
    }
}
