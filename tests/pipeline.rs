use std::collections::HashMap;

use erd_pets::diagram::{self, Position};
use erd_pets::ir::{DetailLevel, DiagramView};
use erd_pets::sql;

const SCHEMA: &str = r#"
CREATE SCHEMA contract;

CREATE TABLE public.users (
    id bigint NOT NULL,
    email character varying(255) NOT NULL,
    created_at timestamp with time zone DEFAULT now()
);

CREATE TABLE contract.contract (
    id bigint NOT NULL,
    owner_id bigint REFERENCES users,
    tags text[]
);

CREATE TABLE contract.scope (
    id bigint NOT NULL,
    contract_id bigint NOT NULL,
    amount numeric(10,2)
);

CREATE TABLE contract.term (id bigint PRIMARY KEY, body text);

CREATE INDEX scope_contract_idx ON contract.scope (contract_id);

ALTER TABLE ONLY public.users ADD CONSTRAINT users_pkey PRIMARY KEY (id);
ALTER TABLE ONLY contract.contract ADD CONSTRAINT contract_pkey PRIMARY KEY (id);
ALTER TABLE ONLY contract.scope ADD CONSTRAINT scope_pkey PRIMARY KEY (id);
ALTER TABLE ONLY contract.scope
    ADD CONSTRAINT scope_contract_fk FOREIGN KEY (contract_id) REFERENCES contract.contract(id);
"#;

const DIAGRAMS: &str = r##"{
  "sql": "schema.sql",
  "diagrams": [
    {
      "id": "contracts",
      "title": "Contracts",
      "tables": [
        // everything in the schema
        { "name": "contract.*" },
        { "name": "contract.contract", "x": 500, "y": 600, "color": "#ffe" },
        { "name": "contract.term", "visible": false },
        { "name": "users" }
      ],
      "relations": [
        { "from": "contract.contract.*", "to": "public.*", "line": "dashed" }
      ],
      "notes": [{ "text": "keep // me", "x": 10, "y": 10 }]
    },
    { "id": "users", "title": "Users", "tables": [{ "name": "public.*" }] }
  ]
}
"##;

#[test]
fn test_schema_extraction() {
    let schema = sql::parse(SCHEMA);
    assert!(schema.diagnostics.is_empty(), "{:?}", schema.diagnostics);

    let names: Vec<&str> = schema.tables.iter().map(|t| t.qualified_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["public.users", "contract.contract", "contract.scope", "contract.term"]
    );
    assert_eq!(
        schema.table("public.users").unwrap().columns[2].typ,
        "timestamp with time zone"
    );
    assert_eq!(schema.foreign_keys.len(), 2);
    // owner_id was declared before users had a key
    assert_eq!(schema.foreign_keys[0].target_column, "id");
    assert_eq!(sql::parse(SCHEMA), schema);
}

#[test]
fn test_view_of_diagram() {
    let schema = sql::parse(SCHEMA);
    let file = diagram::parse(DIAGRAMS).data.unwrap();
    let contracts = file.diagram("contracts").unwrap();

    let view = DiagramView::build(&schema, contracts, None, DetailLevel::All);
    assert!(view.errors.is_empty(), "{:?}", view.errors);

    let names: Vec<&str> = view.tables.iter().map(|t| t.qualified_name.as_str()).collect();
    assert_eq!(names, vec!["public.users", "contract.contract", "contract.scope"]);

    let contract = &view.tables[1];
    assert_eq!((contract.x, contract.y), (500.0, 600.0));
    assert_eq!(contract.color.as_deref(), Some("#ffe"));
    assert!(view.tables[2].from_wildcard);

    assert_eq!(view.edges.len(), 2);
    let owner = view
        .edges
        .iter()
        .find(|e| e.source_column == "owner_id")
        .unwrap();
    assert_eq!(owner.line, diagram::LineStyle::Dashed);
}

#[test]
fn test_save_and_reload_keeps_layout() {
    let schema = sql::parse(SCHEMA);
    let file = diagram::parse(DIAGRAMS).data.unwrap();
    let contracts = file.diagram("contracts").unwrap();
    let view = DiagramView::build(&schema, contracts, None, DetailLevel::All);

    let positions: HashMap<String, Position> = view
        .tables
        .iter()
        .map(|t| (t.qualified_name.clone(), Position::new(t.x, t.y)))
        .collect();
    let text = diagram::serialize(&file, "contracts", &positions, &schema.tables).unwrap();
    let reloaded = diagram::parse(&text).data.unwrap();

    assert_eq!(reloaded.sql_path, file.sql_path);
    let ids: Vec<&str> = reloaded.diagrams.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["contracts", "users"]);
    assert_eq!(reloaded.diagram("users"), file.diagram("users"));

    let before: Vec<&str> = contracts.tables.iter().map(|e| e.name.as_str()).collect();
    let after: Vec<&str> = reloaded
        .diagram("contracts")
        .unwrap()
        .tables
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(
        after,
        vec!["contract.*", "contract.scope", "contract.contract", "contract.term", "users"]
    );
    assert!(before.iter().all(|name| after.contains(name)));

    let again = DiagramView::build(
        &schema,
        reloaded.diagram("contracts").unwrap(),
        None,
        DetailLevel::All,
    );
    for (a, b) in view.tables.iter().zip(&again.tables) {
        assert_eq!(a.qualified_name, b.qualified_name);
        assert_eq!((a.x.round(), a.y.round()), (b.x, b.y));
    }
}

#[test]
fn test_toggle_visibility_round_trip() {
    let schema = sql::parse(SCHEMA);
    let file = diagram::parse(DIAGRAMS).data.unwrap();
    let mut contracts = file.diagram("contracts").unwrap().clone();

    let term = schema.table("contract.term").unwrap();
    let scope = schema.table("contract.scope").unwrap();
    contracts.tables = diagram::set_table_visibility(&contracts.tables, term, true);
    contracts.tables = diagram::set_table_visibility(&contracts.tables, scope, false);

    let resolution = diagram::resolve(&contracts, &schema.tables, None);
    let names: Vec<&str> = resolution
        .resolved
        .iter()
        .map(|e| e.qualified_name.as_str())
        .collect();
    assert_eq!(names, vec!["public.users", "contract.contract", "contract.term"]);
}
