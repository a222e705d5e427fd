pub mod diagram;
pub mod ir;
pub mod layout;
pub mod measure;
pub mod schema;
pub mod sql;

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use diagram::{DiagramDefinition, DiagramFile, DiagramTableEntry, Position};
use ir::{DetailLevel, DiagramView};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, String> {
    let json = serde_json::to_string(value).map_err(|e| e.to_string())?;
    js_sys::JSON::parse(&json).map_err(|e| format!("{:?}", e))
}

fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, String> {
    let json: String = js_sys::JSON::stringify(value)
        .map_err(|e| format!("{:?}", e))?
        .into();
    serde_json::from_str(&json).map_err(|e| e.to_string())
}

fn positions_from_js(value: &JsValue) -> Result<Option<HashMap<String, Position>>, String> {
    if value.is_undefined() || value.is_null() {
        Ok(None)
    } else {
        from_js(value).map(Some)
    }
}

/// Parse SQL DDL into `{ tables, foreignKeys, diagnostics }`.
#[wasm_bindgen(js_name = "parseSql")]
pub fn parse_sql(sql: &str) -> Result<JsValue, String> {
    to_js(&sql::parse(sql))
}

/// Parse a JSONC diagram file into `{ data, errors }`.
#[wasm_bindgen(js_name = "parseDiagramFile")]
pub fn parse_diagram_file(text: &str) -> Result<JsValue, String> {
    to_js(&diagram::parse(text))
}

#[wasm_bindgen(js_name = "stripJsonComments")]
pub fn strip_json_comments(text: &str) -> String {
    diagram::strip_comments(text)
}

/// Resolve one diagram against the schema in `sql` into a render-ready view.
#[wasm_bindgen(js_name = "resolveDiagram")]
pub fn resolve_diagram(
    sql: &str,
    diagram: JsValue,
    existing_positions: JsValue,
    detail: Option<String>,
) -> Result<JsValue, String> {
    let schema = sql::parse(sql);
    let diagram: DiagramDefinition = from_js(&diagram)?;
    let existing = positions_from_js(&existing_positions)?;

    let detail_level = detail
        .as_deref()
        .and_then(DetailLevel::from_str)
        .unwrap_or(DetailLevel::All);

    to_js(&DiagramView::build(&schema, &diagram, existing.as_ref(), detail_level))
}

/// Show or hide the table `qualified_name` of the schema in `sql`.
#[wasm_bindgen(js_name = "setTableVisibility")]
pub fn set_table_visibility(
    sql: &str,
    entries: JsValue,
    qualified_name: &str,
    visible: bool,
) -> Result<JsValue, String> {
    let schema = sql::parse(sql);
    let table = schema
        .table(qualified_name)
        .ok_or_else(|| format!("Table \"{}\" not found in SQL", qualified_name))?;
    let entries: Vec<DiagramTableEntry> = from_js(&entries)?;
    to_js(&diagram::set_table_visibility(&entries, table, visible))
}

/// Serialize a diagram file, writing the current canvas positions into the
/// selected diagram.
#[wasm_bindgen(js_name = "serializeDiagramFile")]
pub fn serialize_diagram_file(
    file: JsValue,
    selected_id: &str,
    positions: JsValue,
    sql: &str,
) -> Result<String, String> {
    let file: DiagramFile = from_js(&file)?;
    let positions = positions_from_js(&positions)?.unwrap_or_default();
    let schema = sql::parse(sql);
    diagram::serialize(&file, selected_id, &positions, &schema.tables).map_err(|e| e.to_string())
}

/// Text of a fresh diagram file showing every table of `sql_path`.
#[wasm_bindgen(js_name = "newDiagramFile")]
pub fn new_diagram_file(sql_path: &str) -> Result<String, String> {
    let file = DiagramFile::new(sql_path);
    diagram::serialize(&file, "main", &HashMap::new(), &[]).map_err(|e| e.to_string())
}
