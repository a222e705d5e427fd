//! JSONC reading and writing of diagram files.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::resolve::{explicit_names, governing_entry};
use super::{DiagramFile, DiagramFileError, DiagramTableEntry, LineStyle, Position};
use crate::schema::{ParseError, Table, qualify};

/// Remove `//` and `/* */` comments outside string literals. Newlines inside
/// removed comments are kept so line numbers stay put.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                out.push(ch);
                while let Some(c) = chars.next() {
                    out.push(c);
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    if c == '\n' {
                        out.push('\n');
                    }
                    prev = c;
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramFileParse {
    pub data: Option<DiagramFile>,
    pub errors: Vec<ParseError>,
}

pub fn parse(text: &str) -> DiagramFileParse {
    let stripped = strip_comments(text);
    let value: Value = match serde_json::from_str(&stripped) {
        Ok(v) => v,
        Err(e) => {
            return DiagramFileParse {
                data: None,
                errors: vec![ParseError::at_line(format!("Invalid JSON: {}", e), e.line())],
            };
        }
    };

    let mut errors = Vec::new();
    validate_file(&value, &mut errors);
    if !errors.is_empty() {
        debug!(errors = errors.len(), "diagram file rejected");
        return DiagramFileParse { data: None, errors };
    }

    match serde_json::from_value::<DiagramFile>(value) {
        Ok(file) => DiagramFileParse {
            data: Some(file),
            errors,
        },
        Err(e) => DiagramFileParse {
            data: None,
            errors: vec![ParseError::new(format!("Invalid diagram file: {}", e))],
        },
    }
}

fn validate_file(value: &Value, errors: &mut Vec<ParseError>) {
    let Some(root) = value.as_object() else {
        errors.push(ParseError::new("Diagram file must be a JSON object"));
        return;
    };

    require_string(root, "sql", "", errors);

    let Some(diagrams) = root.get("diagrams") else {
        errors.push(missing_field("", "diagrams"));
        return;
    };
    let Some(diagrams) = diagrams.as_array() else {
        errors.push(ParseError::new("\"diagrams\" must be an array"));
        return;
    };

    let mut seen = HashSet::new();
    for (i, diagram) in diagrams.iter().enumerate() {
        let path = format!("diagrams[{}]", i);
        let Some(obj) = diagram.as_object() else {
            errors.push(ParseError::new(format!("{} must be an object", path)));
            continue;
        };

        if let Some(id) = require_string(obj, "id", &path, errors) {
            if !seen.insert(id) {
                errors.push(ParseError::new(format!("Duplicate diagram id \"{}\"", id)));
            }
        }
        match obj.get("title") {
            Some(Value::String(_)) => {}
            Some(_) => errors.push(ParseError::new(format!("{}.title must be a string", path))),
            None => errors.push(missing_field(&path, "title")),
        }

        match obj.get("tables") {
            Some(Value::Array(tables)) => {
                for (j, entry) in tables.iter().enumerate() {
                    validate_table_entry(entry, &format!("{}.tables[{}]", path, j), errors);
                }
            }
            Some(_) => errors.push(ParseError::new(format!("{}.tables must be an array", path))),
            None => errors.push(missing_field(&path, "tables")),
        }

        match obj.get("relations") {
            None | Some(Value::Null) => {}
            Some(Value::Array(rules)) => {
                for (j, rule) in rules.iter().enumerate() {
                    validate_relation(rule, &format!("{}.relations[{}]", path, j), errors);
                }
            }
            Some(_) => errors.push(ParseError::new(format!(
                "{}.relations must be an array",
                path
            ))),
        }
    }
}

fn validate_table_entry(value: &Value, path: &str, errors: &mut Vec<ParseError>) {
    let Some(obj) = value.as_object() else {
        errors.push(ParseError::new(format!("{} must be an object", path)));
        return;
    };
    require_string(obj, "name", path, errors);
    for key in ["x", "y"] {
        check_optional(obj, key, path, "a number", Value::is_number, errors);
    }
    for key in ["id", "color"] {
        check_optional(obj, key, path, "a string", Value::is_string, errors);
    }
    check_optional(obj, "visible", path, "a boolean", Value::is_boolean, errors);
}

fn validate_relation(value: &Value, path: &str, errors: &mut Vec<ParseError>) {
    let Some(obj) = value.as_object() else {
        errors.push(ParseError::new(format!("{} must be an object", path)));
        return;
    };
    require_string(obj, "from", path, errors);
    require_string(obj, "to", path, errors);
    check_optional(
        obj,
        "line",
        path,
        "\"solid\" or \"dashed\"",
        |v| v.as_str().and_then(LineStyle::from_str).is_some(),
        errors,
    );
    check_optional(obj, "color", path, "a string", Value::is_string, errors);
    check_optional(obj, "visible", path, "a boolean", Value::is_boolean, errors);
}

/// A required non-empty string field; returns it when valid.
fn require_string<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Vec<ParseError>,
) -> Option<&'a str> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(_) if path.is_empty() => {
            errors.push(ParseError::new(format!("{} must be a non-empty string", key)));
            None
        }
        Some(_) => {
            errors.push(ParseError::new(format!(
                "{}.{} must be a non-empty string",
                path, key
            )));
            None
        }
        None => {
            errors.push(missing_field(path, key));
            None
        }
    }
}

fn missing_field(path: &str, key: &str) -> ParseError {
    if path.is_empty() {
        ParseError::new(format!("Missing required field \"{}\"", key))
    } else {
        ParseError::new(format!("{} is missing required field \"{}\"", path, key))
    }
}

/// Absent and `null` are both accepted for optional fields.
fn check_optional(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    expected: &str,
    ok: impl Fn(&Value) -> bool,
    errors: &mut Vec<ParseError>,
) {
    match obj.get(key) {
        None | Some(Value::Null) => {}
        Some(v) if ok(v) => {}
        Some(_) => errors.push(ParseError::new(format!(
            "{}.{} must be {}",
            path, key, expected
        ))),
    }
}

/// Write `file` back out, updating the positions of diagram `selected_id`.
///
/// Explicit entries take their current position. Every table shown through
/// a wildcard without an explicit entry gets one appended right after that
/// wildcard, so the next load keeps it in place.
pub fn serialize(
    file: &DiagramFile,
    selected_id: &str,
    positions: &HashMap<String, Position>,
    tables: &[Table],
) -> Result<String, DiagramFileError> {
    let mut file = file.clone();
    let diagram = file
        .diagrams
        .iter_mut()
        .find(|d| d.id == selected_id)
        .ok_or_else(|| DiagramFileError::UnknownDiagram(selected_id.to_string()))?;

    let entries = &diagram.tables;
    let explicit: HashSet<String> = explicit_names(entries).into_iter().collect();
    let mut updated = Vec::with_capacity(entries.len());
    let mut pinned = 0;

    for (i, entry) in entries.iter().enumerate() {
        if !entry.is_wildcard() {
            let mut entry = entry.clone();
            if let Some(pos) = positions.get(&qualify(&entry.name)) {
                let pos = pos.rounded();
                entry.x = Some(pos.x);
                entry.y = Some(pos.y);
            }
            updated.push(entry);
            continue;
        }

        updated.push(entry.clone());
        if !entry.is_visible() {
            continue;
        }
        for table in tables {
            let name = &table.qualified_name;
            if explicit.contains(name) || governing_entry(entries, table) != Some(i) {
                continue;
            }
            if let Some(pos) = positions.get(name) {
                // the pinned entry now governs the table, so it carries the
                // wildcard's styling
                updated.push(DiagramTableEntry {
                    id: entry.id.clone(),
                    color: entry.color.clone(),
                    ..DiagramTableEntry::at(name.clone(), pos.rounded())
                });
                pinned += 1;
            }
        }
    }

    debug!(diagram = selected_id, pinned, "serializing diagram file");
    diagram.tables = updated;

    let mut text = serde_json::to_string_pretty(&file)?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::resolve;
    use proptest::prelude::*;

    const SAMPLE: &str = r#"{
  // schema this file belongs to
  "sql": "schema.sql",
  "diagrams": [
    {
      "id": "main",
      "title": "Main",
      /* every table,
         then pin one */
      "tables": [
        { "name": "contract.*" },
        { "name": "contract.contract", "x": 500, "y": 600 }
      ],
      "relations": [{ "from": "*", "to": "public.users.*", "line": "dashed" }],
      "notes": [{ "text": "see https://example.com // not a comment" }]
    },
    { "id": "other", "title": "Other", "tables": [{ "name": "*", "x": 1.5 }] }
  ]
}
"#;

    fn tables() -> Vec<Table> {
        vec![
            Table::new("contract", "contract", Vec::new()),
            Table::new("contract", "scope", Vec::new()),
            Table::new("contract", "term", Vec::new()),
        ]
    }

    fn messages(parse: &DiagramFileParse) -> Vec<&str> {
        parse.errors.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn test_strip_comments_keeps_strings_and_lines() {
        let text = "{\"a\": \"x // y /* z */\", // tail\n/* one\ntwo */ \"b\": \"q\\\"//\"}";
        let out = strip_comments(text);
        assert_eq!(out, "{\"a\": \"x // y /* z */\", \n\n \"b\": \"q\\\"//\"}");
        assert_eq!(out.lines().count(), text.lines().count());
    }

    #[test]
    fn test_strip_unterminated_block_comment() {
        assert_eq!(strip_comments("1 /* open\n\n"), "1 \n\n");
    }

    #[test]
    fn test_parse_sample() {
        let parsed = parse(SAMPLE);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let file = parsed.data.unwrap();
        assert_eq!(file.sql_path, "schema.sql");
        let main = file.diagram("main").unwrap();
        assert_eq!(main.tables.len(), 2);
        assert_eq!(main.tables[1].position(), Some(Position::new(500.0, 600.0)));
        assert_eq!(main.relations()[0].line, Some(LineStyle::Dashed));
        assert!(main.extra.contains_key("notes"));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let parsed = parse("{\n  \"sql\": \"a.sql\",\n  oops\n}");
        assert!(parsed.data.is_none());
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].line, Some(3));
    }

    #[test]
    fn test_validation_collects_every_error() {
        let text = r#"{
          "sql": "",
          "diagrams": [
            { "id": "a", "title": "A", "tables": [{ "name": "" }, { "name": "t", "x": "1" }] },
            { "id": "a", "tables": 3, "relations": [{ "from": "*", "line": "dotted" }] },
            7
          ]
        }"#;
        let parsed = parse(text);
        assert!(parsed.data.is_none());
        assert_eq!(
            messages(&parsed),
            vec![
                "sql must be a non-empty string",
                "diagrams[0].tables[0].name must be a non-empty string",
                "diagrams[0].tables[1].x must be a number",
                "Duplicate diagram id \"a\"",
                "diagrams[1] is missing required field \"title\"",
                "diagrams[1].tables must be an array",
                "diagrams[1].relations[0] is missing required field \"to\"",
                "diagrams[1].relations[0].line must be \"solid\" or \"dashed\"",
                "diagrams[2] must be an object",
            ]
        );
    }

    #[test]
    fn test_missing_root_fields() {
        let parsed = parse("{}");
        assert_eq!(
            messages(&parsed),
            vec![
                "Missing required field \"sql\"",
                "Missing required field \"diagrams\""
            ]
        );
        assert_eq!(messages(&parse("[]")), vec!["Diagram file must be a JSON object"]);
    }

    #[test]
    fn test_null_optional_fields_are_absent() {
        let text = r#"{"sql":"s.sql","diagrams":[{"id":"d","title":"D","relations":null,
            "tables":[{"name":"t","x":null,"color":null}]}]}"#;
        let parsed = parse(text);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let file = parsed.data.unwrap();
        assert_eq!(file.diagrams[0].tables[0], DiagramTableEntry::new("t"));
    }

    #[test]
    fn test_serialize_pins_wildcard_tables_after_their_pattern() {
        let file = parse(SAMPLE).data.unwrap();
        let positions = HashMap::from([
            ("contract.contract".to_string(), Position::new(10.4, 20.6)),
            ("contract.scope".to_string(), Position::new(300.0, 50.0)),
        ]);
        let text = serialize(&file, "main", &positions, &tables()).unwrap();
        let back = parse(&text).data.unwrap();
        let main = back.diagram("main").unwrap();

        let names: Vec<&str> = main.tables.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["contract.*", "contract.scope", "contract.contract"]);
        assert_eq!(main.tables[0], DiagramTableEntry::new("contract.*"));
        assert_eq!(main.tables[1].position(), Some(Position::new(300.0, 50.0)));
        assert_eq!(main.tables[2].position(), Some(Position::new(10.0, 21.0)));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_serialize_keeps_wildcard_styling() {
        let text = r##"{"sql":"s.sql","diagrams":[{"id":"d","title":"D",
            "tables":[{"name":"contract.*","color":"#f00","id":"c"}]}]}"##;
        let file = parse(text).data.unwrap();
        let tables = tables();
        let before = resolve(file.diagram("d").unwrap(), &tables, None);
        let positions: HashMap<String, Position> = before
            .resolved
            .iter()
            .map(|e| (e.qualified_name.clone(), e.position()))
            .collect();

        let saved = serialize(&file, "d", &positions, &tables).unwrap();
        let reloaded = parse(&saved).data.unwrap();
        let after = resolve(reloaded.diagram("d").unwrap(), &tables, None);

        assert_eq!(reloaded.diagrams[0].tables.len(), 4);
        assert_eq!(after.resolved.len(), 3);
        for (b, a) in before.resolved.iter().zip(&after.resolved) {
            assert_eq!(a.qualified_name, b.qualified_name);
            assert_eq!(a.color.as_deref(), Some("#f00"));
            assert_eq!(a.id, b.id);
            assert_eq!(a.position(), b.position());
        }
    }

    #[test]
    fn test_serialize_leaves_other_diagrams_alone() {
        let file = parse(SAMPLE).data.unwrap();
        let positions = HashMap::from([("contract.term".to_string(), Position::new(1.0, 1.0))]);
        let text = serialize(&file, "main", &positions, &tables()).unwrap();
        let back = parse(&text).data.unwrap();

        assert_eq!(back.sql_path, file.sql_path);
        assert_eq!(back.diagram("other"), file.diagram("other"));
        let main = back.diagram("main").unwrap();
        assert_eq!(main.relations, file.diagram("main").unwrap().relations);
        assert_eq!(main.extra, file.diagram("main").unwrap().extra);
    }

    #[test]
    fn test_serialize_skips_hidden_wildcards() {
        let mut file = DiagramFile::new("s.sql");
        file.diagrams[0].tables[0].visible = Some(false);
        let positions = HashMap::from([("contract.scope".to_string(), Position::new(5.0, 5.0))]);
        let text = serialize(&file, "main", &positions, &tables()).unwrap();
        let back = parse(&text).data.unwrap();
        assert_eq!(back.diagrams[0].tables.len(), 1);
    }

    #[test]
    fn test_serialize_unknown_diagram() {
        let file = DiagramFile::new("s.sql");
        let err = serialize(&file, "nope", &HashMap::new(), &[]).unwrap_err();
        assert_eq!(err.to_string(), "Diagram \"nope\" not found");
    }

    proptest! {
        #[test]
        fn test_strip_comments_preserves_newlines(text in "[ -~\n]{0,200}") {
            let out = strip_comments(&text);
            prop_assert_eq!(
                out.matches('\n').count(),
                text.matches('\n').count()
            );
        }

        #[test]
        fn test_strip_comments_keeps_comment_free_strings(body in "[a-z/* ]{0,40}") {
            let text = format!("{{\"k\": \"{}\"}}", body);
            prop_assert_eq!(strip_comments(&text), text);
        }
    }
}
