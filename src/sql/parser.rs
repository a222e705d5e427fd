//! Recursive-descent parser for CREATE TABLE / ALTER TABLE statements.
//!
//! Only table structure is extracted: columns, primary keys and foreign
//! keys. Statements other than `CREATE TABLE` and `ALTER TABLE` are
//! skipped token by token. Errors never abort the parse; they are recorded
//! as diagnostics and parsing resumes at the next statement.
//!
//! `ALTER TABLE ... ADD PRIMARY KEY` only applies to tables created earlier
//! in the file. Inline `REFERENCES` to tables whose key is not known yet are
//! resolved once the whole file has been read.

use super::lexer::{Token, TokenKind, tokenize};
use super::stream::TokenStream;
use super::types::{TypeText, is_type_continuation, type_word};
use crate::schema::{Column, DEFAULT_SCHEMA, ForeignKey, ParseError, SchemaModel, Table};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("Expected {expected}, found {found}")]
    Expected { expected: &'static str, found: String },
    #[error("Unterminated column list for table {0}")]
    UnterminatedTable(String),
}

/// Keywords that cannot stand in for a table or column name.
const RESERVED: &[&str] = &[
    "ALTER",
    "CHECK",
    "CONSTRAINT",
    "CREATE",
    "DEFAULT",
    "EXCLUDE",
    "FOREIGN",
    "LIKE",
    "NOT",
    "NULL",
    "PRIMARY",
    "REFERENCES",
    "TABLE",
    "UNIQUE",
];

/// Keywords opening a table-level element inside `CREATE TABLE ( ... )`.
const TABLE_CONSTRAINT_STARTS: &[&str] = &[
    "CHECK",
    "CONSTRAINT",
    "EXCLUDE",
    "FOREIGN",
    "LIKE",
    "PRIMARY",
    "UNIQUE",
];

/// Parse SQL DDL into a schema model. Never fails; problems are reported in
/// [`SchemaModel::diagnostics`].
pub fn parse(sql: &str) -> SchemaModel {
    let mut parser = Parser::new(tokenize(sql));
    parser.parse_statements();
    parser.resolve_deferred_targets();
    debug!(
        tables = parser.tables.len(),
        foreign_keys = parser.foreign_keys.len(),
        diagnostics = parser.diagnostics.len(),
        "parsed schema"
    );
    SchemaModel {
        tables: parser.tables,
        foreign_keys: parser.foreign_keys,
        diagnostics: parser.diagnostics,
    }
}

/// A foreign key whose target column was unknown when it was parsed.
struct PendingTarget {
    fk: usize,
    /// Position within a multi-column key.
    position: usize,
    line: usize,
    /// A diagnostic was already recorded for this key.
    reported: bool,
}

/// An inline `REFERENCES` clause seen while parsing a column.
struct InlineRef {
    column: String,
    target: String,
    target_column: Option<String>,
    line: usize,
}

struct Parser {
    stream: TokenStream,
    tables: Vec<Table>,
    table_index: HashMap<String, usize>,
    foreign_keys: Vec<ForeignKey>,
    pending: Vec<PendingTarget>,
    diagnostics: Vec<ParseError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            stream: TokenStream::new(tokens),
            tables: Vec::new(),
            table_index: HashMap::new(),
            foreign_keys: Vec::new(),
            pending: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn parse_statements(&mut self) {
        while !self.stream.is_at_end() {
            if self.stream.is_keyword("CREATE") {
                let mark = self.stream.save();
                self.stream.next();
                let _ = self.stream.eat_keyword("UNLOGGED")
                    || self.stream.eat_keyword("TEMPORARY")
                    || self.stream.eat_keyword("TEMP");
                if self.stream.eat_keyword("TABLE") {
                    self.run_statement(Self::parse_create_table);
                } else {
                    // CREATE INDEX, CREATE SCHEMA, ...
                    self.stream.restore(mark);
                    self.stream.next();
                }
            } else if self.stream.is_keyword("ALTER") {
                let mark = self.stream.save();
                self.stream.next();
                if self.stream.eat_keyword("TABLE") {
                    self.run_statement(Self::parse_alter_table);
                } else {
                    self.stream.restore(mark);
                    self.stream.next();
                }
            } else {
                self.stream.next();
            }
        }
    }

    /// Run one statement body, turning a failure into a diagnostic and
    /// skipping to the next statement.
    fn run_statement(&mut self, body: fn(&mut Self) -> Result<(), SqlError>) {
        if let Err(e) = body(self) {
            let line = self.stream.current_line();
            warn!(line, error = %e, "skipping malformed statement");
            self.diagnostics.push(ParseError::at_line(e.to_string(), line));
            self.skip_statement();
        }
    }

    fn at_statement_start(&self) -> bool {
        self.stream.is_keyword("CREATE") || self.stream.is_keyword("ALTER")
    }

    /// Skip past the next `;`, stopping early before a new statement.
    fn skip_statement(&mut self) {
        while !self.stream.is_at_end() {
            if self.stream.eat_punct(";") || self.at_statement_start() {
                return;
            }
            self.stream.next();
        }
    }

    fn error(&self, expected: &'static str) -> SqlError {
        SqlError::Expected {
            expected,
            found: describe(self.stream.peek()),
        }
    }

    fn expect_punct(&mut self, p: &str, expected: &'static str) -> Result<(), SqlError> {
        if self.stream.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_keyword(&mut self, word: &str, expected: &'static str) -> Result<(), SqlError> {
        if self.stream.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn eat_if_exists(&mut self, with_not: bool) -> bool {
        let mark = self.stream.save();
        if self.stream.eat_keyword("IF")
            && (!with_not || self.stream.eat_keyword("NOT"))
            && self.stream.eat_keyword("EXISTS")
        {
            return true;
        }
        self.stream.restore(mark);
        false
    }

    /// Identifier, quoted identifier, or a keyword usable as a name.
    fn parse_identifier(&mut self, expected: &'static str) -> Result<String, SqlError> {
        let tok = self.stream.peek();
        let name = match tok.kind {
            TokenKind::Identifier | TokenKind::QuotedIdentifier => tok.text.clone(),
            TokenKind::Keyword if !RESERVED.contains(&tok.text.as_str()) => {
                tok.text.to_lowercase()
            }
            _ => return Err(self.error(expected)),
        };
        self.stream.next();
        Ok(name)
    }

    /// `name` or `schema.name`, returned as (schema, name).
    fn parse_qualified_name(
        &mut self,
        expected: &'static str,
    ) -> Result<(String, String), SqlError> {
        let first = self.parse_identifier(expected)?;
        if self.stream.eat_punct(".") {
            let second = self.parse_identifier(expected)?;
            Ok((first, second))
        } else {
            Ok((DEFAULT_SCHEMA.to_string(), first))
        }
    }

    /// `( ident, ident, ... )`
    fn parse_column_list(&mut self) -> Result<Vec<String>, SqlError> {
        self.expect_punct("(", "\"(\"")?;
        let mut cols = vec![self.parse_identifier("column name")?];
        while self.stream.eat_punct(",") {
            cols.push(self.parse_identifier("column name")?);
        }
        self.expect_punct(")", "\")\"")?;
        Ok(cols)
    }

    fn parse_create_table(&mut self) -> Result<(), SqlError> {
        let if_not_exists = self.eat_if_exists(true);
        let line = self.stream.current_line();
        let (schema, name) = self.parse_qualified_name("table name")?;
        let qualified = format!("{}.{}", schema, name);

        // CREATE TABLE ... AS / PARTITION OF / OF type carry no column list
        if matches!(self.stream.peek().text.as_str(), "as" | "partition" | "of")
            && self.stream.peek().kind == TokenKind::Identifier
        {
            debug!(table = %qualified, "skipping CREATE TABLE without column list");
            self.skip_statement();
            return Ok(());
        }

        self.expect_punct("(", "\"(\" after table name")?;

        let mut columns: Vec<Column> = Vec::new();
        let mut refs: Vec<InlineRef> = Vec::new();

        if !self.stream.eat_punct(")") {
            loop {
                if self.stream.is_at_end()
                    || self.stream.is_punct(";")
                    || self.at_statement_start()
                {
                    return Err(SqlError::UnterminatedTable(qualified));
                }

                if self.at_table_constraint() {
                    self.skip_element();
                } else {
                    let column_line = self.stream.current_line();
                    match self.parse_column() {
                        Ok((col, col_refs)) => {
                            if columns.iter().any(|c| c.name == col.name) {
                                self.diagnostics.push(ParseError::at_line(
                                    format!(
                                        "Column \"{}\" is defined twice in table \"{}\"",
                                        col.name, qualified
                                    ),
                                    column_line,
                                ));
                            } else {
                                columns.push(col);
                                refs.extend(col_refs);
                            }
                        }
                        Err(e) => {
                            let line = self.stream.current_line();
                            warn!(table = %qualified, line, error = %e, "skipping malformed column");
                            self.diagnostics.push(ParseError::at_line(
                                format!("Invalid column in table \"{}\": {}", qualified, e),
                                line,
                            ));
                            self.skip_element();
                        }
                    }
                }

                if self.stream.eat_punct(",") {
                    continue;
                }
                if self.stream.eat_punct(")") {
                    break;
                }
                return Err(SqlError::UnterminatedTable(qualified));
            }
        }

        if self.table_index.contains_key(&qualified) {
            if !if_not_exists {
                self.diagnostics.push(ParseError::at_line(
                    format!("Table \"{}\" is already defined", qualified),
                    line,
                ));
            }
            return Ok(());
        }

        debug!(table = %qualified, columns = columns.len(), "parsed table");
        self.table_index.insert(qualified.clone(), self.tables.len());
        self.tables.push(Table::new(schema, name, columns));

        for r in refs {
            self.add_inline_reference(&qualified, r);
        }
        Ok(())
    }

    fn at_table_constraint(&self) -> bool {
        let tok = self.stream.peek();
        tok.kind == TokenKind::Keyword && TABLE_CONSTRAINT_STARTS.contains(&tok.text.as_str())
    }

    /// Skip to the next top-level `,` or `)` of a column list without
    /// consuming it.
    fn skip_element(&mut self) {
        let mut depth = 0usize;
        while !self.stream.is_at_end() && !self.stream.is_punct(";") && !self.at_statement_start() {
            if depth == 0 && (self.stream.is_punct(",") || self.stream.is_punct(")")) {
                return;
            }
            if self.stream.is_punct("(") {
                depth += 1;
            } else if self.stream.is_punct(")") {
                depth -= 1;
            }
            self.stream.next();
        }
    }

    fn parse_column(&mut self) -> Result<(Column, Vec<InlineRef>), SqlError> {
        let name = self.parse_identifier("column name")?;
        let typ = self.parse_type()?;
        let mut is_primary_key = false;
        let mut refs = Vec::new();

        // Modifiers: only PRIMARY KEY and REFERENCES matter.
        let mut depth = 0usize;
        while !self.stream.is_at_end() && !self.stream.is_punct(";") && !self.at_statement_start() {
            if depth == 0 {
                if self.stream.is_punct(",") || self.stream.is_punct(")") {
                    break;
                }
                if self.stream.is_keyword("PRIMARY") && self.stream.look_ahead(1).is_keyword("KEY") {
                    self.stream.next();
                    self.stream.next();
                    is_primary_key = true;
                    continue;
                }
                if self.stream.is_keyword("REFERENCES") {
                    let line = self.stream.current_line();
                    self.stream.next();
                    let (schema, table) = self.parse_qualified_name("referenced table name")?;
                    let target_column = if self.stream.is_punct("(") {
                        self.parse_column_list()?.into_iter().next()
                    } else {
                        None
                    };
                    refs.push(InlineRef {
                        column: name.clone(),
                        target: format!("{}.{}", schema, table),
                        target_column,
                        line,
                    });
                    continue;
                }
            }
            if self.stream.is_punct("(") {
                depth += 1;
            } else if self.stream.is_punct(")") {
                depth -= 1;
            }
            self.stream.next();
        }

        let column = Column {
            name,
            typ,
            is_primary_key,
        };
        Ok((column, refs))
    }

    fn parse_type(&mut self) -> Result<String, SqlError> {
        let mut text = TypeText::new();

        let first = self.stream.peek();
        let starts_type = match first.kind {
            TokenKind::Identifier | TokenKind::QuotedIdentifier => true,
            TokenKind::Keyword => !RESERVED.contains(&first.text.as_str()),
            _ => false,
        };
        if !starts_type {
            return Err(self.error("column type"));
        }
        text.push_word(&type_word(first));
        self.stream.next();

        if self.stream.is_punct(".")
            && matches!(
                self.stream.look_ahead(1).kind,
                TokenKind::Identifier | TokenKind::QuotedIdentifier
            )
        {
            self.stream.next();
            text.push_dot();
            text.push_word(&type_word(self.stream.peek()));
            self.stream.next();
        }

        loop {
            if self.stream.is_punct("(") {
                let args = self.parse_type_args()?;
                text.push_args(&args);
            } else if self.stream.eat_punct("[") {
                let size = if self.stream.is(TokenKind::Number, None) {
                    Some(self.stream.next().text)
                } else {
                    None
                };
                self.expect_punct("]", "\"]\"")?;
                text.push_array(size.as_deref());
            } else if is_type_continuation(self.stream.peek()) {
                text.push_word(&type_word(self.stream.peek()));
                self.stream.next();
            } else {
                break;
            }
        }

        Ok(text.finish())
    }

    /// `( arg, arg, ... )` of a type such as `numeric(10, 2)`.
    fn parse_type_args(&mut self) -> Result<Vec<String>, SqlError> {
        self.expect_punct("(", "\"(\"")?;
        let mut args = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut depth = 0usize;
        loop {
            let tok = self.stream.peek();
            if tok.kind == TokenKind::EndOfInput || tok.is_punct(";") {
                return Err(self.error("\")\" closing type arguments"));
            }
            if depth == 0 && tok.is_punct(")") {
                self.stream.next();
                break;
            }
            if depth == 0 && tok.is_punct(",") {
                args.push(current.join(" "));
                current.clear();
                self.stream.next();
                continue;
            }
            if tok.is_punct("(") {
                depth += 1;
            } else if tok.is_punct(")") {
                depth -= 1;
            }
            current.push(match tok.kind {
                TokenKind::String => format!("'{}'", tok.text),
                _ => type_word(tok),
            });
            self.stream.next();
        }
        if !current.is_empty() {
            args.push(current.join(" "));
        }
        Ok(args)
    }

    fn add_inline_reference(&mut self, source_table: &str, r: InlineRef) {
        let target_column = match r.target_column {
            Some(col) => col,
            None => self.first_primary_key(&r.target).unwrap_or_default(),
        };
        let index = self.foreign_keys.len();
        if target_column.is_empty() {
            self.pending.push(PendingTarget {
                fk: index,
                position: 0,
                line: r.line,
                reported: false,
            });
        }
        self.foreign_keys.push(ForeignKey {
            source_table: source_table.to_string(),
            source_column: r.column,
            target_table: r.target,
            target_column,
        });
    }

    fn first_primary_key(&self, table: &str) -> Option<String> {
        self.primary_key_of(table).first().cloned()
    }

    fn primary_key_of(&self, table: &str) -> &[String] {
        self.table_index
            .get(table)
            .map(|&i| self.tables[i].primary_key.as_slice())
            .unwrap_or(&[])
    }

    fn parse_alter_table(&mut self) -> Result<(), SqlError> {
        self.eat_if_exists(false);
        self.stream.eat_keyword("ONLY");
        let line = self.stream.current_line();
        let (schema, name) = self.parse_qualified_name("table name")?;
        let qualified = format!("{}.{}", schema, name);

        if !self.stream.eat_keyword("ADD") {
            self.skip_statement();
            return Ok(());
        }
        if self.stream.eat_keyword("CONSTRAINT") {
            self.parse_identifier("constraint name")?;
        }

        if self.stream.eat_keyword("PRIMARY") {
            self.expect_keyword("KEY", "KEY after PRIMARY")?;
            let cols = self.parse_column_list()?;
            self.apply_primary_key(&qualified, &cols, line);
        } else if self.stream.eat_keyword("FOREIGN") {
            self.expect_keyword("KEY", "KEY after FOREIGN")?;
            let source_cols = self.parse_column_list()?;
            self.expect_keyword("REFERENCES", "REFERENCES")?;
            let (target_schema, target_name) =
                self.parse_qualified_name("referenced table name")?;
            let target = format!("{}.{}", target_schema, target_name);
            let target_cols = if self.stream.is_punct("(") {
                Some(self.parse_column_list()?)
            } else {
                None
            };
            self.add_foreign_key(&qualified, source_cols, &target, target_cols, line);
        }

        // ON DELETE ..., DEFERRABLE, NOT VALID, other ADD forms
        self.skip_statement();
        Ok(())
    }

    fn apply_primary_key(&mut self, table: &str, cols: &[String], line: usize) {
        let Some(&index) = self.table_index.get(table) else {
            warn!(table, "primary key for unknown table");
            self.diagnostics.push(ParseError::at_line(
                format!("ALTER TABLE references unknown table \"{}\"", table),
                line,
            ));
            return;
        };
        for col in cols {
            if !self.tables[index].mark_primary_key(col) {
                self.diagnostics.push(ParseError::at_line(
                    format!("Column \"{}\" not found in table \"{}\"", col, table),
                    line,
                ));
            }
        }
    }

    fn add_foreign_key(
        &mut self,
        source: &str,
        source_cols: Vec<String>,
        target: &str,
        target_cols: Option<Vec<String>>,
        line: usize,
    ) {
        let (target_cols, missing_key) = match target_cols {
            Some(cols) => (cols, false),
            None => {
                let pk = self.primary_key_of(target).to_vec();
                if pk.is_empty() {
                    self.diagnostics.push(ParseError::at_line(
                        format!("Foreign key references {} which has no primary key", target),
                        line,
                    ));
                    (Vec::new(), true)
                } else {
                    (pk, false)
                }
            }
        };

        if !missing_key && target_cols.len() != source_cols.len() {
            self.diagnostics.push(ParseError::at_line(
                format!(
                    "Foreign key on {} has {} column(s) but references {} column(s) of {}",
                    source,
                    source_cols.len(),
                    target_cols.len(),
                    target
                ),
                line,
            ));
        }

        for (position, source_column) in source_cols.into_iter().enumerate() {
            let target_column = if missing_key {
                String::new()
            } else {
                match target_cols.get(position) {
                    Some(col) => col.clone(),
                    None => break,
                }
            };
            if target_column.is_empty() {
                self.pending.push(PendingTarget {
                    fk: self.foreign_keys.len(),
                    position,
                    line,
                    reported: true,
                });
            }
            self.foreign_keys.push(ForeignKey {
                source_table: source.to_string(),
                source_column,
                target_table: target.to_string(),
                target_column,
            });
        }
    }

    /// Resolve target columns left empty while parsing, now that every
    /// primary key in the file is known.
    fn resolve_deferred_targets(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for p in pending {
            let target = self.foreign_keys[p.fk].target_table.clone();
            let pk = self.primary_key_of(&target);
            match pk.get(p.position).or_else(|| pk.first()).cloned() {
                Some(col) => self.foreign_keys[p.fk].target_column = col,
                None if !p.reported => {
                    self.diagnostics.push(ParseError::at_line(
                        format!("Foreign key references {} which has no primary key", target),
                        p.line,
                    ));
                }
                None => {}
            }
        }
    }
}

fn describe(tok: &Token) -> String {
    match tok.kind {
        TokenKind::EndOfInput => "end of input".to_string(),
        TokenKind::String => format!("'{}'", tok.text),
        _ => format!("\"{}\"", tok.text),
    }
}
