//! Statement generation
//!
//! Builds administrative SQL from typed descriptions. Identifiers are
//! always double-quoted; values are rendered with
//! [`Value::escape_literal`], which is quote-doubling only — callers
//! needing injection safety must bind parameters through the gateway
//! instead of baking values into text.

use serde::Serialize;
use std::fmt;

use crate::value::Value;

/// Storage class declared for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Blob => write!(f, "BLOB"),
        }
    }
}

impl SqlType {
    /// Map a declared type name to a storage class, best effort. Follows
    /// the engine's affinity rules loosely: INT anywhere means integer,
    /// CHAR/CLOB/TEXT mean text, BLOB (or nothing) means blob, REAL/
    /// FLOA/DOUB mean real; anything else lands on text.
    pub fn from_declared(decl: &str) -> Self {
        let upper = decl.to_ascii_uppercase();
        if upper.contains("INT") {
            SqlType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            SqlType::Text
        } else if upper.contains("BLOB") || upper.is_empty() {
            SqlType::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            SqlType::Real
        } else {
            SqlType::Text
        }
    }
}

/// One column of a table definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub default: Option<Value>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            primary_key: false,
            not_null: false,
            unique: false,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn render(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.escape_literal());
        }
        sql
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table(name: &str, columns: &[ColumnDef]) -> String {
    let cols: Vec<String> = columns.iter().map(ColumnDef::render).collect();
    format!("CREATE TABLE {} ({})", quote_ident(name), cols.join(", "))
}

pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE {}", quote_ident(name))
}

pub fn insert(table: &str, values: &[(&str, Value)]) -> String {
    let columns: Vec<String> = values.iter().map(|(name, _)| quote_ident(name)).collect();
    let literals: Vec<String> = values
        .iter()
        .map(|(_, value)| value.escape_literal())
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        literals.join(", ")
    )
}

/// `where_clause` is raw SQL (without the `WHERE` keyword); `None`
/// selects every row.
pub fn select(table: &str, columns: &[&str], where_clause: Option<&str>) -> String {
    let cols = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut sql = format!("SELECT {} FROM {}", cols, quote_ident(table));
    if let Some(clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

pub fn update(table: &str, assignments: &[(&str, Value)], where_clause: Option<&str>) -> String {
    let sets: Vec<String> = assignments
        .iter()
        .map(|(name, value)| format!("{} = {}", quote_ident(name), value.escape_literal()))
        .collect();
    let mut sql = format!("UPDATE {} SET {}", quote_ident(table), sets.join(", "));
    if let Some(clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

pub fn delete(table: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!("DELETE FROM {}", quote_ident(table));
    if let Some(clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

/// Lists user tables, skipping the engine's internal ones.
pub fn list_tables() -> String {
    "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        .to_string()
}

pub fn vacuum() -> String {
    "VACUUM".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table() {
        let sql = create_table(
            "users",
            &[
                ColumnDef::new("id", SqlType::Integer).primary_key(),
                ColumnDef::new("name", SqlType::Text).not_null(),
                ColumnDef::new("age", SqlType::Integer).default_value(Value::Integer(0)),
            ],
        );
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY, \
             \"name\" TEXT NOT NULL, \"age\" INTEGER DEFAULT 0)"
        );
    }

    #[test]
    fn test_insert_escapes_values() {
        let sql = insert(
            "t",
            &[
                ("a", Value::Text("it's".to_string())),
                ("b", Value::Null),
            ],
        );
        assert_eq!(sql, "INSERT INTO \"t\" (\"a\", \"b\") VALUES ('it''s', NULL)");
    }

    #[test]
    fn test_select_and_update() {
        assert_eq!(select("t", &[], None), "SELECT * FROM \"t\"");
        assert_eq!(
            select("t", &["a", "b"], Some("a > 1")),
            "SELECT \"a\", \"b\" FROM \"t\" WHERE a > 1"
        );
        assert_eq!(
            update("t", &[("a", Value::Integer(2))], Some("b = 'x'")),
            "UPDATE \"t\" SET \"a\" = 2 WHERE b = 'x'"
        );
        assert_eq!(delete("t", None), "DELETE FROM \"t\"");
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_type_from_declared() {
        assert_eq!(SqlType::from_declared("BIGINT"), SqlType::Integer);
        assert_eq!(SqlType::from_declared("VARCHAR(20)"), SqlType::Text);
        assert_eq!(SqlType::from_declared("double precision"), SqlType::Real);
        assert_eq!(SqlType::from_declared("BLOB"), SqlType::Blob);
        assert_eq!(SqlType::from_declared(""), SqlType::Blob);
    }
}
