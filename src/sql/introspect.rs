//! Schema introspection
//!
//! Best-effort reader for the CREATE TABLE text the engine stores in
//! `sqlite_master`. The grammar accepted here is the common subset:
//! quoted or bare column names, a declared type, and the usual column
//! constraints. Anything it cannot make sense of yields `None` rather
//! than an error; callers treat a `None` as "schema unavailable".

use crate::error::{Error, Result};
use crate::executor::ExecOutcome;
use crate::gateway::Gateway;
use crate::sql::builder::{ColumnDef, SqlType};
use crate::value::{Params, Value};

/// Parse the column list out of a CREATE TABLE statement.
///
/// Returns `None` when the text does not look like a CREATE TABLE or the
/// column list cannot be split apart. Table-level constraints (PRIMARY
/// KEY (...), FOREIGN KEY, CHECK, UNIQUE (...)) are skipped.
pub fn parse_create_table(sql: &str) -> Option<Vec<ColumnDef>> {
    let trimmed = sql.trim();
    if !trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("create"))
    {
        return None;
    }

    let open = trimmed.find('(')?;
    let close = trimmed.rfind(')')?;
    if close <= open {
        return None;
    }
    let body = &trimmed[open + 1..close];

    let mut columns = Vec::new();
    for segment in split_top_level(body) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if is_table_constraint(segment) {
            continue;
        }
        columns.push(parse_column(segment)?);
    }
    if columns.is_empty() {
        return None;
    }
    Some(columns)
}

/// Fetch and parse the stored schema of one table. `Ok(None)` means the
/// table exists but its definition was not parseable; a missing table is
/// an error.
pub async fn describe_table(gateway: &Gateway, table: &str) -> Result<Option<Vec<ColumnDef>>> {
    let outcome = gateway
        .exec_with_params(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            Params::positional(vec![Value::Text(table.to_string())]),
        )
        .await?;
    let ExecOutcome::Rows(result) = outcome else {
        return Err(Error::Internal("schema query produced no rows".to_string()));
    };
    if let Some(err) = result.interrupted {
        return Err(err);
    }
    match result.rows.first().and_then(|row| row.first()) {
        Some(Value::Text(sql)) => Ok(parse_create_table(sql)),
        Some(_) => Ok(None),
        None => Err(Error::InvalidSql(format!("no such table: {}", table))),
    }
}

/// Split on commas that sit at parenthesis depth zero and outside
/// quoted strings.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in body.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' | '[' => {
                    quote = Some(if c == '[' { ']' } else { c });
                }
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    segments.push(&body[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    segments.push(&body[start..]);
    segments
}

fn is_table_constraint(segment: &str) -> bool {
    let upper = segment.to_ascii_uppercase();
    ["PRIMARY KEY", "FOREIGN KEY", "UNIQUE", "CHECK", "CONSTRAINT"]
        .iter()
        .any(|kw| upper.starts_with(kw))
}

fn parse_column(segment: &str) -> Option<ColumnDef> {
    let (name, rest) = take_identifier(segment)?;
    let upper = rest.to_ascii_uppercase();

    // The declared type is everything up to the first constraint keyword.
    let type_end = ["PRIMARY", "NOT", "NULL", "UNIQUE", "DEFAULT", "CHECK", "REFERENCES", "COLLATE", "GENERATED"]
        .iter()
        .filter_map(|kw| find_keyword(&upper, kw))
        .min()
        .unwrap_or(rest.len());
    let declared = rest[..type_end].trim();

    let mut column = ColumnDef::new(name, SqlType::from_declared(declared));
    if find_keyword(&upper, "PRIMARY KEY").is_some() {
        column.primary_key = true;
    }
    if find_keyword(&upper, "NOT NULL").is_some() {
        column.not_null = true;
    }
    if find_keyword(&upper, "UNIQUE").is_some() {
        column.unique = true;
    }
    if let Some(pos) = find_keyword(&upper, "DEFAULT") {
        let literal = rest[pos + "DEFAULT".len()..].trim();
        column.default = parse_default(literal);
    }
    Some(column)
}

fn take_identifier(segment: &str) -> Option<(String, &str)> {
    let segment = segment.trim_start();
    let mut chars = segment.char_indices();
    let (_, first) = chars.next()?;

    if let Some(closer) = match first {
        '"' => Some('"'),
        '`' => Some('`'),
        '[' => Some(']'),
        _ => None,
    } {
        let inner_start = first.len_utf8();
        let end = segment[inner_start..].find(closer)?;
        let name = segment[inner_start..inner_start + end].to_string();
        return Some((name, &segment[inner_start + end + 1..]));
    }

    let end = segment
        .find(|c: char| c.is_whitespace())
        .unwrap_or(segment.len());
    if end == 0 {
        return None;
    }
    Some((segment[..end].to_string(), &segment[end..]))
}

/// Locate a keyword at a word boundary in already-uppercased text.
fn find_keyword(upper: &str, keyword: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = upper[from..].find(keyword) {
        let pos = from + rel;
        let before_ok = pos == 0
            || !upper[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let after = pos + keyword.len();
        let after_ok = !upper[after..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if before_ok && after_ok {
            return Some(pos);
        }
        from = pos + keyword.len();
    }
    None
}

fn parse_default(literal: &str) -> Option<Value> {
    // Only the first token; trailing constraints are not the default's.
    let token = match literal.chars().next()? {
        '\'' => {
            // A doubled quote inside the literal is an escaped quote,
            // not the terminator.
            let bytes = literal.as_bytes();
            let mut i = 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    return Some(Value::Text(literal[1..i].replace("''", "'")));
                }
                i += 1;
            }
            return None;
        }
        '(' => return None,
        _ => literal
            .split_whitespace()
            .next()
            .unwrap_or(literal),
    };
    let upper = token.to_ascii_uppercase();
    if upper == "NULL" {
        return Some(Value::Null);
    }
    if let Ok(i) = token.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Some(Value::Float(f));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_table() {
        let cols = parse_create_table(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INT DEFAULT 0)",
        )
        .unwrap();
        assert_eq!(cols.len(), 3);

        assert_eq!(cols[0].name, "id");
        assert_eq!(cols[0].sql_type, SqlType::Integer);
        assert!(cols[0].primary_key);

        assert_eq!(cols[1].name, "name");
        assert_eq!(cols[1].sql_type, SqlType::Text);
        assert!(cols[1].not_null);

        assert_eq!(cols[2].default, Some(Value::Integer(0)));
    }

    #[test]
    fn test_parse_quoted_identifiers() {
        let cols = parse_create_table(
            "CREATE TABLE \"order items\" (\"item id\" INTEGER, `qty` INT, [note] TEXT)",
        )
        .unwrap();
        assert_eq!(cols[0].name, "item id");
        assert_eq!(cols[1].name, "qty");
        assert_eq!(cols[2].name, "note");
    }

    #[test]
    fn test_skips_table_constraints() {
        let cols = parse_create_table(
            "CREATE TABLE t (a INTEGER, b INTEGER, PRIMARY KEY (a, b), \
             FOREIGN KEY (b) REFERENCES other(id))",
        )
        .unwrap();
        assert_eq!(cols.len(), 2);
    }

    #[test]
    fn test_commas_inside_types_and_strings() {
        let cols = parse_create_table(
            "CREATE TABLE t (v VARCHAR(10,2), w TEXT DEFAULT 'a,b')",
        )
        .unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[1].default, Some(Value::Text("a,b".to_string())));
    }

    #[test]
    fn test_rejects_non_create() {
        assert!(parse_create_table("SELECT 1").is_none());
        assert!(parse_create_table("").is_none());
        assert!(parse_create_table("CREATE TABLE broken").is_none());
    }

    #[test]
    fn test_round_trips_builder_output() {
        let columns = vec![
            ColumnDef::new("id", SqlType::Integer).primary_key(),
            ColumnDef::new("name", SqlType::Text).not_null().unique(),
            ColumnDef::new("score", SqlType::Real).default_value(Value::Float(0.5)),
            ColumnDef::new("payload", SqlType::Blob),
        ];
        let sql = crate::sql::builder::create_table("things", &columns);
        assert_eq!(parse_create_table(&sql), Some(columns));
    }

    #[test]
    fn test_default_variants() {
        let cols =
            parse_create_table("CREATE TABLE t (a TEXT DEFAULT 'it''s', b REAL DEFAULT 1.5, c INT DEFAULT NULL)")
                .unwrap();
        assert_eq!(cols[0].default, Some(Value::Text("it's".to_string())));
        assert_eq!(cols[1].default, Some(Value::Float(1.5)));
        assert_eq!(cols[2].default, Some(Value::Null));
    }
}
