//! SQL text utilities
//!
//! Statement generation for administrative operations and a best-effort
//! reader for the engine's stored CREATE TABLE text. Everything in here
//! works on strings outside the engine; the gateway runs the results.

pub mod builder;
pub mod introspect;

pub use builder::{
    create_table, delete, drop_table, insert, list_tables, quote_ident, select, update, vacuum,
    ColumnDef, SqlType,
};
pub use introspect::{describe_table, parse_create_table};
