//! litegate - a serialized gateway to an embedded SQL database
//!
//! This library gives a concurrent async program safe access to one
//! SQLite handle:
//! - Value domain and parameter binding (integer, float, text, blob, null)
//! - Engine wrapper (the crate's only unsafe code)
//! - Prepared-statement registry with generation-checked handles
//! - Command executor (prepare, bind, step loop, collect)
//! - Async gateway: a clonable handle feeding a single worker thread
//! - SQL builder and best-effort schema introspection

pub mod engine;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod registry;
pub mod sql;
pub mod value;

pub use error::{Error, Result};
pub use executor::{Command, ExecOutcome, QueryResult, StepOutcome};
pub use gateway::{Gateway, GatewayConfig};
pub use registry::StatementHandle;
pub use value::{Params, Value};
