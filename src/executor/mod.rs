//! Command executor
//!
//! Translates gateway commands into engine calls on the worker thread.
//! One instance owns the open database and the prepared-statement
//! registry; every command runs to completion before the next one is
//! looked at, which serializes all access to the handle.

use serde::Serialize;
use tracing::debug;

use crate::engine::{Database, Statement, Step, STATUS_DONE};
use crate::error::{Error, Result};
use crate::registry::{StatementHandle, StatementRegistry};
use crate::value::{Params, Value};

/// A single request accepted by the gateway.
#[derive(Debug, Clone)]
pub enum Command {
    /// Run one SQL statement without parameters.
    Exec { sql: String },
    /// Run one SQL statement with bound parameters.
    BindAndExec { sql: String, params: Params },
    /// Run a multi-statement script, halting at the first error.
    ExecScript { sql: String },
    /// Compile a statement and register a handle for it.
    Prepare { sql: String },
    /// Bind parameters to a registered statement.
    Bind {
        handle: StatementHandle,
        params: Params,
    },
    /// Advance a registered statement by one row.
    Step { handle: StatementHandle },
    /// Rewind a registered statement.
    Reset { handle: StatementHandle },
    /// Clear the bindings of a registered statement.
    ClearBindings { handle: StatementHandle },
    /// Finalize a registered statement, releasing its handle.
    Finalize { handle: StatementHandle },
    /// Column names of a registered statement.
    Columns { handle: StatementHandle },
    /// Allow or forbid native extension loading.
    EnableLoadExtension(bool),
    /// Rows modified by the most recently completed statement.
    Changes,
    /// Path the database was opened with.
    Filename,
    /// Whether a table with the given name exists.
    TableExists { name: String },
    /// Number of live prepared-statement handles.
    LiveStatements,
    /// Shut the gateway down.
    Close,
}

impl Command {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Exec { .. } => "exec",
            Command::BindAndExec { .. } => "bind_and_exec",
            Command::ExecScript { .. } => "exec_script",
            Command::Prepare { .. } => "prepare",
            Command::Bind { .. } => "bind",
            Command::Step { .. } => "step",
            Command::Reset { .. } => "reset",
            Command::ClearBindings { .. } => "clear_bindings",
            Command::Finalize { .. } => "finalize",
            Command::Columns { .. } => "columns",
            Command::EnableLoadExtension(_) => "enable_load_extension",
            Command::Changes => "changes",
            Command::Filename => "filename",
            Command::TableExists { .. } => "table_exists",
            Command::LiveStatements => "live_statements",
            Command::Close => "close",
        }
    }
}

/// Collected rows of a row-producing statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    /// Column names, in statement order.
    pub columns: Vec<String>,
    /// Rows collected so far, each cell typed per the engine's tag.
    pub rows: Vec<Vec<Value>>,
    /// Set when the step loop ended on an error instead of completion.
    /// The rows above are the complete prefix produced before it.
    #[serde(skip)]
    pub interrupted: Option<Error>,
}

impl QueryResult {
    /// True when the statement ran to completion.
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Outcome of running one statement to completion.
#[derive(Debug, Clone, Serialize)]
pub enum ExecOutcome {
    /// A non-query statement finished; `status` is the engine's terminal
    /// status code.
    Done { status: i32 },
    /// An INSERT finished; carries the rowid it produced.
    Inserted(i64),
    /// A row-producing statement; see [`QueryResult::interrupted`] for
    /// whether it completed.
    Rows(QueryResult),
}

/// Outcome of single-stepping a prepared statement.
#[derive(Debug, Clone, Serialize)]
pub enum StepOutcome {
    /// One decoded row.
    Row(Vec<Value>),
    /// The statement is exhausted.
    Done,
}

/// Reply payload, one per command.
#[derive(Debug, Clone)]
pub enum Payload {
    Ack,
    Exec(ExecOutcome),
    Script(Vec<Result<ExecOutcome>>),
    Prepared(StatementHandle),
    Stepped(StepOutcome),
    Columns(Vec<String>),
    Count(i64),
    Text(String),
    Flag(bool),
}

pub(crate) type Reply = Result<Payload>;

/// True when the first significant token of `sql` is the INSERT keyword.
///
/// Leading whitespace and `--` / `/* */` comments are skipped first, so
/// a commented-out mention of INSERT does not count, and neither does an
/// UPDATE whose string literals contain the word.
pub fn starts_with_insert(sql: &str) -> bool {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            match after.split_once("*/") {
                Some((_, tail)) => rest = tail,
                None => return false,
            }
        } else {
            break;
        }
    }
    let Some(head) = rest.get(..6) else {
        return false;
    };
    if !head.eq_ignore_ascii_case("insert") {
        return false;
    }
    // Keyword boundary: "INSERTED" is not INSERT.
    !rest[6..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Owns the database handle and the statement registry; executes one
/// command at a time on the gateway worker thread.
pub struct CommandExecutor {
    // Declaration order matters: statements must be finalized before the
    // database handle closes.
    registry: StatementRegistry<Statement>,
    db: Database,
}

impl CommandExecutor {
    pub fn new(db: Database) -> Self {
        Self {
            registry: StatementRegistry::new(),
            db,
        }
    }

    /// Execute one command and produce its single reply.
    pub fn execute(&mut self, command: Command) -> Reply {
        debug!(command = command.name(), "executing");
        match command {
            Command::Exec { sql } => {
                self.exec_one(&sql, &Params::empty()).map(Payload::Exec)
            }
            Command::BindAndExec { sql, params } => {
                self.exec_one(&sql, &params).map(Payload::Exec)
            }
            Command::ExecScript { sql } => Ok(Payload::Script(self.exec_script(&sql))),
            Command::Prepare { sql } => {
                let stmt = self.db.prepare(&sql)?;
                Ok(Payload::Prepared(self.registry.register(stmt)))
            }
            Command::Bind { handle, params } => {
                self.registry.resolve_mut(handle)?.bind(&params)?;
                Ok(Payload::Ack)
            }
            Command::Step { handle } => {
                let stmt = self.registry.resolve_mut(handle)?;
                match stmt.step()? {
                    Step::Row => Ok(Payload::Stepped(StepOutcome::Row(stmt.row_values()))),
                    Step::Done => Ok(Payload::Stepped(StepOutcome::Done)),
                }
            }
            Command::Reset { handle } => {
                self.registry.resolve_mut(handle)?.reset();
                Ok(Payload::Ack)
            }
            Command::ClearBindings { handle } => {
                self.registry.resolve_mut(handle)?.clear_bindings();
                Ok(Payload::Ack)
            }
            Command::Finalize { handle } => {
                // Idempotent: finalizing an unknown handle is a no-op.
                drop(self.registry.release(handle));
                Ok(Payload::Ack)
            }
            Command::Columns { handle } => {
                Ok(Payload::Columns(self.registry.resolve(handle)?.column_names()))
            }
            Command::EnableLoadExtension(enable) => {
                self.db.enable_load_extension(enable)?;
                Ok(Payload::Ack)
            }
            Command::Changes => Ok(Payload::Count(self.db.changes())),
            Command::Filename => Ok(Payload::Text(self.db.path().to_string())),
            Command::TableExists { name } => {
                self.table_exists(&name).map(Payload::Flag)
            }
            Command::LiveStatements => Ok(Payload::Count(self.registry.len() as i64)),
            // The worker loop exits after replying to Close.
            Command::Close => Ok(Payload::Ack),
        }
    }

    /// Finalize every outstanding statement ahead of closing the handle.
    pub fn shutdown(&mut self) {
        let orphaned = self.registry.drain();
        if !orphaned.is_empty() {
            debug!(count = orphaned.len(), "finalizing orphaned statements");
        }
        drop(orphaned);
    }

    fn exec_one(&mut self, sql: &str, params: &Params) -> Result<ExecOutcome> {
        let mut stmt = self.db.prepare(sql)?;
        stmt.bind(params)?;
        self.run_statement(&mut stmt)
    }

    /// Drive one bound statement to its terminal state.
    ///
    /// Row-producing statements collect every row; if the step loop ends
    /// on an error the rows gathered so far are returned alongside it.
    /// Non-query statements report the terminal status, or the new rowid
    /// when the statement is an INSERT.
    fn run_statement(&mut self, stmt: &mut Statement) -> Result<ExecOutcome> {
        if stmt.column_count() > 0 {
            let mut result = QueryResult {
                columns: stmt.column_names(),
                ..QueryResult::default()
            };
            loop {
                match stmt.step() {
                    Ok(Step::Row) => result.rows.push(stmt.row_values()),
                    Ok(Step::Done) => break,
                    Err(err) => {
                        result.interrupted = Some(err);
                        break;
                    }
                }
            }
            return Ok(ExecOutcome::Rows(result));
        }

        loop {
            match stmt.step()? {
                Step::Row => continue,
                Step::Done => break,
            }
        }
        if starts_with_insert(stmt.sql()) {
            Ok(ExecOutcome::Inserted(self.db.last_insert_rowid()))
        } else {
            Ok(ExecOutcome::Done {
                status: STATUS_DONE,
            })
        }
    }

    /// Run the statements of `script` in order, one outcome each. Stops
    /// after the first statement that fails (including a row-producing
    /// statement interrupted mid-collection); later statements are never
    /// compiled or run.
    fn exec_script(&mut self, script: &str) -> Vec<Result<ExecOutcome>> {
        let mut outcomes = Vec::new();
        let mut rest = script.to_string();
        loop {
            let prepared = match self.db.prepare_next(&rest) {
                Ok(Some((stmt, tail))) => Some((stmt, tail.to_string())),
                Ok(None) => None,
                Err(err) => {
                    outcomes.push(Err(err));
                    break;
                }
            };
            let Some((mut stmt, tail)) = prepared else {
                break;
            };

            let outcome = self.run_statement(&mut stmt);
            let halt = match &outcome {
                Err(_) => true,
                Ok(ExecOutcome::Rows(result)) => !result.is_complete(),
                Ok(_) => false,
            };
            outcomes.push(outcome);
            if halt {
                break;
            }
            rest = tail;
        }
        outcomes
    }

    fn table_exists(&mut self, name: &str) -> Result<bool> {
        let mut stmt = self
            .db
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        stmt.bind(&Params::positional(vec![Value::Text(name.to_string())]))?;
        Ok(stmt.step()? == Step::Row)
    }
}
