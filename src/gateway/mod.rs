//! Async gateway
//!
//! The public face of the crate: a clonable handle that forwards
//! commands to a single worker thread owning the database. Each command
//! gets exactly one reply over a oneshot channel; the worker consumes
//! the queue strictly in order, so commands from one caller are executed
//! in the order that caller submitted them.
//!
//! The worker is a dedicated OS thread rather than a tokio task because
//! engine calls block on disk I/O; keeping them off the async scheduler
//! means a slow statement can never stall unrelated tasks. The thread
//! also anchors the single-writer invariant: the database and every
//! prepared statement live on it and never move.

use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::engine::Database;
use crate::error::{Error, Result};
use crate::executor::{
    Command, CommandExecutor, ExecOutcome, Payload, Reply, StepOutcome,
};
use crate::registry::StatementHandle;
use crate::value::Params;

/// Configuration for opening a gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    path: String,
    busy_timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Default configuration: a private in-memory database.
    pub fn new() -> Self {
        Self {
            path: ":memory:".to_string(),
            busy_timeout: None,
        }
    }

    /// Open (or create) the database file at `path`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Use a private in-memory database.
    pub fn in_memory(mut self) -> Self {
        self.path = ":memory:".to_string();
        self
    }

    /// Have the engine retry internally for up to `timeout` when another
    /// connection holds a lock, instead of reporting busy immediately.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Open the database and start the worker.
    pub async fn open(self) -> Result<Gateway> {
        Gateway::open(self).await
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<Reply>,
}

/// Clonable async handle to one open database.
///
/// All clones feed the same worker; dropping every clone (or calling
/// [`Gateway::close`]) shuts the worker down.
#[derive(Clone, Debug)]
pub struct Gateway {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Gateway {
    /// Open a database per `config` and return a handle to it.
    ///
    /// The file is opened on the worker thread; if that fails the error
    /// is returned here and no gateway exists.
    pub async fn open(config: GatewayConfig) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        thread::Builder::new()
            .name("litegate-worker".to_string())
            .spawn(move || worker(config, rx, ready_tx))
            .map_err(|e| Error::Internal(format!("failed to spawn worker thread: {}", e)))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self { tx }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::Internal(
                "worker thread exited before reporting readiness".to_string(),
            )),
        }
    }

    /// Open with default configuration (in-memory database).
    pub async fn open_in_memory() -> Result<Self> {
        Self::open(GatewayConfig::new()).await
    }

    async fn call(&self, command: Command) -> Reply {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                command,
                reply: reply_tx,
            })
            .map_err(|_| Error::Closed)?;
        reply_rx.await.map_err(|_| Error::Closed)?
    }

    /// Run one SQL statement without parameters.
    pub async fn exec(&self, sql: impl Into<String>) -> Result<ExecOutcome> {
        match self.call(Command::Exec { sql: sql.into() }).await? {
            Payload::Exec(outcome) => Ok(outcome),
            other => Err(unexpected("exec", &other)),
        }
    }

    /// Run one SQL statement with bound parameters.
    pub async fn exec_with_params(
        &self,
        sql: impl Into<String>,
        params: Params,
    ) -> Result<ExecOutcome> {
        let command = Command::BindAndExec {
            sql: sql.into(),
            params,
        };
        match self.call(command).await? {
            Payload::Exec(outcome) => Ok(outcome),
            other => Err(unexpected("exec_with_params", &other)),
        }
    }

    /// Run a multi-statement script. Returns one outcome per statement
    /// reached, stopping after the first failure; statements past the
    /// failure are never executed.
    pub async fn exec_script(
        &self,
        sql: impl Into<String>,
    ) -> Result<Vec<Result<ExecOutcome>>> {
        match self.call(Command::ExecScript { sql: sql.into() }).await? {
            Payload::Script(outcomes) => Ok(outcomes),
            other => Err(unexpected("exec_script", &other)),
        }
    }

    /// Compile a statement for repeated use.
    pub async fn prepare(&self, sql: impl Into<String>) -> Result<StatementHandle> {
        match self.call(Command::Prepare { sql: sql.into() }).await? {
            Payload::Prepared(handle) => Ok(handle),
            other => Err(unexpected("prepare", &other)),
        }
    }

    /// Bind parameters to a prepared statement.
    pub async fn bind(&self, handle: StatementHandle, params: Params) -> Result<()> {
        self.ack(Command::Bind { handle, params }, "bind").await
    }

    /// Advance a prepared statement by one row.
    pub async fn step(&self, handle: StatementHandle) -> Result<StepOutcome> {
        match self.call(Command::Step { handle }).await? {
            Payload::Stepped(outcome) => Ok(outcome),
            other => Err(unexpected("step", &other)),
        }
    }

    /// Rewind a prepared statement so it can run again.
    pub async fn reset(&self, handle: StatementHandle) -> Result<()> {
        self.ack(Command::Reset { handle }, "reset").await
    }

    /// Clear all bindings of a prepared statement back to NULL.
    pub async fn clear_bindings(&self, handle: StatementHandle) -> Result<()> {
        self.ack(Command::ClearBindings { handle }, "clear_bindings")
            .await
    }

    /// Release a prepared statement. Idempotent.
    pub async fn finalize(&self, handle: StatementHandle) -> Result<()> {
        self.ack(Command::Finalize { handle }, "finalize").await
    }

    /// Column names of a prepared statement.
    pub async fn columns(&self, handle: StatementHandle) -> Result<Vec<String>> {
        match self.call(Command::Columns { handle }).await? {
            Payload::Columns(columns) => Ok(columns),
            other => Err(unexpected("columns", &other)),
        }
    }

    /// Allow or forbid native extension loading on this connection.
    pub async fn enable_load_extension(&self, enable: bool) -> Result<()> {
        self.ack(Command::EnableLoadExtension(enable), "enable_load_extension")
            .await
    }

    /// Rows modified by the most recently completed statement.
    pub async fn changes(&self) -> Result<i64> {
        match self.call(Command::Changes).await? {
            Payload::Count(n) => Ok(n),
            other => Err(unexpected("changes", &other)),
        }
    }

    /// Path the database was opened with (`":memory:"` when in-memory).
    pub async fn filename(&self) -> Result<String> {
        match self.call(Command::Filename).await? {
            Payload::Text(path) => Ok(path),
            other => Err(unexpected("filename", &other)),
        }
    }

    /// Whether a table with the given name exists.
    pub async fn table_exists(&self, name: impl Into<String>) -> Result<bool> {
        let command = Command::TableExists { name: name.into() };
        match self.call(command).await? {
            Payload::Flag(found) => Ok(found),
            other => Err(unexpected("table_exists", &other)),
        }
    }

    /// Number of live prepared-statement handles.
    pub async fn live_statements(&self) -> Result<i64> {
        match self.call(Command::LiveStatements).await? {
            Payload::Count(n) => Ok(n),
            other => Err(unexpected("live_statements", &other)),
        }
    }

    /// Shut the gateway down: outstanding statements are finalized and
    /// the database handle is closed. Safe to call more than once;
    /// closing an already-closed gateway succeeds.
    pub async fn close(&self) -> Result<()> {
        match self.ack(Command::Close, "close").await {
            Ok(()) | Err(Error::Closed) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn ack(&self, command: Command, op: &'static str) -> Result<()> {
        match self.call(command).await? {
            Payload::Ack => Ok(()),
            other => Err(unexpected(op, &other)),
        }
    }
}

fn unexpected(op: &str, payload: &Payload) -> Error {
    Error::Internal(format!("unexpected reply payload for {}: {:?}", op, payload))
}

fn worker(
    config: GatewayConfig,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    ready: oneshot::Sender<Result<()>>,
) {
    let db = match Database::open(&config.path) {
        Ok(db) => db,
        Err(err) => {
            error!(path = %config.path, error = %err, "failed to open database");
            let _ = ready.send(Err(err));
            return;
        }
    };
    if let Some(timeout) = config.busy_timeout {
        if let Err(err) = db.busy_timeout(timeout.as_millis().min(i32::MAX as u128) as i32) {
            let _ = ready.send(Err(err));
            return;
        }
    }
    info!(path = %config.path, "database open");
    let mut executor = CommandExecutor::new(db);
    if ready.send(Ok(())).is_err() {
        // Opener went away before the gateway existed.
        return;
    }

    while let Some(envelope) = rx.blocking_recv() {
        let closing = matches!(envelope.command, Command::Close);
        let reply = executor.execute(envelope.command);
        if envelope.reply.send(reply).is_err() {
            debug!("caller dropped before receiving reply");
        }
        if closing {
            break;
        }
    }

    executor.shutdown();
    info!(path = %config.path, "database closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_failure_surfaces() {
        let err = GatewayConfig::new()
            .path("/nonexistent-dir/sub/db.sqlite")
            .open()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OpenFailed { .. }));
    }

    #[tokio::test]
    async fn test_commands_after_close() {
        let gateway = Gateway::open_in_memory().await.unwrap();
        gateway.close().await.unwrap();
        // Double close is fine.
        gateway.close().await.unwrap();

        let err = gateway.exec("SELECT 1").await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test]
    async fn test_filename_in_memory() {
        let gateway = Gateway::open_in_memory().await.unwrap();
        assert_eq!(gateway.filename().await.unwrap(), ":memory:");
        gateway.close().await.unwrap();
    }
}
