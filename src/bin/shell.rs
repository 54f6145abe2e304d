//! litegate - interactive shell

use std::env;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use litegate::executor::{ExecOutcome, QueryResult};
use litegate::gateway::{Gateway, GatewayConfig};
use litegate::sql::{describe_table, list_tables};
use litegate::value::Value;

/// Print welcome banner
fn print_banner(path: &str) {
    println!(
        r#"
litegate shell - serialized gateway to an embedded SQL database
Connected to: {}
Type '.help' for help, '.quit' to exit
"#,
        path
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help              Show this help message
  .quit              Exit the shell
  .tables            List all tables
  .schema <table>    Show the parsed schema of a table
  .mode table|json   Switch the output format
  .changes           Rows modified by the last statement

SQL ends with ';' and may span multiple lines:
  CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
  INSERT INTO users (name) VALUES ('Alice');
  SELECT * FROM users;
"#
    );
}

#[derive(Clone, Copy, PartialEq)]
enum OutputMode {
    Table,
    Json,
}

/// Format query results as an ASCII table
fn format_results(result: &QueryResult) -> String {
    if result.columns.is_empty() && result.rows.is_empty() {
        return String::new();
    }

    // Calculate column widths
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &result.rows {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(value.to_string().len());
            }
        }
    }

    let mut output = String::new();

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    output.push_str(&separator);
    let header: String = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    for row in &result.rows {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:>width$} ", v, width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", row_str));
    }

    if !result.rows.is_empty() {
        output.push_str(&separator);
    }
    output.push_str(&format!("{} row(s) returned\n", result.rows.len()));
    output
}

fn print_rows(result: &QueryResult, mode: OutputMode) {
    match mode {
        OutputMode::Table => print!("{}", format_results(result)),
        OutputMode::Json => match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("JSON error: {}", e),
        },
    }
    if let Some(err) = &result.interrupted {
        eprintln!("Query interrupted: {}", err);
    }
}

/// Execute SQL input against the gateway. The input may hold several
/// statements; each one gets its own output.
async fn execute_sql(sql: &str, gateway: &Gateway, mode: OutputMode) {
    let sql = sql.trim();
    if sql.is_empty() {
        return;
    }

    let outcomes = match gateway.exec_script(sql).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            eprintln!("Error: {}", e);
            return;
        }
    };
    for outcome in &outcomes {
        match outcome {
            Ok(ExecOutcome::Rows(result)) => print_rows(result, mode),
            Ok(ExecOutcome::Inserted(rowid)) => println!("Inserted row {}", rowid),
            Ok(ExecOutcome::Done { .. }) => match gateway.changes().await {
                // changes() reflects the script's last statement, so only
                // report it when there is exactly one.
                Ok(n) if n > 0 && outcomes.len() == 1 => {
                    println!("{} row(s) affected", n)
                }
                _ => println!("Ok"),
            },
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}

/// Handle special dot commands; returns false when the shell should exit
async fn handle_special_command(cmd: &str, gateway: &Gateway, mode: &mut OutputMode) -> bool {
    let parts: Vec<&str> = cmd.split_whitespace().collect();

    match parts.first().copied() {
        Some(".help") => print_help(),
        Some(".quit") | Some(".exit") => return false,
        Some(".tables") => match gateway.exec(list_tables()).await {
            Ok(ExecOutcome::Rows(result)) => {
                if result.rows.is_empty() {
                    println!("No tables found.");
                } else {
                    println!("Tables:");
                    for row in &result.rows {
                        if let Some(Value::Text(name)) = row.first() {
                            println!("  {}", name);
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => eprintln!("Error: {}", e),
        },
        Some(".schema") => {
            let Some(table) = parts.get(1) else {
                eprintln!("Usage: .schema <table>");
                return true;
            };
            match describe_table(gateway, table).await {
                Ok(Some(columns)) => {
                    for col in columns {
                        let mut line = format!("  {} {}", col.name, col.sql_type);
                        if col.primary_key {
                            line.push_str(" PRIMARY KEY");
                        }
                        if col.not_null {
                            line.push_str(" NOT NULL");
                        }
                        if col.unique {
                            line.push_str(" UNIQUE");
                        }
                        if let Some(default) = &col.default {
                            line.push_str(&format!(" DEFAULT {}", default.escape_literal()));
                        }
                        println!("{}", line);
                    }
                }
                Ok(None) => println!("Schema for '{}' is not parseable.", table),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
        Some(".mode") => match parts.get(1).copied() {
            Some("table") => *mode = OutputMode::Table,
            Some("json") => *mode = OutputMode::Json,
            _ => eprintln!("Usage: .mode table|json"),
        },
        Some(".changes") => match gateway.changes().await {
            Ok(n) => println!("{}", n),
            Err(e) => eprintln!("Error: {}", e),
        },
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Type '.help' for available commands.");
        }
        None => {}
    }
    true
}

/// Main REPL loop
async fn run_repl(gateway: Gateway, path: &str) -> Result<()> {
    print_banner(path);

    let mut editor = DefaultEditor::new()?;
    let mut mode = OutputMode::Table;
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "litegate> " } else { "    ...> " };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        };

        let trimmed = line.trim();
        if buffer.is_empty() && trimmed.starts_with('.') {
            editor.add_history_entry(trimmed)?;
            if !handle_special_command(trimmed, &gateway, &mut mode).await {
                break;
            }
            continue;
        }

        buffer.push_str(&line);
        buffer.push('\n');

        // Statements run once the input ends with a semicolon.
        if trimmed.ends_with(';') {
            let sql = buffer.trim().to_string();
            editor.add_history_entry(&sql)?;
            execute_sql(&sql, &gateway, mode).await;
            buffer.clear();
        }
    }

    gateway.close().await?;
    println!("Goodbye!");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let mut path = ":memory:".to_string();

    // Simple argument parsing
    for i in 1..args.len() {
        if args[i] == "--db" || args[i] == "-d" {
            if let Some(p) = args.get(i + 1) {
                path = p.clone();
            }
        }
    }

    let gateway = GatewayConfig::new().path(&path).open().await?;
    run_repl(gateway, &path).await
}
