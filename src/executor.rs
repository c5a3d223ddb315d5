//! Statement execution against the warehouse.
//!
//! Every call opens a fresh connection, runs exactly one statement, fetches
//! all rows and closes the connection again. The execution plan is obtained
//! the same way by prefixing the statement with `EXPLAIN`.
//!
//! Statements go through the simple query protocol, so every cell arrives
//! as text and can be shown without knowing its SQL type.

use serde::Serialize;
use sqlx::{
    Column, Connection, Executor, PgConnection, Row, Statement, ValueRef, postgres::PgRow
};

use crate::error::{AppResult, connection_error, execution_error, invalid_statement_error};

/// Column names plus rows of text cells; `None` is SQL `NULL`.
///
/// Column names are present even when no rows came back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows:    Vec<Vec<Option<String>>>
}

impl QueryResult {
    /// Whether the statement produced no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plan rows flattened to lines, as printed by `EXPLAIN`
    pub fn plan_lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_deref().unwrap_or("NULL"))
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect()
    }
}

/// Outcome of running a statement together with its plan.
///
/// The two halves fail independently.
#[derive(Debug)]
pub struct Execution {
    /// Statement actually sent to the database
    pub statement: String,
    pub result:    AppResult<QueryResult>,
    pub plan:      AppResult<QueryResult>
}

/// Runs statements against one warehouse URL.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    database_url: String
}

impl QueryExecutor {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into()
        }
    }

    /// Prepare and execute `sql`, returning all rows
    pub async fn run(&self, sql: &str) -> AppResult<QueryResult> {
        let statement = checked_statement(sql)?;
        execute_once(&self.database_url, &statement).await
    }

    /// Prepare `sql` and return the rows of `EXPLAIN <statement>`
    pub async fn explain(&self, sql: &str) -> AppResult<QueryResult> {
        let statement = checked_statement(sql)?;
        execute_once(&self.database_url, &format!("EXPLAIN {}", statement)).await
    }

    /// Run the statement and its plan, each on its own connection
    pub async fn run_with_plan(&self, sql: &str) -> Execution {
        let statement = prepare_statement(sql);
        let result = self.run(&statement).await;
        let plan = self.explain(&statement).await;
        Execution {
            statement,
            result,
            plan
        }
    }
}

/// Clean LLM output into a single executable statement.
///
/// Removes markdown code fences, drops `--` comment lines and any line
/// touching a `/* */` block, and keeps only the text before the first `;`.
/// Trailing statements are discarded silently apart from a log line.
///
/// ```
/// use text_to_sql::executor::prepare_statement;
///
/// assert_eq!(prepare_statement("SELECT 1; SELECT 2;"), "SELECT 1");
/// assert_eq!(prepare_statement("```sql\nSELECT 1\n```"), "SELECT 1");
/// ```
pub fn prepare_statement(sql: &str) -> String {
    let unfenced = sql.replace("```sql", "").replace("```", "");
    let filtered = unfenced
        .trim()
        .lines()
        .filter(|line| {
            !line.trim_start().starts_with("--") && !line.contains("/*") && !line.contains("*/")
        })
        .collect::<Vec<_>>()
        .join("\n");
    let mut parts = filtered.split(';');
    let first = parts.next().unwrap_or_default().trim().to_string();
    let discarded = parts.filter(|p| !p.trim().is_empty()).count();
    if discarded > 0 {
        tracing::warn!(
            "Executing only the first statement, discarding {} more",
            discarded
        );
    }
    first
}

fn checked_statement(sql: &str) -> AppResult<String> {
    let statement = prepare_statement(sql);
    if statement.is_empty() {
        tracing::error!("Error executing query: statement is empty");
        return Err(invalid_statement_error("statement is empty"));
    }
    Ok(statement)
}

/// Open a new connection to the warehouse
pub async fn connect(database_url: &str) -> AppResult<PgConnection> {
    PgConnection::connect(database_url).await.map_err(|e| {
        tracing::error!("Error connecting to database: {}", e);
        connection_error(e)
    })
}

async fn execute_once(database_url: &str, statement: &str) -> AppResult<QueryResult> {
    let mut conn = connect(database_url).await?;
    tracing::debug!(statement, "Executing statement");
    let fetched = sqlx::raw_sql(statement).fetch_all(&mut conn).await;
    let result = match fetched {
        Ok(rows) => {
            let mut result = collect_rows(&rows);
            if rows.is_empty() {
                result.columns = describe_columns(&mut conn, statement).await;
            }
            Ok(result)
        }
        Err(e) => {
            tracing::error!("Error executing query: {}", e);
            Err(execution_error(e))
        }
    };
    if let Err(e) = conn.close().await {
        tracing::debug!("Error closing connection: {}", e);
    }
    result
}

/// Column names of a statement that returned no rows
///
/// Statements that cannot be prepared (DDL, DML without `RETURNING`) have
/// no columns.
async fn describe_columns(conn: &mut PgConnection, statement: &str) -> Vec<String> {
    match (&mut *conn).prepare(statement).await {
        Ok(prepared) => prepared
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        Err(e) => {
            tracing::debug!("Could not describe statement: {}", e);
            Vec::new()
        }
    }
}

fn collect_rows(rows: &[PgRow]) -> QueryResult {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        })
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| text_cell(row, i)).collect())
        .collect();
    QueryResult {
        columns,
        rows
    }
}

fn text_cell(row: &PgRow, index: usize) -> Option<String> {
    match row.try_get_raw(index) {
        Ok(value) if value.is_null() => None,
        Ok(_) => row.try_get_unchecked::<String, _>(index).ok(),
        Err(_) => None
    }
}
