//! Warehouse schema catalog.
//!
//! Reads table and column metadata from `INFORMATION_SCHEMA.COLUMNS` into a
//! typed snapshot used to build LLM prompts. The catalog is fetched fresh for
//! each request and never cached.
//!
//! # Example
//!
//! ```
//! use text_to_sql::schema::SchemaCatalog;
//!
//! let catalog = SchemaCatalog::from_rows(vec![
//!     ("orders".to_string(), "id".to_string(), "integer".to_string()),
//!     ("orders".to_string(), "total".to_string(), "numeric".to_string()),
//!     ("users".to_string(), "email".to_string(), "text".to_string()),
//! ]);
//!
//! let orders = catalog.tables.get("orders").unwrap();
//! assert_eq!(orders.columns.len(), 2);
//! assert_eq!(catalog.to_prompt(), "Table: orders, Columns: id, total\nTable: users, Columns: email");
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use sqlx::Connection;

use crate::{
    error::{AppResult, execution_error},
    executor::connect
};

const SCHEMA_QUERY: &str = "SELECT table_name::text, column_name::text, data_type::text \
                            FROM information_schema.columns \
                            WHERE table_schema = $1 \
                            ORDER BY table_name, ordinal_position";

const TABLE_COLUMNS_QUERY: &str = "SELECT column_name::text \
                                   FROM information_schema.columns \
                                   WHERE lower(table_name) = lower($1) AND table_schema = $2 \
                                   ORDER BY ordinal_position";

/// Column name and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column name
    pub name:      String,
    /// Declared SQL type as reported by the catalog
    pub data_type: String
}

/// One table and its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    /// Table name
    pub name:    String,
    /// Ordered list of columns
    pub columns: Vec<ColumnInfo>
}

/// Snapshot of every table in one warehouse schema.
///
/// Tables keep the order in which the catalog returned them.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaCatalog {
    /// Map of table name to table information
    pub tables: IndexMap<String, TableInfo>
}

impl SchemaCatalog {
    /// Build a catalog from `(table, column, type)` rows
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String)>
    {
        let mut catalog = Self::default();
        for (table, column, data_type) in rows {
            catalog
                .tables
                .entry(table.clone())
                .or_insert_with(|| TableInfo {
                    name:    table,
                    columns: Vec::new()
                })
                .columns
                .push(ColumnInfo {
                    name: column,
                    data_type
                });
        }
        catalog
    }

    /// Read the catalog of `schema` from the warehouse
    ///
    /// # Errors
    ///
    /// Returns error if the connection or the catalog query fails
    pub async fn fetch(database_url: &str, schema: &str) -> AppResult<Self> {
        let mut conn = connect(database_url).await?;
        let rows = sqlx::query_as::<_, (String, String, String)>(SCHEMA_QUERY)
            .bind(schema)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!("Error fetching schema information: {}", e);
                execution_error(e)
            })?;
        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing catalog connection: {}", e);
        }
        let catalog = Self::from_rows(rows);
        if catalog.is_empty() {
            tracing::warn!("No tables found in schema '{}'", schema);
        }
        Ok(catalog)
    }

    /// Whether the catalog holds no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total number of columns across all tables
    pub fn column_count(&self) -> usize {
        self.tables.values().map(|t| t.columns.len()).sum()
    }

    /// Compact one-line-per-table rendering embedded in the LLM prompt
    pub fn to_prompt(&self) -> String {
        self.tables
            .values()
            .map(|table| {
                let columns: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
                format!("Table: {}, Columns: {}", table.name, columns.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Human-readable summary with column types
    pub fn to_summary(&self) -> String {
        let mut summary = String::new();
        for table in self.tables.values() {
            summary.push_str(&format!("Table: {}\n", table.name));
            for col in &table.columns {
                summary.push_str(&format!(
                    "  Column: {}, Data Type: {}\n",
                    col.name, col.data_type
                ));
            }
        }
        summary
    }
}

/// List the column names of a single table in declaration order
///
/// Table names are matched case-insensitively within `schema`. An unknown
/// table yields an empty list and a warning.
pub async fn fetch_table_columns(
    database_url: &str,
    schema: &str,
    table: &str
) -> AppResult<Vec<String>> {
    let mut conn = connect(database_url).await?;
    let columns = sqlx::query_scalar::<_, String>(TABLE_COLUMNS_QUERY)
        .bind(table)
        .bind(schema)
        .fetch_all(&mut conn)
        .await
        .map_err(|e| {
            tracing::error!("Error fetching columns for table {}: {}", table, e);
            execution_error(e)
        })?;
    if let Err(e) = conn.close().await {
        tracing::debug!("Error closing catalog connection: {}", e);
    }
    if columns.is_empty() {
        tracing::warn!("No columns found for table: {}", table);
    }
    Ok(columns)
}
