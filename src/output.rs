use colored::Colorize;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::{
    app::Answer,
    error::{AppResult, serialization_error},
    executor::QueryResult,
    schema::SchemaCatalog
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

fn heading(title: &str, opts: &OutputOptions) -> String {
    if opts.colored {
        format!("{}\n", title.bold())
    } else {
        format!("{}\n", title)
    }
}

/// Serialize `value` as pretty JSON
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| serialization_error("JSON", e))
}

/// Serialize `value` as YAML
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> AppResult<String> {
    serde_yaml::to_string(value).map_err(|e| serialization_error("YAML", e))
}

/// Format the full outcome of one question
pub fn format_answer(answer: &Answer, opts: &OutputOptions) -> AppResult<String> {
    match opts.format {
        OutputFormat::Json => to_json(answer),
        OutputFormat::Yaml => to_yaml(answer),
        OutputFormat::Text => Ok(format_answer_text(answer, opts))
    }
}

fn format_answer_text(answer: &Answer, opts: &OutputOptions) -> String {
    let mut out = String::new();
    let draft = &answer.draft;

    out.push_str(&heading("Generated SQL Query:", opts));
    if let Some(hit) = &draft.cache_hit {
        let note = format!(
            "(from cache: \"{}\", distance {:.4})",
            hit.question, hit.distance
        );
        if opts.colored {
            out.push_str(&format!("{}\n", note.dimmed()));
        } else {
            out.push_str(&format!("{}\n", note));
        }
    }
    out.push_str(&format!("{}\n\n", draft.generated_sql.trim()));

    out.push_str(&heading("Optimized SQL Query:", opts));
    out.push_str(&format!("{}\n", draft.optimized_sql.trim()));
    if opts.verbose && !draft.applied_rules.is_empty() {
        out.push_str(&format!("Rewrite rules: {}\n", draft.applied_rules.join(", ")));
    }

    if let Some(statement) = &answer.executed_sql {
        out.push('\n');
        out.push_str(&heading("Executing SQL Query:", opts));
        out.push_str(&format!("{}\n", statement));
    }
    if let Some(result) = &answer.result {
        out.push('\n');
        out.push_str(&heading("Query Results:", opts));
        out.push_str(&format_table(result, opts));
    }
    if let Some(plan) = &answer.plan {
        out.push('\n');
        out.push_str(&heading("Query Plan:", opts));
        out.push_str(&format_plan(plan));
    }
    if !answer.errors.is_empty() {
        out.push('\n');
        for err in &answer.errors {
            if opts.colored {
                out.push_str(&format!("{} {}\n", "error:".red().bold(), err));
            } else {
                out.push_str(&format!("error: {}\n", err));
            }
        }
    }
    out
}

/// Format a query result as a text table, JSON or YAML
pub fn format_result(result: &QueryResult, opts: &OutputOptions) -> AppResult<String> {
    match opts.format {
        OutputFormat::Json => to_json(result),
        OutputFormat::Yaml => to_yaml(result),
        OutputFormat::Text => Ok(format_table(result, opts))
    }
}

/// Render rows as a psql-style text table followed by the row count
///
/// A result without columns renders as a single notice line.
pub fn format_table(result: &QueryResult, opts: &OutputOptions) -> String {
    if result.columns.is_empty() && result.is_empty() {
        return String::from("No results returned.\n");
    }
    let width = result
        .rows
        .iter()
        .map(Vec::len)
        .fold(result.columns.len(), usize::max);
    let mut header = unique_columns(&result.columns);
    header.resize(width, String::new());

    let mut records = Vec::with_capacity(result.rows.len() + 1);
    records.push(header);
    for row in &result.rows {
        let mut cells: Vec<String> = row
            .iter()
            .map(|cell| cell.as_deref().unwrap_or("NULL").to_string())
            .collect();
        cells.resize(width, String::from("NULL"));
        records.push(cells);
    }
    let table = Builder::from(records)
        .build()
        .with(Style::psql())
        .to_string();

    let mut out = String::new();
    let mut lines = table.lines();
    if let Some(head) = lines.next() {
        if opts.colored {
            out.push_str(&head.cyan().bold().to_string());
        } else {
            out.push_str(head);
        }
        out.push('\n');
    }
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    let count = result.rows.len();
    out.push_str(&format!(
        "({} row{})\n",
        count,
        if count == 1 { "" } else { "s" }
    ));
    out
}

/// Render plan rows one per line
pub fn format_plan(plan: &QueryResult) -> String {
    if plan.is_empty() {
        return String::from("No plan returned.\n");
    }
    let mut out = plan.plan_lines().join("\n");
    out.push('\n');
    out
}

/// Format the schema catalog
pub fn format_schema(catalog: &SchemaCatalog, opts: &OutputOptions) -> AppResult<String> {
    match opts.format {
        OutputFormat::Json => to_json(catalog),
        OutputFormat::Yaml => to_yaml(catalog),
        OutputFormat::Text => {
            if catalog.is_empty() {
                return Ok(String::from("No tables found.\n"));
            }
            let mut out = heading("Schema Information:", opts);
            out.push_str(&catalog.to_summary());
            Ok(out)
        }
    }
}

/// Format a list of column names for one table
pub fn format_columns(table: &str, columns: &[String], opts: &OutputOptions) -> AppResult<String> {
    match opts.format {
        OutputFormat::Json => to_json(columns),
        OutputFormat::Yaml => to_yaml(columns),
        OutputFormat::Text => {
            if columns.is_empty() {
                return Ok(format!("No columns found for table: {}\n", table));
            }
            Ok(format!("Columns for table {}: {}\n", table, columns.join(", ")))
        }
    }
}

/// Disambiguate repeated column names with a `_dup` suffix
///
/// ```
/// use text_to_sql::output::unique_columns;
///
/// let cols = vec!["id".to_string(), "id".to_string(), "name".to_string()];
/// assert_eq!(unique_columns(&cols), vec!["id", "id_dup", "name"]);
/// ```
pub fn unique_columns(columns: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(columns.len());
    for col in columns {
        let mut candidate = col.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = if n == 1 {
                format!("{}_dup", col)
            } else {
                format!("{}_dup{}", col, n)
            };
            n += 1;
        }
        seen.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}
