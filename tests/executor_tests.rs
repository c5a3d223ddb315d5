// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use text_to_sql::executor::{QueryExecutor, QueryResult, prepare_statement};

#[test]
fn test_prepare_keeps_first_statement() {
    assert_eq!(prepare_statement("SELECT 1; SELECT 2;"), "SELECT 1");
}

#[test]
fn test_prepare_strips_trailing_semicolon() {
    assert_eq!(prepare_statement("SELECT a FROM t;"), "SELECT a FROM t");
}

#[test]
fn test_prepare_strips_markdown_fences() {
    let raw = "```sql\nSELECT a\nFROM t\n```";
    assert_eq!(prepare_statement(raw), "SELECT a\nFROM t");
}

#[test]
fn test_prepare_strips_line_comments() {
    let raw = "-- total sales\nSELECT SUM(amount)\n  -- by nothing\nFROM sales";
    assert_eq!(prepare_statement(raw), "SELECT SUM(amount)\nFROM sales");
}

#[test]
fn test_prepare_drops_block_comment_lines() {
    let raw = "SELECT a /* the key */\nFROM t";
    assert_eq!(prepare_statement(raw), "FROM t");
}

#[test]
fn test_prepare_only_comments_is_empty() {
    assert_eq!(prepare_statement("-- nothing\n-- at all"), "");
}

#[test]
fn test_prepare_fenced_multi_statement() {
    let raw = "```sql\nSELECT 1;\nSELECT 2;\n```";
    assert_eq!(prepare_statement(raw), "SELECT 1");
}

#[test]
fn test_query_result_is_empty() {
    let result = QueryResult {
        columns: vec!["a".to_string()],
        rows:    Vec::new()
    };
    assert!(result.is_empty());
    assert!(QueryResult::default().is_empty());
}

#[test]
fn test_plan_lines_join_cells() {
    let result = QueryResult {
        columns: vec!["a".to_string(), "b".to_string()],
        rows:    vec![vec![Some("x".to_string()), None]]
    };
    assert_eq!(result.plan_lines(), vec!["x | NULL"]);
}

#[tokio::test]
async fn test_run_rejects_empty_statement_without_connecting() {
    let executor = QueryExecutor::new("postgres://nobody@127.0.0.1:1/none");
    assert!(executor.run("-- only a comment").await.is_err());
    assert!(executor.explain("```sql\n```").await.is_err());
}

#[tokio::test]
async fn test_run_with_plan_reports_prepared_statement() {
    let executor = QueryExecutor::new("postgres://nobody@127.0.0.1:1/none");
    let execution = executor.run_with_plan("SELECT 1; SELECT 2").await;
    assert_eq!(execution.statement, "SELECT 1");
    assert!(execution.result.is_err());
    assert!(execution.plan.is_err());
}
