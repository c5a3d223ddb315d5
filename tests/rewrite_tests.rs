// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use text_to_sql::{
    executor::prepare_statement,
    rewrite::{rewrite, rewrite_with_report}
};

#[test]
fn test_group_by_gets_order_by_on_group_key() {
    assert_eq!(
        rewrite("SELECT a FROM t AS x GROUP BY t.a"),
        "SELECT a FROM t AS X GROUP BY t.a\nORDER BY t.a"
    );
}

#[test]
fn test_order_by_uses_group_key_not_first_qualified_column() {
    let sql = "SELECT o.region, SUM(o.amount) FROM orders o GROUP BY o.region";
    assert_eq!(
        rewrite(sql),
        "SELECT o.region, SUM(o.amount) FROM orders o GROUP BY o.region\nORDER BY o.region"
    );
}

#[test]
fn test_strftime_year_becomes_date_trunc() {
    let sql = r#"SELECT STRFTIME("%Y", o.created_at) FROM orders o"#;
    assert_eq!(
        rewrite(sql),
        "SELECT DATE_TRUNC('YEAR', o.created_at) FROM orders o"
    );
}

#[test]
fn test_strftime_single_quotes() {
    let sql = "SELECT strftime('%Y', o.created_at) FROM orders o";
    assert_eq!(
        rewrite(sql),
        "SELECT DATE_TRUNC('YEAR', o.created_at) FROM orders o"
    );
}

#[test]
fn test_strftime_other_formats_untouched() {
    let sql = r#"SELECT STRFTIME("%m", o.created_at) FROM orders o"#;
    assert_eq!(rewrite(sql), sql);
}

#[test]
fn test_aliases_uppercased() {
    assert_eq!(
        rewrite("SELECT SUM(amount) AS total, region AS r FROM sales"),
        "SELECT SUM(amount) AS TOTAL, region AS R FROM sales"
    );
}

#[test]
fn test_alias_rule_ignores_words_ending_in_as() {
    let sql = "SELECT alias, has FROM t";
    assert_eq!(rewrite(sql), sql);
}

#[test]
fn test_order_by_removed() {
    assert_eq!(
        rewrite("SELECT name FROM users ORDER BY name DESC"),
        "SELECT name FROM users"
    );
}

#[test]
fn test_limit_offset_removed() {
    assert_eq!(
        rewrite("SELECT name FROM users LIMIT 10 OFFSET 20"),
        "SELECT name FROM users"
    );
}

#[test]
fn test_limit_alone_kept() {
    assert_eq!(
        rewrite("SELECT name FROM users LIMIT 10"),
        "SELECT name FROM users LIMIT 10"
    );
}

#[test]
fn test_order_by_replaced_for_grouped_query() {
    let sql = "SELECT region, COUNT(*) AS n FROM sales GROUP BY region ORDER BY n DESC";
    assert_eq!(
        rewrite(sql),
        "SELECT region, COUNT(*) AS N FROM sales GROUP BY region\nORDER BY region"
    );
}

#[test]
fn test_order_by_inserted_before_trailing_limit() {
    let sql = "SELECT region, COUNT(*) FROM sales GROUP BY region LIMIT 5";
    assert_eq!(
        rewrite(sql),
        "SELECT region, COUNT(*) FROM sales GROUP BY region\nORDER BY region LIMIT 5"
    );
}

#[test]
fn test_order_by_inserted_before_semicolon() {
    let rewritten = rewrite("SELECT region, COUNT(*) FROM sales GROUP BY region;");
    assert_eq!(
        rewritten,
        "SELECT region, COUNT(*) FROM sales GROUP BY region\nORDER BY region;"
    );
    assert_eq!(
        prepare_statement(&rewritten),
        "SELECT region, COUNT(*) FROM sales GROUP BY region\nORDER BY region"
    );
}

#[test]
fn test_order_by_inserted_inside_code_fence() {
    let raw = "```sql\nSELECT region, COUNT(*) FROM sales GROUP BY region LIMIT 5;\n```";
    let rewritten = rewrite(raw);
    assert_eq!(
        rewritten,
        "```sql\nSELECT region, COUNT(*) FROM sales GROUP BY region\nORDER BY region LIMIT 5;\n```"
    );
    let executed = prepare_statement(&rewritten);
    assert!(executed.contains("ORDER BY region"));
    assert!(executed.ends_with("LIMIT 5"));
}

#[test]
fn test_order_by_with_nulls_ordering_removed_whole() {
    assert_eq!(
        rewrite("SELECT a FROM t ORDER BY a DESC NULLS LAST"),
        "SELECT a FROM t"
    );
}

#[test]
fn test_order_by_before_closing_fence_removed() {
    assert_eq!(
        rewrite("```sql\nSELECT a FROM t ORDER BY a\n```"),
        "```sql\nSELECT a FROM t\n```"
    );
}

#[test]
fn test_alias_rule_skips_string_literals() {
    assert_eq!(
        rewrite("SELECT name AS n FROM t WHERE note = 'known AS bob'"),
        "SELECT name AS N FROM t WHERE note = 'known AS bob'"
    );
}

#[test]
fn test_alias_rule_is_case_sensitive() {
    let sql = "SELECT name as n FROM t WHERE note = 'known as bob'";
    assert_eq!(rewrite(sql), sql);
}

#[test]
fn test_expression_order_by_kept_and_not_duplicated() {
    let sql = "SELECT region FROM sales GROUP BY region ORDER BY SUM(amount) DESC";
    assert_eq!(rewrite(sql), sql);
}

#[test]
fn test_lowercase_keywords() {
    assert_eq!(
        rewrite("select a from t group by t.a order by t.a"),
        "select a from t group by t.a\nORDER BY t.a"
    );
}

#[test]
fn test_rewrite_is_idempotent() {
    let samples = [
        "SELECT a FROM t AS x GROUP BY t.a",
        "SELECT region, COUNT(*) FROM sales GROUP BY region LIMIT 5",
        "SELECT name FROM users ORDER BY name LIMIT 10 OFFSET 20",
        r#"SELECT STRFTIME("%Y", o.ts) AS yr, COUNT(*) FROM orders o GROUP BY STRFTIME("%Y", o.ts)"#,
        "SELECT 1",
        "SELECT a FROM t GROUP BY a\n",
        "SELECT region, COUNT(*) FROM sales GROUP BY region;",
        "```sql\nSELECT region, COUNT(*) FROM sales GROUP BY region ORDER BY region LIMIT 5;\n```",
        "SELECT a FROM t ORDER BY a DESC NULLS LAST"
    ];
    for sql in samples {
        let once = rewrite(sql);
        let twice = rewrite(&once);
        assert_eq!(once, twice, "not idempotent for {:?}", sql);
    }
}

#[test]
fn test_report_empty_when_nothing_changes() {
    let report = rewrite_with_report("SELECT 1");
    assert_eq!(report.sql, "SELECT 1");
    assert!(report.applied.is_empty());
}

#[test]
fn test_report_rule_order() {
    let report = rewrite_with_report(
        r#"SELECT STRFTIME("%Y", o.ts) AS y FROM orders o GROUP BY o.ts LIMIT 1 OFFSET 2"#
    );
    assert_eq!(
        report.applied,
        vec![
            "date-trunc-year",
            "uppercase-alias",
            "strip-limit-offset",
            "order-by-group-key"
        ]
    );
}
