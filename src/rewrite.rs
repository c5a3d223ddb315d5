//! Dialect rewriting of generated SQL.
//!
//! A fixed sequence of regex substitutions that adapts generic SQL to the
//! warehouse's idioms. No parsing takes place; statements the patterns do not
//! recognise pass through unchanged.
//!
//! # Rules
//!
//! | Order | Name | Effect |
//! |-------|------|--------|
//! | 1 | `date-trunc-year` | `STRFTIME("%Y", t.c)` becomes `DATE_TRUNC('YEAR', t.c)` |
//! | 2 | `uppercase-alias` | `AS alias` becomes `AS ALIAS` outside string literals |
//! | 3 | `strip-order-by` | Removes `ORDER BY col [ASC\|DESC] [NULLS FIRST\|LAST][, ...]` |
//! | 4 | `strip-limit-offset` | Removes `LIMIT n OFFSET m` |
//! | 5 | `order-by-group-key` | Orders grouped results by the first `GROUP BY` key |
//!
//! An appended `ORDER BY` goes before a trailing `LIMIT n`, `;` or closing code
//! fence. Rewriting is idempotent: a rewritten statement comes back unchanged.
//!
//! # Example
//!
//! ```
//! use text_to_sql::rewrite::rewrite;
//!
//! assert_eq!(
//!     rewrite("SELECT a FROM t AS x GROUP BY t.a"),
//!     "SELECT a FROM t AS X GROUP BY t.a\nORDER BY t.a"
//! );
//! ```

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `STRFTIME("%Y", table.column)` with either quote style.
static STRFTIME_YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bSTRFTIME\(\s*["']%Y["']\s*,\s*(\w+)\.(\w+)\s*\)"#).expect("valid regex")
});

/// Upper-case `AS` followed by a bare alias.
static ALIAS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bAS\s+\w+").expect("valid regex"));

/// Single-quoted string literal, `''` being an escaped quote.
static STRING_LITERAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:[^']|'')*'").expect("valid regex"));

static ORDER_BY_PRESENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bORDER\s+BY\b").expect("valid regex"));

/// `ORDER BY` over plain (optionally qualified) columns with directions and
/// null ordering, including the whitespace in front of it. The list must be
/// followed by the end of the statement, `;`, `)`, a closing code fence or a
/// clause that may follow `ORDER BY`; anything else (`SUM(x)`, `COLLATE`)
/// leaves the clause alone.
static ORDER_BY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \s*\bORDER\s+BY\s+
        [\w.]+ (?:\s+(?:ASC|DESC)\b)? (?:\s+NULLS\s+(?:FIRST|LAST)\b)?
        (?: \s*,\s* [\w.]+ (?:\s+(?:ASC|DESC)\b)? (?:\s+NULLS\s+(?:FIRST|LAST)\b)? )*
        (?P<tail>
            \s+(?:LIMIT|OFFSET|FETCH|FOR|UNION|INTERSECT|EXCEPT)\b
            | \s*(?:;|\)|```|$)
        )"
    )
    .expect("valid regex")
});

static LIMIT_PRESENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\b").expect("valid regex"));

static OFFSET_PRESENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOFFSET\b").expect("valid regex"));

static LIMIT_OFFSET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\bLIMIT\s+\d+\s+OFFSET\s+\d+\b").expect("valid regex")
});

/// First key of a `GROUP BY` list: a column or a single-level call.
static GROUP_BY_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bGROUP\s+BY\s+([\w.]+(?:\([^()]*\))?)").expect("valid regex")
});

/// Whitespace, semicolons and code fences closing the statement.
static STATEMENT_TAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s|;|```)*$").expect("valid regex"));

/// `LIMIT n` closing the statement; an appended `ORDER BY` goes before it.
static TRAILING_LIMIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\bLIMIT\s+\d+\s*$").expect("valid regex"));

/// Statement after rewriting plus the rules that changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub sql:     String,
    /// Names of the rules that modified the statement, in application order
    pub applied: Vec<&'static str>
}

/// Rewrite `sql` for the target dialect
pub fn rewrite(sql: &str) -> String {
    rewrite_with_report(sql).sql
}

/// Rewrite `sql` and report which rules fired
pub fn rewrite_with_report(sql: &str) -> Rewritten {
    let mut applied = Vec::new();
    let mut current = sql.to_string();

    let mut step = |name: &'static str, current: &mut String, next: String| {
        if next != *current {
            applied.push(name);
            *current = next;
        }
    };

    let next = replace_strftime_year(&current);
    step("date-trunc-year", &mut current, next);

    let next = uppercase_aliases(&current);
    step("uppercase-alias", &mut current, next);

    let next = strip_order_by(&current);
    step("strip-order-by", &mut current, next);

    let next = strip_limit_offset(&current);
    step("strip-limit-offset", &mut current, next);

    let next = order_by_group_key(&current);
    step("order-by-group-key", &mut current, next);

    if !applied.is_empty() {
        tracing::debug!(rules = ?applied, "Rewrote statement");
    }
    Rewritten {
        sql: current,
        applied
    }
}

fn replace_strftime_year(sql: &str) -> String {
    STRFTIME_YEAR_REGEX
        .replace_all(sql, "DATE_TRUNC('YEAR', $1.$2)")
        .into_owned()
}

fn uppercase_aliases(sql: &str) -> String {
    outside_literals(sql, |code| {
        ALIAS_REGEX
            .replace_all(code, |caps: &Captures| caps[0].to_uppercase())
            .into_owned()
    })
}

/// Apply `f` to every stretch of `sql` outside single-quoted literals
fn outside_literals(sql: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for literal in STRING_LITERAL_REGEX.find_iter(sql) {
        out.push_str(&f(&sql[last..literal.start()]));
        out.push_str(literal.as_str());
        last = literal.end();
    }
    out.push_str(&f(&sql[last..]));
    out
}

fn strip_order_by(sql: &str) -> String {
    if !ORDER_BY_PRESENT_REGEX.is_match(sql) {
        return sql.to_string();
    }
    ORDER_BY_REGEX.replace_all(sql, "${tail}").into_owned()
}

fn strip_limit_offset(sql: &str) -> String {
    if !(LIMIT_PRESENT_REGEX.is_match(sql) && OFFSET_PRESENT_REGEX.is_match(sql)) {
        return sql.to_string();
    }
    LIMIT_OFFSET_REGEX.replace_all(sql, "").into_owned()
}

fn order_by_group_key(sql: &str) -> String {
    if ORDER_BY_PRESENT_REGEX.is_match(sql) {
        return sql.to_string();
    }
    let Some(key) = GROUP_BY_KEY_REGEX
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return sql.to_string();
    };
    let tail_start = STATEMENT_TAIL_REGEX
        .find(sql)
        .map_or(sql.len(), |tail| tail.start());
    let (body, tail) = sql.split_at(tail_start);
    match TRAILING_LIMIT_REGEX.find(body) {
        Some(limit) => format!(
            "{}\nORDER BY {} {}{}",
            body[..limit.start()].trim_end(),
            key,
            limit.as_str().trim(),
            tail
        ),
        None => format!("{}\nORDER BY {}{}", body, key, tail)
    }
}
