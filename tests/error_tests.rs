// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::io;

use text_to_sql::error::{
    cache_error, config_error, connection_error, execution_error, file_read_error,
    generation_error, invalid_statement_error, llm_api_error, serialization_error
};

#[test]
fn test_file_read_error() {
    let err = file_read_error("query.sql", io::Error::new(io::ErrorKind::NotFound, "missing"));
    let _msg = err.to_string();
}

#[test]
fn test_config_error() {
    let err = config_error("missing database url");
    let _msg = err.to_string();
}

#[test]
fn test_llm_api_error() {
    let err = llm_api_error("rate limited");
    let _msg = err.to_string();
}

#[test]
fn test_generation_error() {
    let err = generation_error("empty response");
    let _msg = err.to_string();
}

#[test]
fn test_database_errors() {
    let _msg = connection_error(sqlx::Error::PoolTimedOut).to_string();
    let _msg = execution_error(sqlx::Error::RowNotFound).to_string();
    let _msg = invalid_statement_error("statement is empty").to_string();
}

#[test]
fn test_cache_error() {
    let err = cache_error("dimension mismatch");
    let _msg = err.to_string();
}

#[test]
fn test_serialization_error() {
    let err = serialization_error("YAML", "unsupported value");
    let _msg = err.to_string();
}
