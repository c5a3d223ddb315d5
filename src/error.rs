pub use masterror::{AppError, AppResult};

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create LLM API error
pub fn llm_api_error(message: impl Into<String>) -> AppError {
    AppError::service(message.into())
}

/// Create SQL generation error (missing key, empty response)
pub fn generation_error(message: impl Into<String>) -> AppError {
    AppError::service(format!("SQL generation failed: {}", message.into()))
}

/// Create database connection error
pub fn connection_error(err: sqlx::Error) -> AppError {
    AppError::service(format!("Database connection failed: {}", describe_sqlx(&err)))
}

/// Create statement execution error
pub fn execution_error(err: sqlx::Error) -> AppError {
    AppError::service(format!("Query execution failed: {}", describe_sqlx(&err)))
}

/// Create execution error for a statement rejected before reaching the
/// database
pub fn invalid_statement_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(format!("Query execution failed: {}", message.into()))
}

/// Create cache operation error
pub fn cache_error(message: impl Into<String>) -> AppError {
    AppError::internal(format!("Cache operation failed: {}", message.into()))
}

/// Create output serialization error
pub fn serialization_error(format: &str, err: impl std::fmt::Display) -> AppError {
    AppError::internal(format!("Failed to serialize {} output: {}", format, err))
}

/// Create HTTP error
pub fn http_error(err: reqwest::Error) -> AppError {
    let msg = if err.is_timeout() {
        format!("Request timeout: {}", err)
    } else if err.is_connect() {
        format!("Connection failed: {}", err)
    } else if err.is_status() {
        format!("HTTP error {}: {}", err.status().unwrap_or_default(), err)
    } else {
        err.to_string()
    };
    AppError::service(msg)
}

/// Render a driver error, preferring the server-side message when the
/// database reported one
fn describe_sqlx(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => format!("{} (SQLSTATE {})", db.message(), code),
            None => db.message().to_string()
        },
        sqlx::Error::PoolTimedOut => String::from("timed out waiting for a connection"),
        other => other.to_string()
    }
}
