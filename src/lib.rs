//! # Text-to-SQL Library
//!
//! Natural-language questions to SQL, with a semantic cache, dialect
//! rewriting and warehouse execution.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod executor;
pub mod generator;
pub mod llm;
pub mod output;
pub mod rewrite;
pub mod schema;
