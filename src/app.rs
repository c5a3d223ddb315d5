//! Application logic for the text-to-sql CLI.
//!
//! This module contains the question pipeline and the command handlers,
//! separated from the main entry point to enable testing.
//!
//! A question flows through: cache lookup, then on a miss schema read,
//! generation and cache store, then dialect rewrite and (optionally)
//! execution with `EXPLAIN`. Failures after generation are collected on the
//! [`Answer`] instead of aborting the session.

use std::{
    io::{self, BufRead, Read, Write},
    time::Duration
};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::{
    cache::SemanticCache,
    cli::{ConnectionArgs, Format, Provider},
    config::{Config, Requirement},
    embedding::{Embedder, FastEmbedder},
    error::{AppResult, config_error, file_read_error},
    executor::{QueryExecutor, QueryResult},
    generator::SqlGenerator,
    llm::{LlmClient, LlmProvider},
    output::{
        OutputFormat, OutputOptions, format_answer, format_columns, format_plan, format_result,
        format_schema, to_yaml
    },
    rewrite::rewrite_with_report,
    schema::{SchemaCatalog, fetch_table_columns}
};

/// Where a cached statement came from.
#[derive(Debug, Clone, Serialize)]
pub struct CacheHitInfo {
    /// Previously asked question that matched
    pub question: String,
    pub distance: f32
}

/// SQL prepared for a question, before execution.
#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub question:      String,
    /// Set when the SQL was reused from the semantic cache
    pub cache_hit:     Option<CacheHitInfo>,
    /// Raw model output (or cached copy of it)
    pub generated_sql: String,
    /// Statement after dialect rewriting
    pub optimized_sql: String,
    pub applied_rules: Vec<&'static str>
}

/// Everything produced for one question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    #[serde(flatten)]
    pub draft:        Draft,
    /// Statement actually sent to the warehouse
    pub executed_sql: Option<String>,
    pub result:       Option<QueryResult>,
    pub plan:         Option<QueryResult>,
    /// Execution and plan failures, already logged
    pub errors:       Vec<String>
}

/// Resolved settings for a question session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub database_url: Option<String>,
    pub db_schema:    String,
    pub threshold:    f32
}

/// Question pipeline owning the semantic cache for one session.
pub struct Assistant<E> {
    generator: SqlGenerator,
    cache:     Option<SemanticCache<E>>,
    executor:  Option<QueryExecutor>,
    settings:  SessionSettings
}

impl<E: Embedder> Assistant<E> {
    /// Create a pipeline; a `None` cache disables reuse of earlier answers
    pub fn new(
        generator: SqlGenerator,
        cache: Option<SemanticCache<E>>,
        settings: SessionSettings
    ) -> Self {
        let executor = settings.database_url.as_deref().map(QueryExecutor::new);
        Self {
            generator,
            cache,
            executor,
            settings
        }
    }

    pub fn cache(&self) -> Option<&SemanticCache<E>> {
        self.cache.as_ref()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Read the catalog, falling back to an empty one on failure
    pub async fn load_schema(&self) -> SchemaCatalog {
        let Some(url) = self.settings.database_url.as_deref() else {
            tracing::warn!("No database configured, generating SQL without schema information");
            return SchemaCatalog::default();
        };
        match SchemaCatalog::fetch(url, &self.settings.db_schema).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!("Failed to fetch schema information: {}", e);
                SchemaCatalog::default()
            }
        }
    }

    /// Produce SQL for `question` from the cache or the model
    pub async fn draft(&mut self, question: &str) -> AppResult<Draft> {
        let hit = self
            .cache
            .as_ref()
            .and_then(|cache| cache.retrieve(question, self.settings.threshold));

        let (generated_sql, cache_hit) = match hit {
            Some(hit) => {
                tracing::info!("Reusing SQL cached for '{}'", hit.question);
                (
                    hit.sql,
                    Some(CacheHitInfo {
                        question: hit.question,
                        distance: hit.distance
                    })
                )
            }
            None => {
                let schema = self.load_schema().await;
                let sql = self.generator.generate(question, &schema).await?;
                if let Some(cache) = self.cache.as_mut() {
                    cache.store(question, &sql);
                }
                (sql, None)
            }
        };

        let rewritten = rewrite_with_report(&generated_sql);
        Ok(Draft {
            question: question.to_string(),
            cache_hit,
            generated_sql,
            optimized_sql: rewritten.sql,
            applied_rules: rewritten.applied
        })
    }

    /// Draft SQL and, when `execute` is set, run it with its plan
    ///
    /// Only generation failures are returned as errors; execution failures
    /// are recorded on the answer.
    pub async fn answer(&mut self, question: &str, execute: bool) -> AppResult<Answer> {
        let draft = self.draft(question).await?;
        let mut answer = Answer {
            draft,
            executed_sql: None,
            result: None,
            plan: None,
            errors: Vec::new()
        };
        if !execute {
            return Ok(answer);
        }
        let Some(executor) = &self.executor else {
            answer
                .errors
                .push(String::from("No database configured; query was not executed"));
            return Ok(answer);
        };
        let execution = executor.run_with_plan(&answer.draft.optimized_sql).await;
        answer.executed_sql = Some(execution.statement);
        match execution.result {
            Ok(result) => answer.result = Some(result),
            Err(e) => answer.errors.push(e.to_string())
        }
        match execution.plan {
            Ok(plan) => answer.plan = Some(plan),
            Err(e) => answer.errors.push(format!("EXPLAIN: {}", e))
        }
        Ok(answer)
    }
}

/// Convert CLI format to internal OutputFormat
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}

/// Create output options from parameters
pub fn create_output_options(format: Format, no_color: bool, verbose: bool) -> OutputOptions {
    OutputOptions {
        format: convert_format(format),
        colored: !no_color,
        verbose
    }
}

/// Read SQL from the argument or stdin when it is "-"
pub fn read_sql_input(arg: &str) -> AppResult<String> {
    if arg == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| file_read_error("stdin", e))?;
        Ok(buffer)
    } else {
        Ok(arg.to_string())
    }
}

/// Pick the provider from the command line, then configuration, then Gemini
pub fn resolve_provider(cli: Option<Provider>, config_provider: Option<&str>) -> AppResult<Provider> {
    if let Some(provider) = cli {
        return Ok(provider);
    }
    match config_provider {
        Some(name) => Provider::from_name(name)
            .ok_or_else(|| config_error(format!("Unknown LLM provider '{}'", name))),
        None => Ok(Provider::Gemini)
    }
}

/// Get effective model name
pub fn get_effective_model(
    model: Option<String>,
    config_model: Option<String>,
    provider: &Provider
) -> String {
    model
        .or(config_model)
        .unwrap_or_else(|| provider.default_model().to_string())
}

/// Build LLM provider from parameters
pub fn build_llm_provider(
    provider: Provider,
    api_key: Option<String>,
    model: String,
    ollama_url: String
) -> AppResult<LlmProvider> {
    let key = || {
        api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                config_error(format!(
                    "API key required for {:?} (use --api-key, LLM_API_KEY or GEMINI_API_KEY)",
                    provider
                ))
            })
    };
    match provider {
        Provider::Gemini => Ok(LlmProvider::Gemini {
            api_key: key()?,
            model
        }),
        Provider::OpenAI => Ok(LlmProvider::OpenAI {
            api_key: key()?,
            model
        }),
        Provider::Anthropic => Ok(LlmProvider::Anthropic {
            api_key: key()?,
            model
        }),
        Provider::Ollama => Ok(LlmProvider::Ollama {
            base_url: ollama_url,
            model
        })
    }
}

/// Merge command-line connection options into the loaded configuration
pub fn apply_connection_args(config: &mut Config, args: &ConnectionArgs) {
    if let Some(url) = &args.database_url {
        config.database.url = Some(url.clone());
    }
    if let Some(schema) = &args.db_schema {
        config.database.schema = schema.clone();
    }
    if let Some(key) = &args.api_key {
        config.llm.api_key = Some(key.clone());
    }
    if let Some(model) = &args.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(url) = &args.ollama_url {
        config.llm.ollama_url = Some(url.clone());
    }
    if let Some(threshold) = args.threshold {
        config.cache.threshold = threshold;
    }
}

/// Validate configuration and build the LLM side of a session
pub fn build_generator(
    provider: Provider,
    config: &Config,
    require_database: bool
) -> AppResult<SqlGenerator> {
    let mut required = Vec::new();
    if require_database {
        required.push(Requirement::DatabaseUrl);
    }
    if provider.needs_api_key() {
        required.push(Requirement::ApiKey);
    }
    config.validate_for(&required)?;

    let model = get_effective_model(None, config.llm.model.clone(), &provider);
    let ollama_url = config
        .llm
        .ollama_url
        .clone()
        .unwrap_or_else(|| String::from("http://localhost:11434"));
    let llm_provider = build_llm_provider(provider, config.llm.api_key.clone(), model, ollama_url)?;
    Ok(SqlGenerator::new(LlmClient::with_retry_config(
        llm_provider,
        config.retry.clone()
    )))
}

fn session_settings(config: &Config) -> SessionSettings {
    SessionSettings {
        database_url: config.database.url.clone(),
        db_schema:    config.database.schema.clone(),
        threshold:    config.cache.threshold
    }
}

fn build_assistant(
    args: &ConnectionArgs,
    mut config: Config,
    require_database: bool
) -> AppResult<Assistant<FastEmbedder>> {
    apply_connection_args(&mut config, args);
    if !config.cache.threshold.is_finite() || config.cache.threshold < 0.0 {
        return Err(config_error("--threshold must be a non-negative finite number"));
    }
    let provider = resolve_provider(args.provider, config.llm.provider.as_deref())?;
    let generator = build_generator(provider, &config, require_database)?;
    let cache = match FastEmbedder::new() {
        Ok(embedder) => Some(SemanticCache::new(embedder, config.cache.max_entries)),
        Err(e) => {
            tracing::warn!("Semantic cache disabled: {}", e);
            None
        }
    };
    Ok(Assistant::new(generator, cache, session_settings(&config)))
}

fn spinner(opts: &OutputOptions, message: &'static str) -> Option<ProgressBar> {
    if opts.format != OutputFormat::Text {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

async fn answer_with_progress<E: Embedder>(
    assistant: &mut Assistant<E>,
    question: &str,
    execute: bool,
    opts: &OutputOptions
) -> AppResult<Answer> {
    let pb = spinner(opts, "Generating SQL...");
    let answer = assistant.answer(question, execute).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    answer
}

/// Exit code for an answer: 1 when execution reported errors
pub fn answer_exit_code(answer: &Answer) -> i32 {
    if answer.errors.is_empty() { 0 } else { 1 }
}

/// Run the ask command
pub async fn run_ask(
    question: &str,
    execute: bool,
    args: &ConnectionArgs,
    config: Config,
    opts: &OutputOptions
) -> AppResult<i32> {
    let mut assistant = build_assistant(args, config, execute)?;
    let answer = answer_with_progress(&mut assistant, question, execute, opts).await?;
    println!("{}", format_answer(&answer, opts)?);
    Ok(answer_exit_code(&answer))
}

/// Run the generate command
pub async fn run_generate(
    question: &str,
    args: &ConnectionArgs,
    config: Config,
    opts: &OutputOptions
) -> AppResult<i32> {
    run_ask(question, false, args, config, opts).await
}

/// Run the interactive shell until end of input or `exit`
pub async fn run_shell(
    execute: bool,
    args: &ConnectionArgs,
    config: Config,
    opts: &OutputOptions
) -> AppResult<i32> {
    let mut assistant = build_assistant(args, config, execute)?;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("question> ");
        io::stdout().flush().map_err(|e| file_read_error("stdout", e))?;
        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.map_err(|e| file_read_error("stdin", e))?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit" | "\\q") {
            break;
        }
        let rendered = answer_with_progress(&mut assistant, question, execute, opts)
            .await
            .and_then(|answer| format_answer(&answer, opts));
        match rendered {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: {}", e)
        }
    }
    if let Some(cache) = assistant.cache() {
        tracing::info!("Session ended with {} cached question(s)", cache.len());
    }
    Ok(0)
}

/// Run the rewrite command
pub fn run_rewrite(sql: &str, opts: &OutputOptions) -> AppResult<i32> {
    let input = read_sql_input(sql)?;
    let rewritten = rewrite_with_report(input.trim());
    match opts.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "sql": rewritten.sql, "applied_rules": rewritten.applied })
            );
        }
        OutputFormat::Yaml => {
            #[derive(Serialize)]
            struct Report<'a> {
                sql:           &'a str,
                applied_rules: &'a [&'static str]
            }
            let report = Report {
                sql:           &rewritten.sql,
                applied_rules: &rewritten.applied
            };
            print!("{}", to_yaml(&report)?);
        }
        OutputFormat::Text => {
            println!("{}", rewritten.sql);
            if opts.verbose && !rewritten.applied.is_empty() {
                eprintln!("Rewrite rules: {}", rewritten.applied.join(", "));
            }
        }
    }
    Ok(0)
}

fn required_database_url(cli_url: Option<String>, config: &Config) -> AppResult<String> {
    let mut config = config.clone();
    if cli_url.is_some() {
        config.database.url = cli_url;
    }
    config.validate_for(&[Requirement::DatabaseUrl])?;
    config
        .database
        .url
        .ok_or_else(|| config_error(Requirement::DatabaseUrl.hint()))
}

/// Run the run command
pub async fn run_sql(
    sql: &str,
    database_url: Option<String>,
    config: Config,
    opts: &OutputOptions
) -> AppResult<i32> {
    let url = required_database_url(database_url, &config)?;
    let input = read_sql_input(sql)?;
    let executor = QueryExecutor::new(url);
    let execution = executor.run_with_plan(&input).await;
    let mut code = 0;
    if opts.format == OutputFormat::Text {
        println!("Executing SQL Query:\n{}\n", execution.statement);
    }
    match &execution.result {
        Ok(result) => println!("{}", format_result(result, opts)?),
        Err(e) => {
            eprintln!("Error: {}", e);
            code = 1;
        }
    }
    match &execution.plan {
        Ok(plan) if opts.format == OutputFormat::Text => {
            println!("Query Plan:\n{}", format_plan(plan))
        }
        Ok(plan) => println!("{}", format_result(plan, opts)?),
        Err(e) => {
            eprintln!("Error: EXPLAIN: {}", e);
            code = 1;
        }
    }
    Ok(code)
}

/// Run the schema command
pub async fn run_schema(
    database_url: Option<String>,
    db_schema: Option<String>,
    config: Config,
    opts: &OutputOptions
) -> AppResult<i32> {
    let url = required_database_url(database_url, &config)?;
    let schema = db_schema.unwrap_or(config.database.schema);
    let catalog = SchemaCatalog::fetch(&url, &schema).await?;
    println!("{}", format_schema(&catalog, opts)?);
    Ok(0)
}

/// Run the columns command
pub async fn run_columns(
    table: &str,
    database_url: Option<String>,
    db_schema: Option<String>,
    config: Config,
    opts: &OutputOptions
) -> AppResult<i32> {
    let url = required_database_url(database_url, &config)?;
    let schema = db_schema.unwrap_or(config.database.schema);
    let columns = fetch_table_columns(&url, &schema, table).await?;
    println!("{}", format_columns(table, &columns, opts)?);
    Ok(0)
}
