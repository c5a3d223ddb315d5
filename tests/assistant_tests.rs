// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

//! Question pipeline against a local stand-in for the Ollama API.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering}
    }
};

use text_to_sql::{
    app::{Assistant, SessionSettings},
    cache::SemanticCache,
    config::RetryConfig,
    embedding::Embedder,
    error::{AppResult, cache_error},
    generator::SqlGenerator,
    llm::{LlmClient, LlmProvider}
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream}
};

const GENERATED: &str = "SELECT region, COUNT(*) AS n FROM sales GROUP BY region";

struct FixedEmbedder {
    vectors: HashMap<&'static str, Vec<f32>>
}

impl FixedEmbedder {
    fn new() -> Self {
        let vectors = [
            ("orders per region", vec![1.0, 0.0]),
            ("number of orders by region", vec![0.9, 0.1]),
            ("list all customers", vec![0.0, 1.0])
        ]
        .into_iter()
        .collect();
        Self {
            vectors
        }
    }
}

impl Embedder for FixedEmbedder {
    fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| cache_error(format!("no vector for '{}'", text)))
    }
}

/// HTTP server answering every request with one canned response.
struct StubServer {
    addr:     SocketAddr,
    requests: Arc<AtomicUsize>
}

impl StubServer {
    async fn start(status: u16, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Self {
            addr,
            requests
        }
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn generator(&self, retry: RetryConfig) -> SqlGenerator {
        let provider = LlmProvider::Ollama {
            base_url: format!("http://{}", self.addr),
            model:    "llama3.2".to_string()
        };
        SqlGenerator::new(LlmClient::with_retry_config(provider, retry))
    }
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return;
        }
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        database_url: None,
        db_schema:    "public".to_string(),
        threshold:    0.5
    }
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_factor: 2.0
    }
}

fn success_body() -> &'static str {
    r#"{"response":"SELECT region, COUNT(*) AS n FROM sales GROUP BY region"}"#
}

fn assistant(server: &StubServer) -> Assistant<FixedEmbedder> {
    Assistant::new(
        server.generator(RetryConfig::default()),
        Some(SemanticCache::new(FixedEmbedder::new(), None)),
        settings()
    )
}

#[tokio::test]
async fn test_miss_generates_and_stores_raw_sql() {
    let server = StubServer::start(200, success_body()).await;
    let mut assistant = assistant(&server);

    let draft = assistant.draft("orders per region").await.unwrap();
    assert_eq!(server.requests(), 1);
    assert!(draft.cache_hit.is_none());
    assert_eq!(draft.generated_sql, GENERATED);
    assert_eq!(
        draft.optimized_sql,
        "SELECT region, COUNT(*) AS N FROM sales GROUP BY region\nORDER BY region"
    );

    let cache = assistant.cache().unwrap();
    assert_eq!(cache.len(), 1);
    let stored = cache.entries().next().unwrap();
    assert_eq!(stored.question, "orders per region");
    assert_eq!(stored.sql, GENERATED);
}

#[tokio::test]
async fn test_repeat_and_paraphrase_skip_generation() {
    let server = StubServer::start(200, success_body()).await;
    let mut assistant = assistant(&server);
    let first = assistant.draft("orders per region").await.unwrap();

    let repeat = assistant.draft("orders per region").await.unwrap();
    assert_eq!(server.requests(), 1);
    let hit = repeat.cache_hit.unwrap();
    assert_eq!(hit.distance, 0.0);
    assert_eq!(repeat.optimized_sql, first.optimized_sql);

    let paraphrase = assistant.draft("number of orders by region").await.unwrap();
    assert_eq!(server.requests(), 1);
    assert_eq!(paraphrase.cache_hit.unwrap().question, "orders per region");
    assert_eq!(assistant.cache().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unrelated_question_generates_again() {
    let server = StubServer::start(200, success_body()).await;
    let mut assistant = assistant(&server);
    assistant.draft("orders per region").await.unwrap();
    assistant.draft("list all customers").await.unwrap();
    assert_eq!(server.requests(), 2);
    assert_eq!(assistant.cache().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_generation_stores_nothing() {
    let server = StubServer::start(500, r#"{"error":"model crashed"}"#).await;
    let mut assistant = assistant(&server);
    assert!(assistant.draft("orders per region").await.is_err());
    assert_eq!(server.requests(), 1);
    assert!(assistant.cache().unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_cache_always_generates() {
    let server = StubServer::start(200, success_body()).await;
    let mut assistant: Assistant<FixedEmbedder> =
        Assistant::new(server.generator(RetryConfig::default()), None, settings());
    assistant.draft("orders per region").await.unwrap();
    assistant.draft("orders per region").await.unwrap();
    assert_eq!(server.requests(), 2);
    assert!(assistant.cache().is_none());
}

#[tokio::test]
async fn test_answer_without_database_records_error() {
    let server = StubServer::start(200, success_body()).await;
    let mut assistant = assistant(&server);

    let answer = assistant.answer("orders per region", true).await.unwrap();
    assert!(answer.executed_sql.is_none());
    assert!(answer.result.is_none());
    assert_eq!(answer.errors.len(), 1);

    let answer = assistant.answer("orders per region", false).await.unwrap();
    assert!(answer.errors.is_empty());
    assert!(answer.draft.cache_hit.is_some());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = StubServer::start(503, r#"{"error":"overloaded"}"#).await;
    let generator = server.generator(fast_retry(2));
    let mut assistant: Assistant<FixedEmbedder> = Assistant::new(generator, None, settings());
    assert!(assistant.draft("orders per region").await.is_err());
    assert_eq!(server.requests(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried_whatever_the_body() {
    let server = StubServer::start(
        400,
        r#"{"error":"max_tokens 1500 exceeds limit; connection 500 rate limit timeout"}"#
    )
    .await;
    let generator = server.generator(fast_retry(2));
    let mut assistant: Assistant<FixedEmbedder> = Assistant::new(generator, None, settings());
    assert!(assistant.draft("orders per region").await.is_err());
    assert_eq!(server.requests(), 1);
}
