//! Semantic cache of generated SQL keyed by question meaning.
//!
//! Questions are embedded into vectors; a lookup returns the SQL of the
//! nearest stored question when its squared Euclidean distance is strictly
//! below the threshold. Entries are never deduplicated. When a capacity is
//! set, the oldest entry is evicted first.
//!
//! Embedding failures are logged and treated as a miss (lookup) or a no-op
//! (store); they never reach the caller.
//!
//! # Example
//!
//! ```
//! use text_to_sql::{
//!     cache::SemanticCache,
//!     embedding::Embedder,
//!     error::AppResult
//! };
//!
//! struct Length;
//!
//! impl Embedder for Length {
//!     fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
//!         Ok(vec![text.len() as f32])
//!     }
//! }
//!
//! let mut cache = SemanticCache::new(Length, None);
//! cache.store("total sales", "SELECT SUM(amount) FROM sales");
//! let hit = cache.retrieve("total sales", 0.5).unwrap();
//! assert_eq!(hit.sql, "SELECT SUM(amount) FROM sales");
//! assert!(cache.retrieve("monthly revenue by region", 0.5).is_none());
//! ```

use std::collections::VecDeque;

use serde::Serialize;

use crate::{
    embedding::Embedder,
    error::{AppResult, cache_error}
};

/// A question and the SQL generated for it, with the question's embedding.
#[derive(Debug, Clone, Serialize)]
pub struct CachedEntry {
    pub question:  String,
    pub sql:       String,
    #[serde(skip)]
    pub embedding: Vec<f32>
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// Question that was originally stored
    pub question: String,
    pub sql:      String,
    /// Squared Euclidean distance between the two questions
    pub distance: f32
}

/// Nearest-neighbor cache over question embeddings.
pub struct SemanticCache<E> {
    embedder:    E,
    entries:     VecDeque<CachedEntry>,
    max_entries: Option<usize>
}

impl<E: Embedder> SemanticCache<E> {
    /// Create an empty cache; `max_entries` of `None` or `Some(0)` is
    /// unbounded
    pub fn new(embedder: E, max_entries: Option<usize>) -> Self {
        Self {
            embedder,
            entries: VecDeque::new(),
            max_entries: max_entries.filter(|n| *n > 0)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &CachedEntry> {
        self.entries.iter()
    }

    /// Remember `sql` as the answer to `question`
    ///
    /// Returns `false` when the question could not be embedded; the cache is
    /// left unchanged in that case.
    pub fn store(&mut self, question: &str, sql: &str) -> bool {
        match self.try_store(question, sql) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Error storing query: {}", e);
                false
            }
        }
    }

    fn try_store(&mut self, question: &str, sql: &str) -> AppResult<()> {
        let embedding = self.embedder.embed(question)?;
        if let Some(first) = self.entries.front()
            && first.embedding.len() != embedding.len()
        {
            return Err(cache_error(format!(
                "embedding dimension {} does not match index dimension {}",
                embedding.len(),
                first.embedding.len()
            )));
        }
        if let Some(max) = self.max_entries {
            while self.entries.len() >= max {
                if let Some(evicted) = self.entries.pop_front() {
                    tracing::debug!("Evicting cached question '{}'", evicted.question);
                }
            }
        }
        self.entries.push_back(CachedEntry {
            question: question.to_string(),
            sql: sql.to_string(),
            embedding
        });
        Ok(())
    }

    /// Find the SQL of the closest stored question
    ///
    /// Returns `None` when the cache is empty, when the best distance is not
    /// strictly below `threshold`, or when the question cannot be embedded.
    pub fn retrieve(&self, question: &str, threshold: f32) -> Option<CacheHit> {
        if self.entries.is_empty() {
            return None;
        }
        let embedding = match self.embedder.embed(question) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Error retrieving query: {}", e);
                return None;
            }
        };
        let (entry, distance) = self.nearest(&embedding)?;
        if distance < threshold {
            tracing::debug!(distance, "Cache hit for '{}'", question);
            Some(CacheHit {
                question: entry.question.clone(),
                sql: entry.sql.clone(),
                distance
            })
        } else {
            tracing::info!("No sufficiently similar query found (distance {:.4})", distance);
            None
        }
    }

    fn nearest(&self, query: &[f32]) -> Option<(&CachedEntry, f32)> {
        let mut best: Option<(&CachedEntry, f32)> = None;
        for entry in &self.entries {
            if entry.embedding.len() != query.len() {
                tracing::error!(
                    "Error retrieving query: embedding dimension {} does not match index dimension {}",
                    query.len(),
                    entry.embedding.len()
                );
                return None;
            }
            let distance = squared_l2(&entry.embedding, query);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((entry, distance));
            }
        }
        best
    }
}

/// Squared Euclidean distance between two equal-length vectors
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }
}
