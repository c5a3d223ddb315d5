use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::{AppResult, cache_error};

/// Turns text into a fixed-length vector.
///
/// Every vector produced by one embedder must have the same length.
pub trait Embedder {
    fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Local sentence embeddings using `all-MiniLM-L6-v2` (384 dimensions)
pub struct FastEmbedder {
    model: TextEmbedding
}

impl FastEmbedder {
    /// Load the default model, downloading it on first use
    pub fn new() -> AppResult<Self> {
        let mut options = InitOptions::default();
        options.model_name = EmbeddingModel::AllMiniLML6V2;
        options.show_download_progress = false;

        let model = TextEmbedding::try_new(options).map_err(|e| {
            tracing::error!("Error initializing embedding model: {}", e);
            cache_error(format!("Failed to load embedding model: {}", e))
        })?;

        Ok(Self {
            model
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| cache_error(format!("Embedding generation failed: {}", e)))?;
        if embeddings.is_empty() {
            return Err(cache_error("Embedding model returned no vector"));
        }
        Ok(embeddings.remove(0))
    }
}
