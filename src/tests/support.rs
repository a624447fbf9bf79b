//! Deterministic embedders for tests that must not download a model.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::matcher::{Embedder, EmbeddingError, ModelStatus};

const DIMENSIONS: usize = 4096;

/// Bag-of-words embedder: each lowercase token adds 1.0 to a hashed slot.
///
/// Texts sharing words get a positive cosine, texts without shared words
/// score 0 (barring hash collisions). Vectors are deliberately left
/// unnormalised so the scorer's normalisation is exercised.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMENSIONS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % DIMENSIONS as u64) as usize] += 1.0;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Counts model calls and the texts sent, delegating to [`HashEmbedder`].
#[derive(Default)]
pub struct CountingEmbedder {
    pub calls: AtomicUsize,
    pub texts: AtomicUsize,
}

impl CountingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn name(&self) -> &str {
        "counting"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        HashEmbedder.embed_batch(texts)
    }
}

/// A model whose load failed.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "broken"
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("weights missing".to_string()))
    }

    fn status(&self) -> ModelStatus {
        ModelStatus::Failed("weights missing".to_string())
    }
}

/// Returns one vector too few, like a misbehaving backend.
pub struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    fn name(&self) -> &str {
        "short"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().skip(1).map(|t| HashEmbedder::vector(t)).collect())
    }
}

pub fn candidate(url: &str, title: &str) -> crate::matcher::Candidate {
    crate::matcher::Candidate {
        url: url.to_string(),
        title: title.to_string(),
        keywords: vec![],
    }
}
