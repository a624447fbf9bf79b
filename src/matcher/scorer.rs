//! Cosine similarity between a source text and candidate titles.

use serde::Serialize;

use crate::matcher::embeddings::{Embedder, EmbeddingError};

/// Score of one title against the source text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Similarity {
    /// Position of the title in the input list
    pub index: usize,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
}

/// Score `source` against every title, best first.
///
/// Source and titles are embedded in a single model call. Ties keep input
/// order. No titles means no model call.
pub fn similarities(
    embedder: &dyn Embedder,
    source: &str,
    titles: &[String],
) -> Result<Vec<Similarity>, EmbeddingError> {
    if titles.is_empty() {
        return Ok(Vec::new());
    }

    let mut texts = Vec::with_capacity(titles.len() + 1);
    texts.push(source.to_string());
    texts.extend(titles.iter().cloned());

    let vectors = embed_normalized(embedder, &texts)?;
    let (source_vec, title_vecs) = vectors.split_at(1);

    Ok(rank_targets(&source_vec[0], title_vecs))
}

/// Embed `texts` and L2-normalise every vector.
pub(crate) fn embed_normalized(
    embedder: &dyn Embedder,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut vectors = embedder.embed_batch(texts)?;
    if vectors.len() != texts.len() {
        return Err(EmbeddingError::EmbeddingFailed(format!(
            "model '{}' returned {} embeddings for {} texts",
            embedder.name(),
            vectors.len(),
            texts.len()
        )));
    }

    for v in vectors.iter_mut() {
        normalize_l2(v);
    }
    Ok(vectors)
}

/// Score normalised `targets` against a normalised `source`, best first.
pub(crate) fn rank_targets(source: &[f32], targets: &[Vec<f32>]) -> Vec<Similarity> {
    let mut scores: Vec<Similarity> = targets
        .iter()
        .enumerate()
        .map(|(index, target)| Similarity {
            index,
            score: dot(source, target).clamp(-1.0, 1.0),
        })
        .collect();

    // sort_by is stable, equal scores stay in input order
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scores
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2-normalise in place. Zero vectors are left untouched.
fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
