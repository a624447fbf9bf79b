//! Link opportunity ranking.
//!
//! Every window of the source document is scored against every candidate
//! title. Pairs under the threshold are dropped, the rest are sorted best
//! first and each target keeps only its best window.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::matcher::embeddings::{Embedder, EmbeddingError};
use crate::matcher::scorer::{embed_normalized, rank_targets};
use crate::matcher::window::{window, Window};

pub const DEFAULT_THRESHOLD: f32 = 0.7;
pub const DEFAULT_WINDOW_SIZE: usize = 120;
pub const DEFAULT_OVERLAP: usize = 30;

/// A page that may be linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    /// Keywords used by the relevance prefilter; the title stands in when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// A suggested link: the best window of the source for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub target_url: String,
    pub target_title: String,
    /// Cosine similarity rounded to 4 decimal places
    pub similarity: f64,
    pub matched_text: String,
    pub start_idx: usize,
    pub end_idx: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub threshold: f32,
    pub window_size: usize,
    pub overlap: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window_size: DEFAULT_WINDOW_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl MatchOptions {
    /// Check the options, returning a message describing the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if !self.threshold.is_finite() || !(-1.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "threshold must be between -1.0 and 1.0, got {}",
                self.threshold
            ));
        }
        if self.window_size == 0 {
            return Err("window_size must be greater than 0".to_string());
        }
        if self.overlap >= self.window_size {
            return Err(format!(
                "overlap ({}) must be smaller than window_size ({})",
                self.overlap, self.window_size
            ));
        }
        Ok(())
    }
}

/// Find the best linking passage in `source` for each target.
///
/// Titles and windows go to the model in a single batch. Results are sorted
/// by similarity, best first, with at most one match per target URL.
pub fn find_opportunities(
    embedder: &dyn Embedder,
    source: &str,
    targets: &[Candidate],
    options: &MatchOptions,
) -> Result<Vec<Match>, EmbeddingError> {
    if source.trim().is_empty() || targets.is_empty() {
        return Ok(Vec::new());
    }

    let windows = window(source, options.window_size, options.overlap);
    if windows.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = targets
        .iter()
        .map(|t| t.title.clone())
        .chain(windows.iter().map(|w| w.text.clone()))
        .collect();
    let vectors = embed_normalized(embedder, &texts)?;
    let (title_vecs, window_vecs) = vectors.split_at(targets.len());

    // (score, window, target); window-major so equal scores keep document order
    let mut scored: Vec<(f32, usize, usize)> = Vec::new();
    for (w, window_vec) in window_vecs.iter().enumerate() {
        for sim in rank_targets(window_vec, title_vecs) {
            if sim.score >= options.threshold {
                scored.push((sim.score, w, sim.index));
            }
        }
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let matches = dedup_by_target(&scored, &windows, targets);
    log::debug!(
        "{} windows x {} targets: {} pairs over {}, {} matches",
        windows.len(),
        targets.len(),
        scored.len(),
        options.threshold,
        matches.len()
    );

    Ok(matches)
}

fn dedup_by_target(
    scored: &[(f32, usize, usize)],
    windows: &[Window],
    targets: &[Candidate],
) -> Vec<Match> {
    let mut seen = HashSet::new();
    let mut matches = Vec::new();

    for &(score, w, t) in scored {
        let target = &targets[t];
        if !seen.insert(target.url.as_str()) {
            continue;
        }
        let window = &windows[w];
        matches.push(Match {
            target_url: target.url.clone(),
            target_title: target.title.clone(),
            similarity: round4(score),
            matched_text: window.text.clone(),
            start_idx: window.start,
            end_idx: window.end,
        });
    }

    matches
}

fn round4(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}
