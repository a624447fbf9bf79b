//! Request-level entry point for link matching.
//!
//! Fills request gaps from configured defaults, optionally narrows the
//! candidate set with the relevance prefilter, then runs the ranker.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::MatchingConfig;
use crate::matcher::embeddings::{Embedder, EmbeddingError, ModelStatus};
use crate::matcher::ranker::{find_opportunities, Candidate, Match, MatchOptions};
use crate::matcher::relevance::{prefilter, MatchType};

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// A link matching request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRequest {
    pub source_content: String,
    pub targets: Vec<Candidate>,
    #[serde(default)]
    pub threshold: Option<f32>,
    /// Keep only this many candidates, chosen by keyword relevance
    #[serde(default)]
    pub max_targets: Option<usize>,
    /// Focus keyword added to every candidate's keywords when prefiltering
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default)]
    pub window_size: Option<usize>,
    #[serde(default)]
    pub overlap: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResponse {
    pub matches: Vec<Match>,
}

pub struct LinkMatcher {
    embedder: Arc<dyn Embedder>,
    defaults: MatchingConfig,
}

impl LinkMatcher {
    pub fn new(embedder: Arc<dyn Embedder>, defaults: MatchingConfig) -> Self {
        Self { embedder, defaults }
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn model_status(&self) -> ModelStatus {
        self.embedder.status()
    }

    pub fn defaults(&self) -> &MatchingConfig {
        &self.defaults
    }

    /// Resolve request overrides against the configured defaults.
    pub fn options_for(&self, request: &MatchRequest) -> Result<MatchOptions, MatchError> {
        let options = MatchOptions {
            threshold: request.threshold.unwrap_or(self.defaults.threshold),
            window_size: request.window_size.unwrap_or(self.defaults.window_size),
            overlap: request.overlap.unwrap_or(self.defaults.overlap),
        };
        options.validate().map_err(MatchError::InvalidRequest)?;
        Ok(options)
    }

    pub fn match_links(&self, request: &MatchRequest) -> Result<MatchResponse, MatchError> {
        let options = self.options_for(request)?;

        if let Some(0) = request.max_targets {
            return Err(MatchError::InvalidRequest(
                "max_targets must be greater than 0".to_string(),
            ));
        }

        let started = Instant::now();
        let max_targets = request.max_targets.or(self.defaults.max_targets);

        let filtered;
        let targets = match max_targets {
            Some(limit) if request.targets.len() > limit => {
                filtered = prefilter(
                    &request.source_content,
                    &request.targets,
                    limit,
                    request.match_type,
                    request.keyword.as_deref(),
                );
                log::debug!(
                    "prefilter kept {} of {} targets",
                    filtered.len(),
                    request.targets.len()
                );
                filtered.as_slice()
            }
            _ => request.targets.as_slice(),
        };

        let matches = find_opportunities(
            self.embedder.as_ref(),
            &request.source_content,
            targets,
            &options,
        )?;

        log::info!(
            "matched {} chars against {} targets: {} matches in {:.2?}",
            request.source_content.chars().count(),
            targets.len(),
            matches.len(),
            started.elapsed()
        );

        Ok(MatchResponse { matches })
    }
}
