//! Semantic internal-link matching.
//!
//! Finds passages of a source document that are good anchors for links to
//! other pages of the same site, by comparing sentence embeddings of
//! overlapping text windows with the target pages' titles.
//!
//! # Architecture
//!
//! - `window`: overlapping word windows with character offsets
//! - `relevance`: keyword relevance scores for candidate prefiltering
//! - `embeddings`: fastembed model and the lazily loaded shared handle
//! - `scorer`: cosine similarity between a text and a list of titles
//! - `ranker`: windows x targets scoring, threshold and dedup
//! - `service`: request defaults, prefilter and ranking in one call

pub mod embeddings;
pub mod ranker;
pub mod relevance;
pub mod scorer;
mod service;
pub mod window;

pub use embeddings::{Embedder, EmbeddingError, ModelStatus, ScoringModel};
pub use ranker::{find_opportunities, Candidate, Match, MatchOptions};
pub use relevance::MatchType;
pub use scorer::{similarities, Similarity};
pub use service::{LinkMatcher, MatchError, MatchRequest, MatchResponse};
pub use window::{window, Window};
