//! Sentence embedding models.
//!
//! - [`Embedder`]: the seam the scorer talks to, so tests can swap in a
//!   deterministic model
//! - [`EmbeddingModel`]: fastembed-backed model, downloaded on first use
//! - [`ScoringModel`]: process-wide handle that loads a model lazily,
//!   exactly once, and remembers a failed load

use fastembed::{InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use crate::config::ModelConfig;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Embedding model unavailable: {0}")]
    Unavailable(String),
}

/// Load state of a model handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    NotLoaded,
    Ready,
    Failed(String),
}

/// Anything that turns texts into fixed-size vectors.
pub trait Embedder: Send + Sync {
    /// Model identifier, for logs and health output.
    fn name(&self) -> &str;

    /// Embed every text, returning one vector per input in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn status(&self) -> ModelStatus {
        ModelStatus::Ready
    }
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    batch_size: usize,
}

impl EmbeddingModel {
    /// Create a new embedding model, downloading weights into `cache_dir`
    /// if they are not cached yet.
    pub fn new(config: &ModelConfig, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_enum = parse_model_name(&config.name)?;

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(config.show_download_progress);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: config.name.clone(),
            batch_size: config.batch_size.max(1),
        })
    }
}

impl Embedder for EmbeddingModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }
}

/// Parse model name string to fastembed enum.
pub fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l6-v2-q" | "allminiml6v2q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
        "all-minilm-l12-v2" | "allminiml12v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        _ => Err(EmbeddingError::InvalidModel(format!(
            "Unknown model: {}. Supported models: all-MiniLM-L6-v2, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5 (all-MiniLM-L6-v2-q for quantized)",
            name
        ))),
    }
}

type Loader = Box<dyn Fn() -> Result<Box<dyn Embedder>, EmbeddingError> + Send + Sync>;

/// Shared handle to a lazily loaded model.
///
/// The first call that needs the model runs the loader; concurrent callers
/// block until it finishes. The outcome is kept either way, so a failed
/// load is reported on every later call instead of being retried.
pub struct ScoringModel {
    name: String,
    loader: Loader,
    state: OnceCell<Result<Box<dyn Embedder>, String>>,
}

impl ScoringModel {
    /// Handle for the fastembed model described by `config`.
    pub fn from_config(config: ModelConfig, cache_dir: PathBuf) -> Self {
        let name = config.name.clone();
        Self::with_loader(name, move || {
            let model = EmbeddingModel::new(&config, cache_dir.clone())?;
            Ok(Box::new(model) as Box<dyn Embedder>)
        })
    }

    pub fn with_loader<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Embedder>, EmbeddingError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            loader: Box::new(loader),
            state: OnceCell::new(),
        }
    }

    /// Load the model now if it is not loaded yet.
    pub fn load(&self) -> Result<&dyn Embedder, EmbeddingError> {
        let state = self.state.get_or_init(|| {
            log::info!("loading embedding model '{}'", self.name);
            let started = Instant::now();

            match (self.loader)() {
                Ok(model) => {
                    log::info!(
                        "embedding model '{}' ready in {:.2?}",
                        self.name,
                        started.elapsed()
                    );
                    Ok(model)
                }
                Err(e) => {
                    log::error!("failed to load embedding model '{}': {}", self.name, e);
                    Err(e.to_string())
                }
            }
        });

        match state {
            Ok(model) => Ok(model.as_ref()),
            Err(reason) => Err(EmbeddingError::Unavailable(reason.clone())),
        }
    }
}

impl Embedder for ScoringModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.load()?.embed_batch(texts)
    }

    fn status(&self) -> ModelStatus {
        match self.state.get() {
            None => ModelStatus::NotLoaded,
            Some(Ok(_)) => ModelStatus::Ready,
            Some(Err(reason)) => ModelStatus::Failed(reason.clone()),
        }
    }
}
