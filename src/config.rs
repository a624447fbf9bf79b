use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};

use crate::audit::check_link_ratio_threshold;
use crate::matcher::embeddings::parse_model_name;
use crate::matcher::ranker::{DEFAULT_OVERLAP, DEFAULT_THRESHOLD, DEFAULT_WINDOW_SIZE};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_BIND: &str = "0.0.0.0:8000";
/// Default embedding model, small enough to load in a couple of seconds
const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
const DEFAULT_BATCH_SIZE: usize = 64;
/// Words per internal link above which a page needs more links
const DEFAULT_LINK_RATIO_THRESHOLD: f64 = 500.0;
const DEFAULT_MAX_BULK_PAGES: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Load the embedding model before accepting requests
    #[serde(default = "default_true")]
    pub preload_model: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            preload_model: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub name: String,

    /// Texts per inference batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            show_download_progress: true,
        }
    }
}

/// Defaults for match requests that leave a parameter out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum similarity in [-1.0, 1.0]
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Words per window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Words shared by consecutive windows
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Prefilter candidates down to this many when a request sets no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_targets: Option<usize>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window_size: DEFAULT_WINDOW_SIZE,
            overlap: DEFAULT_OVERLAP,
            max_targets: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_link_ratio_threshold")]
    pub link_ratio_threshold: f64,

    /// Largest page list accepted by one bulk audit
    #[serde(default = "default_max_bulk_pages")]
    pub max_bulk_pages: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            link_ratio_threshold: DEFAULT_LINK_RATIO_THRESHOLD,
            max_bulk_pages: DEFAULT_MAX_BULK_PAGES,
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

fn default_link_ratio_threshold() -> f64 {
    DEFAULT_LINK_RATIO_THRESHOLD
}

fn default_max_bulk_pages() -> usize {
    DEFAULT_MAX_BULK_PAGES
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

/// Data directory: `$LINKI_BASE_PATH`, else `~/.local/share/linki`.
pub fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("LINKI_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("could not determine home directory")?
        .context("home directory path is empty")?;
    Ok(home.join(".local/share/linki"))
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let m = &self.matching;
        if !(-1.0..=1.0).contains(&m.threshold) {
            bail!(
                "matching.threshold must be between -1.0 and 1.0, got {}",
                m.threshold
            );
        }
        if m.window_size == 0 {
            bail!("matching.window_size must be greater than 0");
        }
        if m.overlap >= m.window_size {
            bail!(
                "matching.overlap ({}) must be smaller than matching.window_size ({})",
                m.overlap,
                m.window_size
            );
        }
        if m.max_targets == Some(0) {
            bail!("matching.max_targets must be greater than 0 when set");
        }

        if self.model.batch_size == 0 {
            bail!("model.batch_size must be greater than 0");
        }
        parse_model_name(&self.model.name).context("model.name")?;

        if self.audit.max_bulk_pages == 0 {
            bail!("audit.max_bulk_pages must be greater than 0");
        }
        if let Err(msg) = check_link_ratio_threshold(self.audit.link_ratio_threshold) {
            bail!("audit.{msg}");
        }

        Ok(())
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(&base_path()?)
    }

    /// Read `config.yaml` from `base_path`, creating it with defaults when
    /// missing and rewriting it when keys were added since it was written.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        let path = base_path.join(CONFIG_FILE);
        if !path.exists() {
            write_atomic(&path, &serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("config is malformed: {}", path.display()))?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        write_atomic(&self.base_path.join(CONFIG_FILE), &config_str)
    }

    /// Where downloaded model weights are cached.
    pub fn models_dir(&self) -> PathBuf {
        self.base_path.join("models")
    }
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
