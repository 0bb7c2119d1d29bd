//! Configuration for seek.
//!
//! Settings are layered with the `config` crate, lowest precedence first:
//! built-in defaults, `~/.config/seek/config.toml`, `<repo>/.seek/config.toml`,
//! an explicit `--config` file, then `SEEK__SECTION__KEY` environment
//! variables.

use std::path::{Path, PathBuf};

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory holding per-repository and per-user seek state.
pub const STATE_DIR_NAME: &str = ".seek";

/// Config file name inside a state or config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable consulted when no embeddings key is configured.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Cannot expand '{value}': {message}")]
    Expand { value: String, message: String },

    #[error("Environment variable '{var}' not set (from config value '{value}')")]
    MissingEnvVar { var: String, value: String },

    #[error(
        "No API key configured. Set discover.embeddings.api_key in config or the {API_KEY_ENV} environment variable"
    )]
    MissingApiKey,

    #[error("Cannot determine the home directory")]
    NoHomeDir,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discover: DiscoverConfig,
    pub review: ReviewConfig,
    pub watch: WatchConfig,
}

/// Index implementation used for context discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// BM25 index stored in the cache directory
    #[default]
    Local,
    /// Vector index in Qdrant, fed by an embeddings API
    Qdrant,
}

/// Context discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverConfig {
    pub backend: Backend,
    /// Root of the per-repository cache directories; `~` and `$VAR` expand
    pub cache_root: Option<String>,
    pub top_k: usize,
    pub verbose: bool,
    pub max_file_bytes: u64,
    pub binary_sniff_bytes: usize,
    pub ignore_file: String,
    pub respect_gitignore: bool,
    pub chunking: ChunkingConfig,
    pub embeddings: EmbeddingsConfig,
    pub qdrant: QdrantSettings,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            cache_root: None,
            top_k: 5,
            verbose: false,
            max_file_bytes: 1024 * 1024,
            binary_sniff_bytes: 1024,
            ignore_file: ".seekignore".to_string(),
            respect_gitignore: false,
            chunking: ChunkingConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            qdrant: QdrantSettings::default(),
        }
    }
}

impl DiscoverConfig {
    /// Resolved cache root, defaulting to `~/.seek/caches/context_discovery`.
    pub fn cache_root_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.cache_root {
            Some(root) => Ok(PathBuf::from(expand(root)?)),
            None => dirs::home_dir()
                .map(|home| {
                    home.join(STATE_DIR_NAME)
                        .join("caches")
                        .join("context_discovery")
                })
                .ok_or(ConfigError::NoHomeDir),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

/// Embeddings API used by the Qdrant backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: String,
    /// Literal key or `${VAR}` reference
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub base_url: Option<String>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            api_key: None,
            model: "qwen/qwen3-embedding-8b".to_string(),
            dimensions: 4096,
            base_url: None,
        }
    }
}

impl EmbeddingsConfig {
    /// The configured key, resolving `${VAR}` references and falling back
    /// to `OPENROUTER_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if key.starts_with("${") && key.ends_with('}') => {
                let var = &key[2..key.len() - 1];
                std::env::var(var).map_err(|_| ConfigError::MissingEnvVar {
                    var: var.to_string(),
                    value: key.to_string(),
                })
            }
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => std::env::var(API_KEY_ENV).map_err(|_| ConfigError::MissingApiKey),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantSettings {
    pub url: String,
    pub api_key: Option<String>,
    /// Collections are named `<prefix>-<repo hash>`
    pub collection_prefix: String,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection_prefix: "seek".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Review instructions file; relative paths resolve against the repo root
    pub checklist_path: Option<String>,
}

impl ReviewConfig {
    /// Location of the checklist for `repo_root`.
    pub fn checklist_file(&self, repo_root: &Path) -> Result<PathBuf, ConfigError> {
        match &self.checklist_path {
            Some(path) => Ok(repo_root.join(expand(path)?)),
            None => Ok(repo_root
                .join(STATE_DIR_NAME)
                .join("pr_review_checklist.md")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a burst of file events is processed
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

impl Config {
    /// Load the layered configuration for `repo_root`.
    pub fn load(repo_root: Option<&Path>, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut files = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            files.push((dir.join("seek").join(CONFIG_FILE_NAME), false));
        }
        if let Some(root) = repo_root {
            files.push((root.join(STATE_DIR_NAME).join(CONFIG_FILE_NAME), false));
        }
        if let Some(path) = explicit {
            files.push((path.to_path_buf(), true));
        }
        Self::load_files(&files)
    }

    /// Load from TOML files in increasing precedence. Missing optional files
    /// are skipped; environment overrides apply last.
    pub fn load_files(files: &[(PathBuf, bool)]) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        for (path, required) in files {
            builder = builder.add_source(
                File::new(&path.to_string_lossy(), FileFormat::Toml).required(*required),
            );
        }
        builder = builder.add_source(
            Environment::with_prefix("SEEK")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunking = &self.discover.chunking;
        if chunking.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "discover.chunking.chunk_size must be positive".to_string(),
            ));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "discover.chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if self.discover.top_k == 0 {
            return Err(ConfigError::Invalid(
                "discover.top_k must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn expand(value: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(|s| s.into_owned())
        .map_err(|e| ConfigError::Expand {
            value: value.to_string(),
            message: e.to_string(),
        })
}
