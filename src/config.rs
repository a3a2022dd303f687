//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! below. [`load_config`] parses and validates the file; invalid values are
//! reported before any database or network work starts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use treerag_core::cluster::ClusterStrategy;
use treerag_core::index::IndexOptions;
use treerag_core::tree::TreeOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
    /// HuggingFace `tokenizer.json`. Whitespace tokenization when unset.
    #[serde(default)]
    pub tokenizer: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap(),
            tokenizer: None,
        }
    }
}

fn default_max_tokens() -> usize {
    512
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct TreeConfig {
    #[serde(default = "default_cluster_size")]
    pub cluster_size: usize,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_fuzziness")]
    pub fuzziness: f32,
    #[serde(default = "default_error")]
    pub error: f32,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_summarize")]
    pub summarize: bool,
    #[serde(default = "default_summary_max_words")]
    pub summary_max_words: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            cluster_size: default_cluster_size(),
            algorithm: default_algorithm(),
            seed: 0,
            fuzziness: default_fuzziness(),
            error: default_error(),
            max_iter: default_max_iter(),
            summarize: default_summarize(),
            summary_max_words: default_summary_max_words(),
        }
    }
}

fn default_cluster_size() -> usize {
    5
}
fn default_algorithm() -> String {
    "kmeans".to_string()
}
fn default_fuzziness() -> f32 {
    2.0
}
fn default_error() -> f32 {
    0.005
}
fn default_max_iter() -> usize {
    100
}
fn default_summarize() -> bool {
    false
}
fn default_summary_max_words() -> usize {
    300
}

impl TreeConfig {
    pub fn strategy(&self) -> Result<ClusterStrategy> {
        match self.algorithm.as_str() {
            "kmeans" => Ok(ClusterStrategy::KMeans { seed: self.seed }),
            "cmeans" => Ok(ClusterStrategy::CMeans {
                seed: self.seed,
                fuzziness: self.fuzziness,
                error: self.error,
                max_iter: self.max_iter,
            }),
            other => anyhow::bail!(
                "Unknown tree.algorithm: '{}'. Must be kmeans or cmeans.",
                other
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for `openai` (OpenAI-compatible) and `ollama` providers.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_summary_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_summary_retries")]
    pub max_retries: u32,
    #[serde(default = "default_summary_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_tokens: default_summary_tokens(),
            system_prompt: default_system_prompt(),
            max_retries: default_summary_retries(),
            timeout_secs: default_summary_timeout_secs(),
        }
    }
}

fn default_temperature() -> f32 {
    0.1
}
fn default_summary_tokens() -> u32 {
    1024
}
fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}
fn default_summary_retries() -> u32 {
    3
}
fn default_summary_timeout_secs() -> u64 {
    300
}

impl SummarizerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Chunking and tree options for a [`treerag_core::index::TreeIndex`].
    pub fn index_options(&self) -> Result<IndexOptions> {
        Ok(IndexOptions {
            max_tokens: self.chunking.max_tokens,
            overlap_tokens: self.chunking.overlap_tokens,
            tree: TreeOptions {
                cluster_size: self.tree.cluster_size,
                strategy: self.tree.strategy()?,
                summary_max_words: self.tree.summary_max_words,
            },
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.max_tokens {
        anyhow::bail!("chunking.overlap_tokens must be < chunking.max_tokens");
    }

    // Validate tree
    if config.tree.cluster_size < 2 {
        anyhow::bail!("tree.cluster_size must be >= 2");
    }
    config.tree.strategy()?;
    if config.tree.algorithm == "cmeans" {
        if config.tree.fuzziness.is_nan() || config.tree.fuzziness <= 1.0 {
            anyhow::bail!("tree.fuzziness must be > 1.0");
        }
        if config.tree.max_iter == 0 {
            anyhow::bail!("tree.max_iter must be >= 1");
        }
    }
    if config.tree.summary_max_words == 0 {
        anyhow::bail!("tree.summary_max_words must be > 0");
    }
    if config.tree.summarize && !config.summarizer.is_enabled() {
        anyhow::bail!("tree.summarize requires a [summarizer] provider");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" | "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, local, or hash.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama" | "hash")
        && config.embedding.dims.unwrap_or(0) == 0
    {
        anyhow::bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    // Validate summarizer
    match config.summarizer.provider.as_str() {
        "disabled" | "extractive" => {}
        "openai" => {
            if config.summarizer.model.is_none() {
                anyhow::bail!("summarizer.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown summarizer provider: '{}'. Must be disabled, openai, or extractive.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse("[db]\npath = \"./data/t.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.max_tokens, 512);
        assert_eq!(config.chunking.overlap_tokens, 100);
        assert_eq!(config.tree.cluster_size, 5);
        assert_eq!(config.tree.strategy().unwrap(), ClusterStrategy::KMeans { seed: 0 });
        assert!(!config.embedding.is_enabled());
        assert!(!config.summarizer.is_enabled());
        assert!((config.summarizer.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cmeans_options() {
        let config = parse(
            r#"
[db]
path = "x.sqlite"
[tree]
algorithm = "cmeans"
seed = 4
cluster_size = 3
"#,
        )
        .unwrap();
        let options = config.index_options().unwrap();
        assert_eq!(options.tree.cluster_size, 3);
        assert_eq!(options.tree.strategy, ClusterStrategy::cmeans(4));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let base = "[db]\npath = \"x.sqlite\"\n";
        for extra in [
            "[chunking]\nmax_tokens = 0\n",
            "[chunking]\nmax_tokens = 10\noverlap_tokens = 10\n",
            "[tree]\ncluster_size = 1\n",
            "[tree]\nalgorithm = \"dbscan\"\n",
            "[tree]\nalgorithm = \"cmeans\"\nfuzziness = 1.0\n",
            "[tree]\nsummarize = true\n",
            "[embedding]\nprovider = \"openai\"\ndims = 8\n",
            "[embedding]\nprovider = \"hash\"\n",
            "[embedding]\nprovider = \"magic\"\n",
            "[summarizer]\nprovider = \"openai\"\n",
        ] {
            let text = format!("{}{}", base, extra);
            assert!(parse(&text).is_err(), "accepted: {}", extra);
        }
    }

    #[test]
    fn test_summarize_with_extractive() {
        let config = parse(
            r#"
[db]
path = "x.sqlite"
[tree]
summarize = true
[summarizer]
provider = "extractive"
"#,
        )
        .unwrap();
        assert!(config.tree.summarize);
    }
}
