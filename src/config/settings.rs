//! Configuration settings for the scaleweave pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub encoder: EncoderConfig,
    pub projection: ProjectionConfig,
    pub retrieval: RetrievalConfig,
    pub fusion: FusionConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, from `scaleweave.toml` next to the
    /// dataset, or fall back to defaults.
    pub fn load(explicit: Option<&Path>, data_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::info!(path = %path.display(), "loading config");
            return Self::from_file(path);
        }
        let local = data_dir.join("scaleweave.toml");
        if local.exists() {
            tracing::info!(path = %local.display(), "loading config");
            return Self::from_file(&local);
        }
        tracing::info!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.encoder.dimension == 0 {
            return Err(ConfigError::Invalid("encoder.dimension must be > 0".to_string()).into());
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be > 0".to_string()).into());
        }
        if !(0.0..=1.0).contains(&self.retrieval.structural_weight) {
            return Err(ConfigError::Invalid(
                "retrieval.structural_weight must be in [0, 1]".to_string(),
            )
            .into());
        }
        if self.orchestrator.max_iterations == 0 {
            return Err(
                ConfigError::Invalid("orchestrator.max_iterations must be >= 1".to_string()).into(),
            );
        }
        if !(0.0..=1.0).contains(&self.projection.min_coverage) {
            return Err(ConfigError::Invalid(
                "projection.min_coverage must be in [0, 1]".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Expand `~` in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Embedding-backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Embedding dimension.
    pub dimension: usize,
    /// Training/refinement epochs requested of the backend.
    pub epochs: usize,
    /// Accelerator device selector, passed through to the backend.
    pub device: String,
    /// Neighborhood-smoothing strength for the structural backend.
    pub smoothing: f32,
    /// Random seed mixed into the feature hash for reproducibility.
    pub seed: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            dimension: 64,
            epochs: 500,
            device: "cpu".to_string(),
            smoothing: 0.5,
            seed: 42,
        }
    }
}

/// Scale-adaptive projector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Minimum seed pairs with coverage at a scale before a map is fitted;
    /// below this the projector stays at identity.
    pub min_seed_pairs: usize,
    /// Minimum entity coverage before a scale is considered healthy.
    pub min_coverage: f64,
    /// Name-similarity threshold for relation alignment.
    pub relation_text_threshold: f64,
    /// Whether relation co-occurrence through seed pairs is used.
    pub relation_cooccurrence: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            min_seed_pairs: 4,
            min_coverage: 0.1,
            relation_text_threshold: 0.4,
            relation_cooccurrence: true,
        }
    }
}

/// Multi-scale retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates returned per scale per query.
    pub top_k: usize,
    /// Blend weight of hyperedge co-membership against cosine similarity.
    pub structural_weight: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            structural_weight: 0.3,
        }
    }
}

/// Scale-weave fusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Weight assigned to degraded scales (near zero, never excluded).
    pub degraded_weight: f64,
    /// Minimum fused score for a pair to become a seed.
    pub min_fused_score: f64,
    /// Minimum raw similarity a pair must reach at some scale.
    pub min_raw_similarity: f32,
    /// Exponential smoothing factor for historical per-scale precision.
    pub precision_smoothing: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            degraded_weight: 0.05,
            min_fused_score: 0.0,
            min_raw_similarity: 0.0,
            precision_smoothing: 0.5,
        }
    }
}

/// Iteration-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Hard cap on alignment iterations.
    pub max_iterations: usize,
    /// Stop once the unaligned pool falls below this size.
    pub min_kg1_entities: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            min_kg1_entities: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [orchestrator]
            max_iterations = 5

            [retrieval]
            top_k = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.orchestrator.max_iterations, 5);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.encoder.dimension, 64);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_toml("[encoder]\ndimension = 0\n").is_err());
        assert!(Config::from_toml("[retrieval]\nstructural_weight = 1.5\n").is_err());
        assert!(Config::from_toml("[orchestrator]\nmax_iterations = 0\n").is_err());
    }
}
