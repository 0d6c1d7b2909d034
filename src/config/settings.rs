//! Configuration settings for a narrator run.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the system the stories describe.
    pub system_name: String,
    pub output: OutputConfig,
    pub generation: GenerationConfig,
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system_name: "System".to_string(),
            output: OutputConfig::default(),
            generation: GenerationConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.as_ref().to_string_lossy()).into_owned();
        let content = std::fs::read_to_string(expanded).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("narrator.toml"),
            dirs::config_dir()
                .map(|p| p.join("narrator/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.system_name.trim().is_empty() {
            return Err(ConfigError::Invalid("system_name must not be empty".to_string()).into());
        }

        let generation = &self.generation;
        if !generation.threshold.is_finite() || generation.threshold < 0.0 {
            return Err(ConfigError::Invalid("threshold must be >= 0".to_string()).into());
        }
        if !(0.0..=1.0).contains(&generation.role_similarity) {
            return Err(
                ConfigError::Invalid("role_similarity must be within 0..=1".to_string()).into(),
            );
        }
        generation.weights.validate()?;

        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid("workers must be > 0".to_string()).into());
        }

        Ok(())
    }
}

/// What the run prints and exports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print the mined data of every story.
    pub print_stories: bool,
    /// Print the generated ontology.
    pub print_ontology: bool,
    /// Link ontology classes to the stories they originate from.
    pub link: bool,
    /// Generate Prolog facts.
    pub prolog: bool,
    /// Export the stories as JSON.
    pub json: bool,
    /// Generate one additional ontology per functional role.
    pub per_role: bool,
    /// Show corpus statistics.
    pub statistics: bool,
}

/// Tuning knobs for conceptual model generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Significance threshold `t`; a term becomes a class when its weight is at least `t * b`.
    pub threshold: f64,
    /// Base weight `b` of a single occurrence.
    pub base_weight: u32,
    /// Minimum parser similarity for a free-form noun to count as a role mention.
    pub role_similarity: f32,
    pub weights: WeightConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            base_weight: 1,
            role_similarity: 0.95,
            weights: WeightConfig::default(),
        }
    }
}

impl GenerationConfig {
    /// The minimum aggregate weight a term needs to become a class.
    pub fn cutoff(&self) -> f64 {
        self.threshold * f64::from(self.base_weight)
    }
}

/// Structural weight factors applied per term occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Functional role head.
    pub role: f64,
    /// Main object of the means segment.
    pub main_object: f64,
    /// Any other noun in the means segment.
    pub free_form_means_noun: f64,
    /// Any noun in the ends segment.
    pub free_form_ends_noun: f64,
    /// Factor for compound modifiers relative to their head.
    pub compound_relative_to_head: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            role: 1.0,
            main_object: 1.0,
            free_form_means_noun: 0.7,
            free_form_ends_noun: 0.5,
            compound_relative_to_head: 0.66,
        }
    }
}

impl WeightConfig {
    fn validate(&self) -> Result<()> {
        let named = [
            ("role", self.role),
            ("main_object", self.main_object),
            ("free_form_means_noun", self.free_form_means_noun),
            ("free_form_ends_noun", self.free_form_ends_noun),
            ("compound_relative_to_head", self.compound_relative_to_head),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!("weight {name} must be >= 0")).into());
            }
        }
        Ok(())
    }
}

/// Pipeline execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of concurrent story-mining batches.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}
