//! Error types for the narrator pipeline.

use thiserror::Error;

/// Main error type for narrator operations.
#[derive(Error, Debug)]
pub enum NarratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Structuring error: {0}")]
    Structuring(#[from] StructuringError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A story whose mandatory indicator phrases could not be located.
///
/// This is the only condition that excludes a story from the run; the
/// batch records it and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuringError {
    #[error("Could not find a role indicator")]
    MissingRoleIndicator,

    #[error("Could not find a means indicator")]
    MissingMeansIndicator,

    #[error("Story is empty")]
    EmptyStory,
}

/// Errors raised by a language parser backend.
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to load annotations: {0}")]
    Load(String),

    #[error("No parse available for: {0}")]
    Unavailable(String),

    #[error("Malformed parse: {0}")]
    Malformed(String),
}

/// Result type alias for narrator operations.
pub type Result<T> = std::result::Result<T, NarratorError>;
