//! Run configuration.

mod settings;

pub use settings::{Config, GenerationConfig, OutputConfig, PipelineConfig, WeightConfig};
