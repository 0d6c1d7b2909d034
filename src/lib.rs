//! Narrator: user-story mining and conceptual-model generation
//!
//! Reads "As a ⟨role⟩, I want to ⟨means⟩ [so that ⟨ends⟩]" stories, mines
//! their syntactic constituents, weighs terms across the corpus and derives
//! an ontology of classes and relationships.

pub mod config;
pub mod corpus;
pub mod error;
pub mod matrix;
pub mod ontology;
pub mod parser;
pub mod pipeline;
pub mod stats;
pub mod story;
pub mod utils;

pub use config::{Config, GenerationConfig, OutputConfig, PipelineConfig, WeightConfig};
pub use corpus::{parse_stories, read_stories};
pub use error::{ConfigError, NarratorError, ParserError, Result, StructuringError};
pub use matrix::{MatrixBuilder, TermMatrix, TermSummary};
pub use ontology::{
    to_prolog, Constructor, Ontology, OntologyClass, OntologyGraph, OntologySet, Relationship,
};
pub use parser::{
    LanguageParser, ParsedDoc, PreparsedParser, PreparsedSentence, RuleParser, SharedParser, Token,
};
pub use pipeline::{Narrator, Report, Timings};
pub use stats::{CorpusStatistics, Counter, StoryFailure, StoryStatistics};
pub use story::{MinedStory, Miner, RawStory, StoryExport, StructuredStory, Structurer};
