//! Integration tests for narrator.
//!
//! These tests run the full pipeline with the built-in rule parser, from
//! corpus text to the ontology and its exports.

#[path = "integration/test_pipeline.rs"]
mod test_pipeline;

#[path = "integration/test_ontology.rs"]
mod test_ontology;
