//! Conceptual model generation.
//!
//! Turns the term-story matrix and the mined stories into classes and
//! relationships, globally and optionally per functional role.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Constructor                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ term classes │  │  compound    │  │  associations  │  │
//! │  │ (threshold)  │─▶│  classes+isa │─▶│ role─verb─obj  │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! └───────────────────────────┬──────────────────────────────┘
//!                             ▼
//!             Ontology ──▶ OntologyGraph / Prolog facts
//! ```

mod constructor;
pub mod prolog;
mod types;

pub use constructor::Constructor;
pub use prolog::to_prolog;
pub use types::*;
