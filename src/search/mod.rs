//! Semantic venue search
//!
//! This module contains the search stages organized by concern:
//! - Document: the text form rows take on their way through the engine
//! - Filter: proximity filtering against the resolved reference point
//! - Engine: the similarity engine client and its ephemeral collections
//! - Pipeline: the orchestrator tying the stages together

pub mod document;
pub mod engine;
pub mod filter;
pub mod pipeline;

pub use engine::{ChromaClient, Document, ScoredDocument, SimilaritySearch};
pub use pipeline::SearchPipeline;
