//! Financial Document Analyzer
//!
//! Accepts an uploaded financial PDF plus a natural-language query and runs a
//! fixed sequential pipeline of four analysis roles over it:
//!
//! VERIFY → ANALYZE → RECOMMEND → ASSESS RISK
//!
//! Each stage conditions a generation call with its role (goal, backstory,
//! limits) and may invoke the document-reading capability; the final report
//! is the last stage's output with earlier findings absorbed into it.

pub mod api;
pub mod capability;
pub mod config;
pub mod document;
pub mod error;
pub mod executor;
pub mod llm;
pub mod pipeline;
pub mod roles;
pub mod stages;

pub use error::{AnalyzerError, DocumentError, Result};

// Re-export common types
pub use pipeline::{create_default_pipeline, Pipeline, PipelineRun, PipelineRunner};
pub use stages::{SharedInputs, StageResult};
