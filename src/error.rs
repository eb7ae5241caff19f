//! Error types for the financial document analyzer

use thiserror::Error;

/// Result type alias for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[derive(Error, Debug)]
pub enum AnalyzerError {

    // =============================
    // Startup / Configuration
    // =============================

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // =============================
    // Stage Infrastructure Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Rate limit wait exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Capability error: {0}")]
    CapabilityError(String),

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Unresolvable template placeholder: {0}")]
    TemplateError(String),

    #[error("Stage {index} ({stage}, role {role}) failed: {source}")]
    StageFailed {
        index: usize,
        stage: String,
        role: String,
        #[source]
        source: Box<AnalyzerError>,
    },

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure states of document text extraction.
///
/// Returned as a value from `DocumentReader::read`, never as a panic.
/// The display text is fed verbatim into the generation call when a stage
/// observes one of these, so the final report can explain an unreadable
/// upload instead of the run aborting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("ERROR: File not found at path: {0}")]
    NotFound(String),

    #[error("ERROR: No content found in document")]
    Empty,

    #[error("ERROR reading document: {0}")]
    ReadFailure(String),
}
