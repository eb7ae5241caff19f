//! Capability trait and registry
//!
//! Capabilities are the external functions a role may invoke during a
//! generation call. Bindings are resolved at construction time, not per-call.

use crate::document::DocumentReader;
use crate::error::AnalyzerError;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const READ_FINANCIAL_DOCUMENT: &str = "read_financial_document";

/// Input for a single capability invocation
#[derive(Debug, Clone)]
pub struct CapabilityInput {
    pub parameters: Value,
}

/// Result of a capability invocation.
///
/// `success` is false when the capability absorbed a document error; the
/// invocation itself still succeeded and `text` carries the error description
/// for the generation call to reason about.
#[derive(Debug, Clone)]
pub struct CapabilityOutput {
    pub success: bool,
    pub text: String,
}

/// Trait for a single capability
#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn invoke(&self, input: &CapabilityInput) -> Result<CapabilityOutput>;
}

/// Capability registry for looking up and invoking capabilities
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.name().to_string(), capability);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn list(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a financial PDF document and returns clean text.
///
/// Document failures (missing file, zero pages, undecodable bytes) are
/// reported as output text, not as errors: the generation call receives the
/// failure description verbatim and the run degrades instead of aborting.
pub struct ReadFinancialDocument;

#[async_trait::async_trait]
impl Capability for ReadFinancialDocument {
    fn name(&self) -> &'static str {
        READ_FINANCIAL_DOCUMENT
    }

    fn description(&self) -> &'static str {
        "Read the financial PDF document at 'file_path' and return its text"
    }

    async fn invoke(&self, input: &CapabilityInput) -> Result<CapabilityOutput> {
        let file_path = input
            .parameters
            .get("file_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AnalyzerError::CapabilityError(
                    "Expected 'file_path' in capability input".to_string(),
                )
            })?
            .to_string();

        let result = tokio::task::spawn_blocking(move || DocumentReader::read(&file_path))
            .await
            .map_err(|e| AnalyzerError::CapabilityError(format!("Document read task: {}", e)))?;

        Ok(match result {
            Ok(text) => CapabilityOutput {
                success: true,
                text,
            },
            Err(document_error) => CapabilityOutput {
                success: false,
                text: document_error.to_string(),
            },
        })
    }
}

/// Create the default registry with the document-reading capability.
pub fn create_default_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(ReadFinancialDocument));
    registry
}
