//! Stage definitions
//!
//! A stage is one unit of sequential pipeline work: a templated instruction
//! bound to exactly one role plus the capabilities the generation call may
//! invoke. Stages are built once at startup and reused across runs.

use crate::error::AnalyzerError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inputs shared by every stage of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedInputs {
    pub query: String,
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    /// Instruction template with `{file_path}` / `{query}` placeholders
    pub description: String,
    /// Human-readable output contract, used as a generation constraint
    pub expected_output: String,
    pub role: String,
    pub capabilities: Vec<String>,
}

impl Stage {
    /// Resolve the description template against the shared inputs.
    pub fn render(&self, inputs: &SharedInputs) -> String {
        self.description
            .replace("{file_path}", &inputs.file_path)
            .replace("{query}", &inputs.query)
    }

    /// Reject templates whose placeholders fall outside the shared-input set.
    pub fn validate_template(&self) -> Result<()> {
        let mut rest = self.description.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                AnalyzerError::TemplateError(format!(
                    "Stage '{}' has an unterminated placeholder",
                    self.name
                ))
            })?;
            let token = &after[..close];
            if token != "file_path" && token != "query" {
                return Err(AnalyzerError::TemplateError(format!(
                    "Stage '{}' references unknown placeholder '{{{}}}'",
                    self.name, token
                )));
            }
            rest = &after[close + 1..];
        }
        Ok(())
    }
}

/// Output of one executed stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_name: String,
    pub role_name: String,
    pub output: String,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// The fixed four-stage analysis workflow, in execution order.
pub fn builtin_stages() -> Vec<Stage> {
    let document_capabilities = vec![crate::capability::READ_FINANCIAL_DOCUMENT.to_string()];

    vec![
        Stage {
            name: "verification".to_string(),
            description: "Verify that the provided file is a valid financial document.\n\
                          Extract key financial sections such as revenue, profit, expenses, \
                          assets, liabilities, and financial summaries.\n\n\
                          File path: {file_path}"
                .to_string(),
            expected_output: "Confirmation whether document is valid financial document.\n\
                              Summary of document type.\n\
                              Key financial sections identified."
                .to_string(),
            role: crate::roles::VERIFIER.to_string(),
            capabilities: document_capabilities.clone(),
        },
        Stage {
            name: "financial_analysis".to_string(),
            description: "Analyze the financial document at {file_path}.\n\
                          User query: {query}\n\n\
                          Extract and analyze:\n\
                          - Revenue\n\
                          - Net profit\n\
                          - Expenses\n\
                          - Growth indicators\n\
                          - Financial performance\n\n\
                          Provide clear financial insights."
                .to_string(),
            expected_output: "Detailed financial analysis including:\n\
                              - Revenue analysis\n\
                              - Profitability analysis\n\
                              - Financial health summary\n\
                              - Key insights"
                .to_string(),
            role: crate::roles::FINANCIAL_ANALYST.to_string(),
            capabilities: document_capabilities.clone(),
        },
        Stage {
            name: "investment_analysis".to_string(),
            description: "Based on financial document at {file_path}, provide investment \
                          analysis.\n\n\
                          Include:\n\
                          - Investment potential\n\
                          - Strengths\n\
                          - Weaknesses\n\
                          - Recommendation (Buy, Hold, Sell)"
                .to_string(),
            expected_output: "Professional investment recommendation including:\n\
                              - Investment rating\n\
                              - Justification\n\
                              - Supporting financial metrics"
                .to_string(),
            role: crate::roles::INVESTMENT_ADVISOR.to_string(),
            capabilities: document_capabilities.clone(),
        },
        Stage {
            name: "risk_assessment".to_string(),
            description: "Perform risk assessment of financial document at {file_path}.\n\n\
                          Identify:\n\
                          - Financial risks\n\
                          - Liquidity risks\n\
                          - Profitability risks\n\
                          - Operational risks"
                .to_string(),
            expected_output: "Detailed risk assessment including:\n\
                              - Risk level (Low, Medium, High)\n\
                              - Risk factors\n\
                              - Risk mitigation suggestions"
                .to_string(),
            role: crate::roles::RISK_ASSESSOR.to_string(),
            capabilities: document_capabilities,
        },
    ]
}
