//! Role definitions and registry
//!
//! A role is a named persona conditioning every generation call made on its
//! behalf. Roles are built once at startup and shared read-only across runs.

use crate::capability::CapabilityRegistry;
use crate::error::AnalyzerError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const VERIFIER: &str = "Financial Document Verification Specialist";
pub const FINANCIAL_ANALYST: &str = "Senior Financial Analyst";
pub const INVESTMENT_ADVISOR: &str = "Investment Advisor";
pub const RISK_ASSESSOR: &str = "Financial Risk Assessment Expert";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub goal: String,
    pub backstory: String,
    pub capabilities: Vec<String>,
    /// Bound on internal reasoning/capability loops per stage
    pub max_iterations: u32,
    /// Throttle on generation calls made on this role's behalf
    pub max_requests_per_minute: u32,
}

/// Fixed mapping from role name to role, populated once at startup.
pub struct RoleRegistry {
    roles: HashMap<String, Arc<Role>>,
}

impl RoleRegistry {
    /// Build a registry, validating every role against the capability
    /// registry. Invalid static configuration fails here, before any
    /// pipeline can run.
    pub fn new(roles: Vec<Role>, capabilities: &CapabilityRegistry) -> Result<Self> {
        let mut map = HashMap::with_capacity(roles.len());

        for role in roles {
            if role.goal.trim().is_empty() || role.backstory.trim().is_empty() {
                return Err(AnalyzerError::ConfigurationError(format!(
                    "Role '{}' must declare a goal and a backstory",
                    role.name
                )));
            }
            if role.max_iterations == 0 || role.max_requests_per_minute == 0 {
                return Err(AnalyzerError::ConfigurationError(format!(
                    "Role '{}' must declare positive execution limits",
                    role.name
                )));
            }
            for capability in &role.capabilities {
                if !capabilities.contains(capability) {
                    return Err(AnalyzerError::ConfigurationError(format!(
                        "Role '{}' references unregistered capability '{}'",
                        role.name, capability
                    )));
                }
            }
            map.insert(role.name.clone(), Arc::new(role));
        }

        Ok(Self { roles: map })
    }

    pub fn get(&self, name: &str) -> Result<Arc<Role>> {
        self.roles
            .get(name)
            .cloned()
            .ok_or_else(|| AnalyzerError::RoleNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.roles.keys().map(|s| s.as_str()).collect()
    }

    pub fn all(&self) -> Vec<Arc<Role>> {
        self.roles.values().cloned().collect()
    }
}

/// The four analysis roles of the document pipeline.
pub fn builtin_roles() -> Vec<Role> {
    let document_capabilities = vec![crate::capability::READ_FINANCIAL_DOCUMENT.to_string()];

    vec![
        Role {
            name: VERIFIER.to_string(),
            goal: "Verify whether the uploaded file is a valid financial document \
                   and extract relevant financial information safely."
                .to_string(),
            backstory: "You specialize in verifying financial documents including earnings \
                        reports, financial statements, and investment reports. You ensure \
                        document authenticity."
                .to_string(),
            capabilities: document_capabilities.clone(),
            max_iterations: 2,
            max_requests_per_minute: 10,
        },
        Role {
            name: FINANCIAL_ANALYST.to_string(),
            goal: "Analyze financial documents thoroughly and provide accurate financial \
                   insights, investment recommendations, and key financial metrics based \
                   on real document data."
                .to_string(),
            backstory: "You are an experienced financial analyst with deep expertise in \
                        reading financial statements, annual reports, balance sheets, and \
                        income statements. You provide data-driven insights and \
                        professional financial analysis."
                .to_string(),
            capabilities: document_capabilities.clone(),
            max_iterations: 3,
            max_requests_per_minute: 10,
        },
        Role {
            name: INVESTMENT_ADVISOR.to_string(),
            goal: "Provide investment recommendations based strictly on financial document \
                   analysis and real financial indicators."
                .to_string(),
            backstory: "You are a certified investment advisor who helps investors make \
                        informed decisions based on financial reports and company \
                        performance."
                .to_string(),
            capabilities: document_capabilities.clone(),
            max_iterations: 3,
            max_requests_per_minute: 10,
        },
        Role {
            name: RISK_ASSESSOR.to_string(),
            goal: "Identify financial risks, company weaknesses, and potential investment \
                   risks based on financial document analysis."
                .to_string(),
            backstory: "You specialize in identifying financial risks such as liquidity \
                        risk, market risk, operational risk, and financial instability."
                .to_string(),
            capabilities: document_capabilities,
            max_iterations: 3,
            max_requests_per_minute: 10,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::create_default_registry;

    #[test]
    fn test_builtin_roles_register() {
        let capabilities = create_default_registry();
        let registry = RoleRegistry::new(builtin_roles(), &capabilities).unwrap();

        assert_eq!(registry.names().len(), 4);
        let analyst = registry.get(FINANCIAL_ANALYST).unwrap();
        assert_eq!(analyst.max_iterations, 3);
        assert!(!analyst.goal.is_empty());
    }

    #[test]
    fn test_unknown_role_lookup_fails() {
        let capabilities = create_default_registry();
        let registry = RoleRegistry::new(builtin_roles(), &capabilities).unwrap();

        assert!(matches!(
            registry.get("Astrologer"),
            Err(AnalyzerError::RoleNotFound(_))
        ));
    }

    #[test]
    fn test_unregistered_capability_rejected() {
        let capabilities = create_default_registry();
        let mut roles = builtin_roles();
        roles[0].capabilities.push("web_search".to_string());

        let result = RoleRegistry::new(roles, &capabilities);
        assert!(matches!(
            result,
            Err(AnalyzerError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_empty_goal_rejected() {
        let capabilities = create_default_registry();
        let mut roles = builtin_roles();
        roles[1].goal = "  ".to_string();

        assert!(RoleRegistry::new(roles, &capabilities).is_err());
    }
}
