use serde::{Deserialize, Serialize};

/// Fallback shown when the rules API fails without an error message.
pub const GENERIC_FAILURE: &str = "Failed to create rules";

/// Response body of the rule creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRulesResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_rule_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
}

impl CreateRulesResponse {
    pub fn created(ids: Vec<String>) -> Self {
        CreateRulesResponse {
            success: true,
            created_rule_ids: Some(ids),
            error: None,
            error_code: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        CreateRulesResponse {
            success: false,
            created_rule_ids: None,
            error: Some(error.into()),
            error_code: None,
        }
    }
}

/// Identifiers of rules accepted by the rules API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedRules {
    pub ids: Vec<String>,
}

impl CreatedRules {
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    /// User-facing confirmation.
    pub fn message(&self) -> String {
        format!("Successfully created {} rule(s)!", self.count())
    }
}
