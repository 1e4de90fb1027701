use serde::Serialize;

use crate::domain::FieldError;
use crate::form::{RuleForm, SubmitMessage};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_forms: usize,
}

/// Outcome of a submit request that reached the rules API.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(flatten)]
    pub message: SubmitMessage,
    pub form: RuleForm,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,

    /// Per-field required-value errors, when the form failed validation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
            fields: Vec::new(),
        }
    }

    pub fn validation(fields: Vec<FieldError>) -> Self {
        ErrorResponse {
            error: format!("{} required field(s) are empty", fields.len()),
            code: "VALIDATION_FAILED".to_string(),
            fields,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "NOT_FOUND")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "CONFLICT")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "INTERNAL_ERROR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldTarget;

    #[test]
    fn test_validation_error_serialization() {
        let resp = ErrorResponse::validation(vec![FieldError::required(FieldTarget::EventType)]);

        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["code"], "VALIDATION_FAILED");
        assert_eq!(json["fields"][0]["target"], "event_type");
        assert_eq!(json["fields"][0]["message"], "Event type is required");
    }

    #[test]
    fn test_plain_error_omits_fields() {
        let json = serde_json::to_string(&ErrorResponse::conflict("busy")).unwrap();

        assert!(json.contains("CONFLICT"));
        assert!(!json.contains("fields"));
    }

    #[test]
    fn test_submit_response_flattens_message() {
        let resp = SubmitResponse {
            message: SubmitMessage::success("Successfully created 1 rule(s)!"),
            form: RuleForm::new(),
        };

        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["kind"], "success");
        assert_eq!(json["message"], "Successfully created 1 rule(s)!");
        assert_eq!(json["form"]["rules"].as_array().unwrap().len(), 1);
    }
}
