use serde::Deserialize;

use crate::domain::FieldTarget;

/// Body of `PUT /api/form/fields`.
#[derive(Debug, Deserialize)]
pub struct SetFieldRequest {
    /// Which input to update
    pub target: FieldTarget,

    /// New value; empty strings are accepted and flagged inline
    #[serde(default)]
    pub value: String,
}

/// Query string of the sign-in page.
#[derive(Debug, Default, Deserialize)]
pub struct SigninQuery {
    #[serde(default)]
    pub error: Option<String>,
}
