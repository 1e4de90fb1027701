use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{CreateRulesResponse, CreatedRules, RuleSet, GENERIC_FAILURE};

/// Why a rule set was not created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The rules API answered but did not create the rules.
    #[error("{0}")]
    Rejected(String),

    /// No usable response was received.
    #[error("{0}")]
    Transport(String),
}

impl SubmitError {
    /// Text shown to the user next to the form.
    pub fn user_message(&self) -> &str {
        match self {
            SubmitError::Rejected(msg) | SubmitError::Transport(msg) => msg,
        }
    }
}

/// Sends validated rule sets to the rules API.
#[async_trait]
pub trait RuleSubmitter: Send + Sync {
    async fn create(&self, rule_set: &RuleSet) -> Result<CreatedRules, SubmitError>;
}

/// Client for the remote rule creation endpoint.
///
/// No request timeout is set here; the transport defaults apply.
pub struct HttpRulesClient {
    client: reqwest::Client,
    create_rules_url: Url,
}

impl HttpRulesClient {
    pub fn new(client: reqwest::Client, create_rules_url: Url) -> Self {
        HttpRulesClient {
            client,
            create_rules_url,
        }
    }
}

#[async_trait]
impl RuleSubmitter for HttpRulesClient {
    async fn create(&self, rule_set: &RuleSet) -> Result<CreatedRules, SubmitError> {
        let response = self
            .client
            .post(self.create_rules_url.clone())
            .json(rule_set)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Create rules request failed");
                SubmitError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let parsed = match serde_json::from_slice::<CreateRulesResponse>(&body) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(status = status.as_u16(), error = %e, "Unparseable create rules response");
                None
            }
        };

        let result = interpret(status.is_success(), parsed);
        match &result {
            Ok(created) => info!(
                event_type = rule_set.event_type(),
                created = created.count(),
                "Rules created"
            ),
            Err(e) => warn!(
                event_type = rule_set.event_type(),
                status = status.as_u16(),
                error = %e,
                "Rules API refused rule set"
            ),
        }
        result
    }
}

/// Map an HTTP outcome and optional body to a creation result.
fn interpret(
    status_ok: bool,
    body: Option<CreateRulesResponse>,
) -> Result<CreatedRules, SubmitError> {
    match body {
        Some(CreateRulesResponse {
            success: true,
            created_rule_ids: Some(ids),
            ..
        }) if status_ok => Ok(CreatedRules { ids }),
        Some(resp) => Err(SubmitError::Rejected(
            resp.error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        )),
        None => Err(SubmitError::Rejected(GENERIC_FAILURE.to_string())),
    }
}
