use serde::{Deserialize, Serialize};
use std::fmt;

/// A named validation check submitted for an event type.
///
/// `query` is opaque here; the rules API is responsible for interpreting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub error_message: String,
    pub query: String,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        error_message: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Rule {
            name: name.into(),
            error_message: error_message.into(),
            query: query.into(),
        }
    }

    /// Value of a single field.
    pub fn field(&self, field: RuleField) -> &str {
        match field {
            RuleField::Name => &self.name,
            RuleField::ErrorMessage => &self.error_message,
            RuleField::Query => &self.query,
        }
    }

    pub fn field_mut(&mut self, field: RuleField) -> &mut String {
        match field {
            RuleField::Name => &mut self.name,
            RuleField::ErrorMessage => &mut self.error_message,
            RuleField::Query => &mut self.query,
        }
    }

    /// Fields that are currently empty, in declaration order.
    pub fn missing_fields(&self) -> impl Iterator<Item = RuleField> + '_ {
        RuleField::ALL
            .into_iter()
            .filter(move |f| is_missing(self.field(*f)))
    }
}

/// Editable fields of a [`Rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Name,
    ErrorMessage,
    Query,
}

impl RuleField {
    pub const ALL: [RuleField; 3] = [RuleField::Name, RuleField::ErrorMessage, RuleField::Query];

    /// Inline message shown when the field is left empty.
    pub fn required_message(&self) -> &'static str {
        match self {
            RuleField::Name => "Rule name is required",
            RuleField::ErrorMessage => "Error message is required",
            RuleField::Query => "Query is required",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleField::Name => "name",
            RuleField::ErrorMessage => "error_message",
            RuleField::Query => "query",
        }
    }
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message shown when the event type is left empty.
pub const EVENT_TYPE_REQUIRED: &str = "Event type is required";

/// Addresses one input of the rule form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTarget {
    EventType,
    Rule { index: usize, field: RuleField },
}

impl fmt::Display for FieldTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldTarget::EventType => write!(f, "event_type"),
            FieldTarget::Rule { index, field } => write!(f, "rules.{}.{}", index, field),
        }
    }
}

/// A required value that was left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub target: FieldTarget,
    pub message: &'static str,
}

impl FieldError {
    pub fn required(target: FieldTarget) -> Self {
        let message = match target {
            FieldTarget::EventType => EVENT_TYPE_REQUIRED,
            FieldTarget::Rule { field, .. } => field.required_message(),
        };
        FieldError { target, message }
    }
}

/// Submission payload: one event type and its ordered, non-empty rules.
///
/// Only constructible through [`RuleSet::new`], so a value of this type is
/// always submittable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    event_type: String,
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Validate and build a rule set, collecting every empty required field.
    pub fn new(event_type: impl Into<String>, rules: Vec<Rule>) -> Result<Self, RuleSetError> {
        let event_type = event_type.into();
        let errors = validate(&event_type, &rules);

        if rules.is_empty() {
            return Err(RuleSetError::NoRules);
        }
        if !errors.is_empty() {
            return Err(RuleSetError::MissingFields(errors));
        }

        Ok(RuleSet { event_type, rules })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Reasons a rule set cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleSetError {
    #[error("at least one rule is required")]
    NoRules,

    #[error("{} required field(s) are empty", .0.len())]
    MissingFields(Vec<FieldError>),
}

/// Collect the required-value errors for an event type and its rules.
pub fn validate(event_type: &str, rules: &[Rule]) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if is_missing(event_type) {
        errors.push(FieldError::required(FieldTarget::EventType));
    }

    for (index, rule) in rules.iter().enumerate() {
        errors.extend(
            rule.missing_fields()
                .map(|field| FieldError::required(FieldTarget::Rule { index, field })),
        );
    }

    errors
}

/// A required value is missing only when nothing was entered.
#[inline]
pub fn is_missing(value: &str) -> bool {
    value.is_empty()
}
