use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::client::SubmitError;
use crate::domain::rule::{is_missing, validate, EVENT_TYPE_REQUIRED};
use crate::domain::{CreatedRules, FieldError, FieldTarget, Rule, RuleField, RuleSet, RuleSetError};

/// Errors returned by form operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("rule index {index} out of range (form has {len} rules)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("the last remaining rule cannot be removed")]
    LastRule,

    #[error("a submission is already in progress")]
    Busy,

    #[error("{} required field(s) are empty", .0.len())]
    Invalid(Vec<FieldError>),
}

/// One rule row of the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEntry {
    /// Stable row key, unaffected by removals before it
    pub id: Uuid,

    #[serde(flatten)]
    pub rule: Rule,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<RuleField, &'static str>,
}

impl RuleEntry {
    fn blank() -> Self {
        RuleEntry {
            id: Uuid::new_v4(),
            rule: Rule::default(),
            errors: BTreeMap::new(),
        }
    }

    fn check(&mut self, field: RuleField) {
        if is_missing(self.rule.field(field)) {
            self.errors.insert(field, field.required_message());
        } else {
            self.errors.remove(&field);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    Editing,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Success,
    Error,
}

/// Outcome banner shown under the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitMessage {
    pub kind: MessageKind,
    pub message: String,

    /// Number of rules the rules API created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<usize>,
}

impl SubmitMessage {
    pub fn success(message: impl Into<String>) -> Self {
        SubmitMessage {
            kind: MessageKind::Success,
            message: message.into(),
            created: None,
        }
    }

    /// Success banner for rules the rules API accepted.
    pub fn created(created: &CreatedRules) -> Self {
        SubmitMessage {
            created: Some(created.count()),
            ..SubmitMessage::success(created.message())
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SubmitMessage {
            kind: MessageKind::Error,
            message: message.into(),
            created: None,
        }
    }
}

/// State of the rule form for one user.
///
/// Always holds at least one rule entry. While `phase` is
/// [`FormPhase::Submitting`] further submissions are refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleForm {
    event_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    event_type_error: Option<&'static str>,

    rules: Vec<RuleEntry>,

    phase: FormPhase,

    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<SubmitMessage>,

    /// Id of the submission in flight, if any
    #[serde(skip)]
    submission: Option<Uuid>,
}

impl Default for RuleForm {
    fn default() -> Self {
        RuleForm {
            event_type: String::new(),
            event_type_error: None,
            rules: vec![RuleEntry::blank()],
            phase: FormPhase::Editing,
            message: None,
            submission: None,
        }
    }
}

impl RuleForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_type_error(&self) -> Option<&'static str> {
        self.event_type_error
    }

    pub fn rules(&self) -> &[RuleEntry] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == FormPhase::Submitting
    }

    pub fn message(&self) -> Option<&SubmitMessage> {
        self.message.as_ref()
    }

    /// Id handed out by the [`begin_submit`](Self::begin_submit) call now in flight.
    pub fn submission_id(&self) -> Option<Uuid> {
        self.submission
    }

    /// Add an empty rule at the end, returning its row id.
    pub fn append(&mut self) -> Uuid {
        let entry = RuleEntry::blank();
        let id = entry.id;
        self.rules.push(entry);
        id
    }

    /// Remove the rule at `index`. The last remaining rule is never removed.
    pub fn remove(&mut self, index: usize) -> Result<Rule, FormError> {
        if self.rules.len() <= 1 {
            return Err(FormError::LastRule);
        }
        if index >= self.rules.len() {
            return Err(FormError::IndexOutOfRange {
                index,
                len: self.rules.len(),
            });
        }
        Ok(self.rules.remove(index).rule)
    }

    /// Update one input and re-check whether it is filled in.
    pub fn set_field(&mut self, target: FieldTarget, value: impl Into<String>) -> Result<(), FormError> {
        let value = value.into();
        match target {
            FieldTarget::EventType => {
                self.event_type = value;
                self.check_event_type();
            }
            FieldTarget::Rule { index, field } => {
                let len = self.rules.len();
                let entry = self
                    .rules
                    .get_mut(index)
                    .ok_or(FormError::IndexOutOfRange { index, len })?;
                *entry.rule.field_mut(field) = value;
                entry.check(field);
            }
        }
        Ok(())
    }

    /// Check every input, recording inline errors, and return the failures.
    pub fn validate(&mut self) -> Vec<FieldError> {
        self.check_event_type();
        for entry in &mut self.rules {
            for field in RuleField::ALL {
                entry.check(field);
            }
        }

        let rules: Vec<Rule> = self.rules.iter().map(|e| e.rule.clone()).collect();
        validate(&self.event_type, &rules)
    }

    /// Validate and, if everything is filled in, enter the submitting state.
    ///
    /// Returns the payload to send. Nothing changes phase when this fails.
    pub fn begin_submit(&mut self) -> Result<RuleSet, FormError> {
        self.begin_submission().map(|(rule_set, _)| rule_set)
    }

    /// [`begin_submit`](Self::begin_submit), also returning the id of the new submission.
    pub fn begin_submission(&mut self) -> Result<(RuleSet, Uuid), FormError> {
        if self.is_submitting() {
            return Err(FormError::Busy);
        }

        let errors = self.validate();
        if !errors.is_empty() {
            return Err(FormError::Invalid(errors));
        }

        let rules = self.rules.iter().map(|e| e.rule.clone()).collect();
        let rule_set = RuleSet::new(self.event_type.clone(), rules).map_err(|e| match e {
            RuleSetError::MissingFields(errors) => FormError::Invalid(errors),
            RuleSetError::NoRules => FormError::LastRule,
        })?;

        let id = Uuid::new_v4();
        self.phase = FormPhase::Submitting;
        self.submission = Some(id);
        self.message = None;
        Ok((rule_set, id))
    }

    /// Apply the outcome of the in-flight submission and leave the submitting state.
    ///
    /// Success resets the form; failures keep the entered values.
    pub fn finish(&mut self, result: &Result<CreatedRules, SubmitError>) -> SubmitMessage {
        let message = match result {
            Ok(created) => {
                self.reset();
                SubmitMessage::created(created)
            }
            Err(e) => SubmitMessage::error(e.user_message()),
        };

        self.phase = FormPhase::Editing;
        self.submission = None;
        self.message = Some(message.clone());
        message
    }

    /// [`finish`](Self::finish), but only if `id` is still the submission in flight.
    pub fn finish_submission(
        &mut self,
        id: Uuid,
        result: &Result<CreatedRules, SubmitError>,
    ) -> Option<SubmitMessage> {
        (self.submission == Some(id)).then(|| self.finish(result))
    }

    /// Leave the submitting state without an outcome.
    pub fn release(&mut self) {
        self.phase = FormPhase::Editing;
        self.submission = None;
    }

    /// [`release`](Self::release), but only if `id` is still the submission in flight.
    pub fn release_submission(&mut self, id: Uuid) -> bool {
        let current = self.submission == Some(id);
        if current {
            self.release();
        }
        current
    }

    /// Back to one blank rule and an empty event type.
    pub fn reset(&mut self) {
        self.event_type.clear();
        self.event_type_error = None;
        self.rules = vec![RuleEntry::blank()];
        self.message = None;
    }

    fn check_event_type(&mut self) {
        self.event_type_error = if is_missing(&self.event_type) {
            Some(EVENT_TYPE_REQUIRED)
        } else {
            None
        };
    }
}
