pub mod identity;
pub mod rule;
pub mod submission;

pub use identity::{Credentials, UserId, UserIdentity};
pub use rule::{FieldError, FieldTarget, Rule, RuleField, RuleSet, RuleSetError};
pub use submission::{CreateRulesResponse, CreatedRules, GENERIC_FAILURE};
