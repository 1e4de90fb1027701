pub mod rules;

pub use rules::{HttpRulesClient, RuleSubmitter, SubmitError};
