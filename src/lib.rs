pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod form;
pub mod observability;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use domain::{Rule, RuleSet, UserIdentity};
pub use form::{FormStore, RuleForm};
