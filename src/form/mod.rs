pub mod controller;
pub mod store;

pub use controller::{FormError, FormPhase, MessageKind, RuleEntry, RuleForm, SubmitMessage};
pub use store::{FormStore, SubmissionGuard};
