use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{RuleSubmitter, SubmitError};
use crate::domain::{CreatedRules, RuleSet, UserId};

use super::controller::{FormError, RuleForm, SubmitMessage};

#[derive(Debug)]
struct FormSlot {
    form: RuleForm,
    /// Last time the form was read or edited (for idle eviction)
    last_access: DateTime<Utc>,
}

impl FormSlot {
    fn touch(&mut self) -> &mut RuleForm {
        self.last_access = Utc::now();
        &mut self.form
    }

    fn is_idle(&self, idle_threshold_secs: i64, now: DateTime<Utc>) -> bool {
        !self.form.is_submitting() && (now - self.last_access).num_seconds() > idle_threshold_secs
    }
}

/// One rule form per signed-in user.
///
/// Forms are dropped on sign-out, or by [`evict_idle`](Self::evict_idle)
/// once their session can no longer be live.
#[derive(Debug, Default)]
pub struct FormStore {
    forms: Mutex<AHashMap<UserId, FormSlot>>,
}

impl FormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the user's form, creating a blank one on first use.
    pub fn with_form<R>(&self, user: &UserId, f: impl FnOnce(&mut RuleForm) -> R) -> R {
        let mut forms = self.forms.lock();
        let slot = forms.entry(user.clone()).or_insert_with(|| FormSlot {
            form: RuleForm::new(),
            last_access: Utc::now(),
        });
        f(slot.touch())
    }

    /// Copy of the user's current form.
    pub fn snapshot(&self, user: &UserId) -> RuleForm {
        self.with_form(user, |form| form.clone())
    }

    /// Drop the user's form. Returns whether one existed.
    pub fn discard(&self, user: &UserId) -> bool {
        self.forms.lock().remove(user).is_some()
    }

    /// Remove forms untouched for longer than `idle_threshold_secs`.
    /// Forms with a submission in flight are kept.
    ///
    /// Returns the number of forms evicted.
    pub fn evict_idle(&self, idle_threshold_secs: i64) -> usize {
        self.evict_idle_at(idle_threshold_secs, Utc::now())
    }

    fn evict_idle_at(&self, idle_threshold_secs: i64, now: DateTime<Utc>) -> usize {
        let mut forms = self.forms.lock();
        let before = forms.len();
        forms.retain(|_, slot| !slot.is_idle(idle_threshold_secs, now));
        before - forms.len()
    }

    /// Number of live forms.
    pub fn len(&self) -> usize {
        self.forms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.lock().is_empty()
    }

    /// Validate the user's form and mark it busy.
    ///
    /// The returned guard leaves the submitting state when completed or dropped.
    pub fn begin_submit(
        self: &Arc<Self>,
        user: &UserId,
    ) -> Result<(RuleSet, SubmissionGuard), FormError> {
        let (rule_set, id) = self.with_form(user, |form| form.begin_submission())?;
        let guard = SubmissionGuard {
            store: Arc::clone(self),
            user: user.clone(),
            id,
            armed: true,
        };
        Ok((rule_set, guard))
    }

    /// Submit the user's form through `submitter`.
    ///
    /// Validation failures and a submission already in flight are returned
    /// as errors without contacting the rules API.
    pub async fn submit(
        self: &Arc<Self>,
        user: &UserId,
        submitter: &dyn RuleSubmitter,
    ) -> Result<SubmitMessage, FormError> {
        let (rule_set, guard) = self.begin_submit(user)?;
        debug!(user_id = %user, event_type = rule_set.event_type(), rules = rule_set.len(), "Submitting rules");

        let result = submitter.create(&rule_set).await;
        Ok(guard.complete(&result))
    }

    fn update_existing<R>(&self, user: &UserId, f: impl FnOnce(&mut RuleForm) -> R) -> Option<R> {
        self.forms.lock().get_mut(user).map(|slot| f(&mut slot.form))
    }
}

/// Keeps a form in the submitting state until the request resolves.
///
/// Only acts on the submission it was created for. If the form was discarded
/// and a new submission started meanwhile, the outcome is not applied to it.
pub struct SubmissionGuard {
    store: Arc<FormStore>,
    user: UserId,
    id: Uuid,
    armed: bool,
}

impl SubmissionGuard {
    /// Record the outcome on the form and clear the busy flag.
    pub fn complete(mut self, result: &Result<CreatedRules, SubmitError>) -> SubmitMessage {
        self.armed = false;
        let id = self.id;
        let finished = self
            .store
            .update_existing(&self.user, |form| form.finish_submission(id, result))
            .flatten();

        // The form was discarded or a newer submission owns it.
        finished.unwrap_or_else(|| match result {
            Ok(created) => SubmitMessage::created(created),
            Err(e) => SubmitMessage::error(e.user_message()),
        })
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        if self.armed {
            info!(user_id = %self.user, "Submission abandoned before completion");
            let id = self.id;
            self.store
                .update_existing(&self.user, |form| form.release_submission(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldTarget, RuleField};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn fill(store: &FormStore, user: &UserId) {
        store.with_form(user, |form| {
            form.set_field(FieldTarget::EventType, "payment_processing")
                .unwrap();
            for (field, value) in [
                (RuleField::Name, "amount_positive"),
                (RuleField::ErrorMessage, "Amount must be positive"),
                (RuleField::Query, "amount > 0"),
            ] {
                form.set_field(FieldTarget::Rule { index: 0, field }, value)
                    .unwrap();
            }
        });
    }

    struct CountingSubmitter {
        calls: AtomicUsize,
        result: Result<CreatedRules, SubmitError>,
    }

    #[async_trait]
    impl RuleSubmitter for CountingSubmitter {
        async fn create(&self, _rule_set: &RuleSet) -> Result<CreatedRules, SubmitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    /// Blocks until released, so a submission can be observed in flight.
    struct GatedSubmitter {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RuleSubmitter for GatedSubmitter {
        async fn create(&self, _rule_set: &RuleSet) -> Result<CreatedRules, SubmitError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(CreatedRules {
                ids: vec!["r1".into()],
            })
        }
    }

    #[test]
    fn test_forms_are_per_user() {
        let store = FormStore::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        store.with_form(&alice, |form| {
            form.append();
        });

        assert_eq!(store.snapshot(&alice).len(), 2);
        assert_eq!(store.snapshot(&bob).len(), 1);
        assert_eq!(store.len(), 2);

        assert!(store.discard(&alice));
        assert!(!store.discard(&alice));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_form_never_calls_submitter() {
        let store = Arc::new(FormStore::new());
        let user = UserId::new("alice");
        let submitter = CountingSubmitter {
            calls: AtomicUsize::new(0),
            result: Ok(CreatedRules { ids: vec![] }),
        };

        let result = store.submit(&user, &submitter).await;

        assert!(matches!(result, Err(FormError::Invalid(_))));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_values_and_clears_busy() {
        let store = Arc::new(FormStore::new());
        let user = UserId::new("alice");
        fill(&store, &user);
        let submitter = CountingSubmitter {
            calls: AtomicUsize::new(0),
            result: Err(SubmitError::Transport("connection refused".into())),
        };

        let msg = store.submit(&user, &submitter).await.unwrap();

        assert_eq!(msg.message, "connection refused");
        let form = store.snapshot(&user);
        assert!(!form.is_submitting());
        assert_eq!(form.event_type(), "payment_processing");
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_refused() {
        let store = Arc::new(FormStore::new());
        let user = UserId::new("alice");
        fill(&store, &user);
        let submitter = Arc::new(GatedSubmitter {
            entered: Notify::new(),
            release: Notify::new(),
        });

        let first = {
            let store = Arc::clone(&store);
            let user = user.clone();
            let submitter = Arc::clone(&submitter);
            tokio::spawn(async move { store.submit(&user, submitter.as_ref()).await })
        };

        submitter.entered.notified().await;
        assert!(store.snapshot(&user).is_submitting());

        let second = store.submit(&user, submitter.as_ref()).await;
        assert_eq!(second, Err(FormError::Busy));

        submitter.release.notify_one();
        let msg = first.await.unwrap().unwrap();

        assert_eq!(msg.message, "Successfully created 1 rule(s)!");
        assert!(!store.snapshot(&user).is_submitting());
    }

    #[tokio::test]
    async fn test_dropped_guard_clears_busy() {
        let store = Arc::new(FormStore::new());
        let user = UserId::new("alice");
        fill(&store, &user);

        let (_rule_set, guard) = store.begin_submit(&user).unwrap();
        assert!(store.snapshot(&user).is_submitting());

        drop(guard);

        let form = store.snapshot(&user);
        assert!(!form.is_submitting());
        assert_eq!(form.event_type(), "payment_processing");
    }

    #[tokio::test]
    async fn test_complete_after_discard() {
        let store = Arc::new(FormStore::new());
        let user = UserId::new("alice");
        fill(&store, &user);

        let (_rule_set, guard) = store.begin_submit(&user).unwrap();
        store.discard(&user);

        let msg = guard.complete(&Err(SubmitError::Rejected("nope".into())));

        assert_eq!(msg.message, "nope");
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_idle() {
        let store = FormStore::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        store.snapshot(&alice);
        store.snapshot(&bob);

        assert_eq!(store.evict_idle(3600), 0);

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(store.evict_idle_at(3600, later), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_form_in_flight() {
        let store = Arc::new(FormStore::new());
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        fill(&store, &alice);
        store.snapshot(&bob);
        let (_rule_set, _guard) = store.begin_submit(&alice).unwrap();

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(store.evict_idle_at(3600, later), 1);
        assert!(store.snapshot(&alice).is_submitting());
    }

    #[tokio::test]
    async fn test_stale_outcome_leaves_new_submission_busy() {
        let store = Arc::new(FormStore::new());
        let user = UserId::new("alice");
        fill(&store, &user);
        let (_rule_set, old_guard) = store.begin_submit(&user).unwrap();

        // signed out mid-flight, signed back in and submitted again
        store.discard(&user);
        fill(&store, &user);
        let (_rule_set, new_guard) = store.begin_submit(&user).unwrap();

        let msg = old_guard.complete(&Ok(CreatedRules {
            ids: vec!["r1".into()],
        }));
        assert_eq!(msg.message, "Successfully created 1 rule(s)!");

        let form = store.snapshot(&user);
        assert!(form.is_submitting());
        assert_eq!(form.event_type(), "payment_processing");
        assert_eq!(
            store.begin_submit(&user).map(|_| ()),
            Err(FormError::Busy)
        );

        drop(new_guard);
        assert!(!store.snapshot(&user).is_submitting());
    }

    #[tokio::test]
    async fn test_stale_drop_leaves_new_submission_busy() {
        let store = Arc::new(FormStore::new());
        let user = UserId::new("alice");
        fill(&store, &user);
        let (_rule_set, old_guard) = store.begin_submit(&user).unwrap();

        store.discard(&user);
        fill(&store, &user);
        let (_rule_set, _new_guard) = store.begin_submit(&user).unwrap();

        drop(old_guard);

        assert!(store.snapshot(&user).is_submitting());
    }
}
