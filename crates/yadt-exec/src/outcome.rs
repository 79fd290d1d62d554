use yadt_plan::Verb;
use yadt_uri::Uri;

/// One action that did not complete successfully, with whatever exit code
/// or error text is available for the operator.
#[derive(Debug, Clone)]
pub struct FailedAction {
    /// The action's verb and target.
    pub key: (Verb, Uri),
    /// The remote exit code, if the process actually ran.
    pub exit_code: Option<i32>,
    /// A human-readable reason (stderr, an infrastructure error, or why it
    /// was never dispatched).
    pub reason: String,
}

/// The result of running a full [`yadt_plan::ActionPlan`] to completion.
///
/// Mirrors spec.md §4.7's drain behavior: every action either succeeds,
/// fails, or (only under cancellation) is left undispatched.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Actions that completed successfully.
    pub succeeded: Vec<(Verb, Uri)>,
    /// Actions that failed, or were permanently blocked by a failed
    /// precondition.
    pub failed: Vec<FailedAction>,
    /// Actions never dispatched because the run was cancelled first.
    pub skipped: Vec<(Verb, Uri)>,
}

impl Outcome {
    /// True iff nothing failed (cancellation-skipped actions don't count).
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// How many actions failed, for spec.md's `"Could not execute K
    /// action(s)"` aggregate message.
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
