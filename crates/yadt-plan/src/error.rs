use thiserror::Error;
use yadt_uri::Uri;

/// Errors raised while planning or filtering an [`crate::ActionPlan`].
#[derive(Debug, Error)]
pub enum PlanError {
    /// A selector resolved to zero components.
    #[error("selector {selector:?} matched no components")]
    EmptySelector {
        /// The glob pattern that was given.
        selector: String,
    },
    /// `lock`/`ignore` was requested without a required message.
    #[error("a message (-m) is required for this operation")]
    MissingMessage,
    /// Filtering a plan down to handled hosts left it with no actions.
    #[error("plan is empty after removing actions on unhandled hosts")]
    PlanEmpty,
    /// A component referenced by a planned action vanished from the
    /// registry (should not happen for a read-only, already-wired
    /// registry; surfaced rather than panicking).
    #[error("component not found while planning: {uri}")]
    ComponentNotFound {
        /// The missing URI.
        uri: Uri,
    },
}

/// Crate-local `Result` alias.
pub type Result<T> = std::result::Result<T, PlanError>;
