use thiserror::Error;
use yadt_plan::Verb;
use yadt_uri::Uri;

/// Errors raised by the executor itself, as opposed to individual action
/// failures (which are aggregated into [`crate::Outcome::failed`] instead
/// of short-circuiting the run).
#[derive(Debug, Error)]
pub enum ExecError {
    /// A verb doesn't apply to the kind of component it targets (spec.md
    /// §6's exit code 2, "unknown verb on component").
    #[error("verb {verb} does not apply to {uri}")]
    UnsupportedVerb {
        /// The verb that was attempted.
        verb: Verb,
        /// The component it was attempted on.
        uri: Uri,
    },
    /// An action named a component the registry no longer holds.
    #[error("component not found while executing: {uri}")]
    ComponentNotFound {
        /// The missing URI.
        uri: Uri,
    },
    /// A remote process could not be spawned or its I/O failed.
    #[error(transparent)]
    Process(#[from] yadt_process::Error),
    /// A component-level policy denied the operation (e.g. stopping a
    /// readonly service).
    #[error(transparent)]
    Component(#[from] yadt_registry::ComponentError),
    /// One or more actions in the plan failed or were left permanently
    /// blocked by a failed precondition (spec.md §4.7's
    /// `ActionException("Could not execute K action(s)", K)`).
    #[error("could not execute {count} action(s)")]
    ActionsFailed {
        /// How many actions failed or were blocked.
        count: usize,
    },
}

/// Crate-local `Result` alias.
pub type Result<T> = std::result::Result<T, ExecError>;
