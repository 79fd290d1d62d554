use thiserror::Error;
use yadt_uri::Uri;

/// Errors raised by component operations and by the registry.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// `lock`/`ignore` called without a required message.
    #[error("a message is required for this operation on {uri}")]
    InvalidArgument {
        /// The component the call targeted.
        uri: Uri,
    },
    /// An operation is forbidden for this component kind, e.g. stopping a
    /// [`crate::ReadonlyService`].
    #[error("operation not permitted on {uri}: {reason}")]
    PolicyDenied {
        /// The component the call targeted.
        uri: Uri,
        /// Human-readable reason.
        reason: String,
    },
    /// A service spec named a `class` that no registered factory provides.
    #[error("no service implementation registered for class {class:?}")]
    UnknownServiceClass {
        /// The unresolved class name.
        class: String,
    },
    /// The registry was queried in strict mode for a URI it does not hold.
    #[error("component not found: {uri}")]
    NotFound {
        /// The URI that was looked up.
        uri: Uri,
    },
}

impl ComponentError {
    /// Build an [`ComponentError::InvalidArgument`] for `uri`.
    pub fn invalid_argument(uri: &Uri) -> Self {
        ComponentError::InvalidArgument { uri: uri.clone() }
    }

    /// Build a [`ComponentError::PolicyDenied`] for `uri` with `reason`.
    pub fn policy_denied(uri: &Uri, reason: impl Into<String>) -> Self {
        ComponentError::PolicyDenied {
            uri: uri.clone(),
            reason: reason.into(),
        }
    }
}
