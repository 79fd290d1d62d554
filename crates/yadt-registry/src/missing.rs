use serde::{Deserialize, Serialize};
use yadt_uri::Uri;

use crate::component::Base;
use crate::state::ComponentState;

/// A sentinel materialized when the registry is in auto-fill mode and an
/// unknown URI is looked up during wiring. Always `state = Missing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingComponent {
    pub(crate) base: Base,
    /// The owning host's URI, if this sentinel's own URI names one
    /// (`host://`, `service://`, `artefact://` all do; only a malformed
    /// URI wouldn't).
    pub host_uri: Option<Uri>,
}

impl MissingComponent {
    /// Materialize a placeholder for `uri`.
    pub fn new(uri: Uri) -> Self {
        let host_uri = match uri.kind() {
            yadt_uri::ComponentKind::Host => None,
            _ => Some(uri.host_uri()),
        };
        Self {
            base: Base::new(uri, ComponentState::Missing),
            host_uri,
        }
    }

    /// This placeholder's URI.
    pub fn uri(&self) -> &Uri {
        &self.base.uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yadt_uri::ComponentKind;

    #[test]
    fn missing_component_state_is_missing() {
        let uri = Uri::new(ComponentKind::Service, "web01", Some("backend".to_string()), None);
        let m = MissingComponent::new(uri.clone());
        assert_eq!(m.base.state, ComponentState::Missing);
        assert_eq!(m.host_uri, Some(uri.host_uri()));
    }

    #[test]
    fn missing_host_has_no_host_uri() {
        let uri = Uri::new(ComponentKind::Host, "web01", None, None);
        let m = MissingComponent::new(uri);
        assert_eq!(m.host_uri, None);
    }
}
