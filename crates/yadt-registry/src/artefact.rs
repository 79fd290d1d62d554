use serde::{Deserialize, Serialize};
use yadt_uri::{ComponentKind, Revision, Uri};

use crate::component::Base;
use crate::state::ComponentState;

/// A named, versioned package installed on a host.
///
/// Materialized twice per `name/version` entry in a host record: once
/// under its canonical versioned URI, once under its revision-alias URI
/// (`current` or `next`), both denoting the same logical artefact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artefact {
    pub(crate) base: Base,
    /// The host this artefact is installed on.
    pub host_uri: Uri,
    /// Artefact name.
    pub name: String,
    /// Concrete version string.
    pub version: String,
    /// Which of the host's artefact lists this entry came from.
    pub revision: Revision,
}

impl Artefact {
    /// Parse a `name/version` entry (as found in `current_artefacts` /
    /// `next_artefacts`) into an artefact under its canonical versioned
    /// URI. State is always `Installed`.
    pub fn from_entry(host_uri: Uri, host: &str, entry: &str, revision: Revision) -> Option<Self> {
        let (name, version) = entry.split_once('/')?;
        let uri = Uri::new(
            ComponentKind::Artefact,
            host.to_string(),
            Some(name.to_string()),
            Some(version.to_string()),
        );
        let mut base = Base::new(uri, ComponentState::Installed);
        base.needs.insert(host_uri.clone());
        Some(Self {
            base,
            host_uri,
            name: name.to_string(),
            version: version.to_string(),
            revision,
        })
    }

    /// This artefact's canonical, versioned URI.
    pub fn uri(&self) -> &Uri {
        &self.base.uri
    }

    /// This artefact's revision-alias URI (`.../<name>/current` or
    /// `.../<name>/next`), under which it is additionally indexed.
    pub fn alias_uri(&self) -> Uri {
        self.uri().change_version(self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_slash_version() {
        let host_uri = Uri::new(ComponentKind::Host, "web01", None, None);
        let a = Artefact::from_entry(host_uri, "web01", "myapp/14", Revision::Current).unwrap();
        assert_eq!(a.name, "myapp");
        assert_eq!(a.version, "14");
        assert_eq!(a.uri().to_string(), "artefact://web01/myapp/14");
        assert_eq!(a.alias_uri().to_string(), "artefact://web01/myapp/current");
    }

    #[test]
    fn rejects_malformed_entry() {
        let host_uri = Uri::new(ComponentKind::Host, "web01", None, None);
        assert!(Artefact::from_entry(host_uri, "web01", "myapp-no-version", Revision::Next).is_none());
    }
}
