use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use yadt_uri::Uri;

use crate::artefact::Artefact;
use crate::host::{Host, IgnoredHost, UnreachableHost};
use crate::missing::MissingComponent;
use crate::service::{ReadonlyService, Service};
use crate::state::ComponentState;

/// Fields and invariants shared by every component kind.
///
/// Components hold peer URIs, never peer components — the registry is the
/// sole owner of the graph (see `yadt-registry`'s design notes). `needs`
/// and `needed_by` are `BTreeSet`s rather than hash sets so iteration
/// order (and therefore anything derived from it, like dependency score
/// tiebreaking) is deterministic without an extra sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Base {
    /// This component's canonical URI.
    pub uri: Uri,
    /// Current lifecycle state.
    pub state: ComponentState,
    /// URIs this component depends on.
    pub needs: BTreeSet<Uri>,
    /// URIs of components that depend on this one (rebuilt by wiring, not
    /// hand-maintained).
    pub needed_by: BTreeSet<Uri>,
}

impl Base {
    /// A fresh `Base` with no dependencies wired yet.
    pub fn new(uri: Uri, state: ComponentState) -> Self {
        Self {
            uri,
            state,
            needs: BTreeSet::new(),
            needed_by: BTreeSet::new(),
        }
    }
}

/// Any addressable entity in a registry.
///
/// This is the typed union of every component kind spec.md names. Shared
/// behavior (`uri`, `state`, `needs`, `is_up`, `dump`, ...) is dispatched
/// through inherent methods on this enum rather than a trait object, since
/// the registry needs to match on kind anyway (wiring, persistence,
/// dependency-score BFS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Component {
    /// A reachable, fully described host.
    Host(Host),
    /// A host that could not be reached over SSH.
    Unreachable(UnreachableHost),
    /// A host administratively excluded from mutating operations.
    Ignored(IgnoredHost),
    /// A service declared by a host.
    Service(Service),
    /// A stand-in for a service referenced but never found.
    ReadonlyService(ReadonlyService),
    /// An installed artefact.
    Artefact(Artefact),
    /// A sentinel for a URI referenced but never materialized.
    Missing(MissingComponent),
}

impl Component {
    /// This component's canonical URI.
    pub fn uri(&self) -> &Uri {
        &self.base().uri
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ComponentState {
        self.base().state
    }

    /// URIs this component depends on.
    pub fn needs(&self) -> &BTreeSet<Uri> {
        &self.base().needs
    }

    /// URIs of components depending on this one.
    pub fn needed_by(&self) -> &BTreeSet<Uri> {
        &self.base().needed_by
    }

    /// True for the "up"-equivalent states.
    pub fn is_up(&self) -> bool {
        self.state().is_up()
    }

    /// True when state is still `Unknown`.
    pub fn is_unknown(&self) -> bool {
        self.state().is_unknown()
    }

    /// The `host://` URI that owns this component, if any (a `Host`
    /// variant and its placeholders have none — they *are* the host).
    pub fn host_uri(&self) -> Option<Uri> {
        match self {
            Component::Host(_) | Component::Unreachable(_) | Component::Ignored(_) => None,
            Component::Service(s) => Some(s.host_uri.clone()),
            Component::ReadonlyService(s) => Some(s.host_uri.clone()),
            Component::Artefact(a) => Some(a.host_uri.clone()),
            Component::Missing(m) => m.host_uri.clone(),
        }
    }

    /// Stable, human-readable summary used in logs and `statusline`.
    pub fn dump(&self) -> String {
        format!("{} [{}]", self.uri(), self.state())
    }

    pub(crate) fn base(&self) -> &Base {
        match self {
            Component::Host(h) => &h.base,
            Component::Unreachable(h) => &h.base,
            Component::Ignored(h) => &h.base,
            Component::Service(s) => &s.base,
            Component::ReadonlyService(s) => &s.base,
            Component::Artefact(a) => &a.base,
            Component::Missing(m) => &m.base,
        }
    }

    pub(crate) fn base_mut(&mut self) -> &mut Base {
        match self {
            Component::Host(h) => &mut h.base,
            Component::Unreachable(h) => &mut h.base,
            Component::Ignored(h) => &mut h.base,
            Component::Service(s) => &mut s.base,
            Component::ReadonlyService(s) => &mut s.base,
            Component::Artefact(a) => &mut a.base,
            Component::Missing(m) => &mut m.base,
        }
    }

    /// Add `needed_by` to this component's reverse-edge index. Used only
    /// by the registry during wiring.
    pub(crate) fn add_needed_by(&mut self, uri: Uri) {
        self.base_mut().needed_by.insert(uri);
    }

    /// Rewrite `self.needs` in place (used to collapse revision aliases
    /// to canonical artefact URIs during wiring).
    pub(crate) fn replace_need(&mut self, old: &Uri, new: Uri) {
        let base = self.base_mut();
        if base.needs.remove(old) {
            base.needs.insert(new);
        }
    }
}
