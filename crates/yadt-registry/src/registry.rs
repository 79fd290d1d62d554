use std::collections::BTreeMap;

use tracing::debug;
use yadt_uri::Uri;

use crate::artefact::Artefact;
use crate::component::Component;
use crate::error::ComponentError;
use crate::missing::MissingComponent;

/// Whether [`Registry::get`]/[`Registry::resolve`] materialize a
/// [`MissingComponent`] on an unknown lookup (`AutoFill`, used only
/// during wiring) or report not-found (`Strict`, the rest of the time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    AutoFill,
    Strict,
}

/// A map `URI → Component`, the sole owner of the dependency graph.
///
/// Components hold only peer URIs; the registry is what actually turns a
/// URI into a live component. Built once by the status pipeline, then
/// read-only for the rest of a run — a new `status` invocation replaces
/// it wholesale rather than mutating it in place.
#[derive(Debug, Clone)]
pub struct Registry {
    components: BTreeMap<Uri, Component>,
    /// Revision-alias URI → canonical artefact URI. Keeps both alias and
    /// canonical lookups resolving to the same stored `Artefact` without
    /// requiring two owners of one value.
    aliases: BTreeMap<Uri, Uri>,
    mode: Mode,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty, strict registry.
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
            aliases: BTreeMap::new(),
            mode: Mode::Strict,
        }
    }

    /// Insert (or replace) a component under its own URI.
    ///
    /// If a component (most commonly a [`MissingComponent`]) already sits
    /// under that URI, its `needed_by` edges are carried over onto the
    /// new one — replacing a placeholder must not lose the dependents
    /// that pointed at it.
    pub fn insert(&mut self, mut component: Component) {
        let uri = component.uri().clone();
        if let Some(old) = self.components.get(&uri) {
            for by in old.needed_by().iter().cloned() {
                component.add_needed_by(by);
            }
        }
        self.components.insert(uri, component);
    }

    /// Rebuild a registry from a previously captured component list (see
    /// `yadt-status`'s persisted snapshot). Replays the same
    /// insert/insert_artefact/wire sequence the status pipeline itself
    /// uses, so the reconstructed registry's `needed_by` edges and
    /// artefact aliases come out identical to the one that produced the
    /// snapshot.
    pub fn from_components(components: impl IntoIterator<Item = Component>) -> Self {
        let mut registry = Self::new();
        for component in components {
            match component {
                Component::Artefact(a) => registry.insert_artefact(a),
                other => registry.insert(other),
            }
        }
        registry.wire();
        registry
    }

    /// Insert an artefact, indexing it under both its canonical versioned
    /// URI and its revision-alias URI.
    pub fn insert_artefact(&mut self, artefact: Artefact) {
        let alias = artefact.alias_uri();
        let canonical = artefact.uri().clone();
        self.aliases.insert(alias, canonical);
        self.insert(Component::Artefact(artefact));
    }

    fn canonicalize(&self, uri: &Uri) -> Uri {
        self.aliases.get(uri).cloned().unwrap_or_else(|| uri.clone())
    }

    /// Look up a URI (or its alias target). In `Strict` mode, an unknown
    /// key returns `None`; callers needing an error should use
    /// [`Registry::get_or_err`].
    pub fn get(&self, uri: &Uri) -> Option<&Component> {
        self.components.get(&self.canonicalize(uri))
    }

    /// Like [`Registry::get`], but returns a typed error when absent.
    pub fn get_or_err(&self, uri: &Uri) -> Result<&Component, ComponentError> {
        self.get(uri).ok_or_else(|| ComponentError::NotFound { uri: uri.clone() })
    }

    /// Mutable lookup, honoring aliasing the same way as [`Registry::get`].
    pub fn get_mut(&mut self, uri: &Uri) -> Option<&mut Component> {
        let canonical = self.canonicalize(uri);
        self.components.get_mut(&canonical)
    }

    /// Resolve `uri` to its canonical form, materializing a
    /// [`MissingComponent`] if absent and the registry is mid-wiring.
    /// Returns `NotFound` if absent outside wiring.
    pub fn resolve(&mut self, uri: &Uri) -> Result<Uri, ComponentError> {
        let canonical = self.canonicalize(uri);
        if self.components.contains_key(&canonical) {
            return Ok(canonical);
        }
        match self.mode {
            Mode::AutoFill => {
                debug!(uri = %canonical, "materializing missing component during wiring");
                self.components
                    .insert(canonical.clone(), Component::Missing(MissingComponent::new(canonical.clone())));
                Ok(canonical)
            }
            Mode::Strict => Err(ComponentError::NotFound { uri: canonical }),
        }
    }

    /// Enter auto-fill mode: subsequent [`Registry::resolve`] calls
    /// materialize placeholders instead of failing.
    pub fn wire_begin(&mut self) {
        self.mode = Mode::AutoFill;
    }

    /// Leave auto-fill mode and lock the registry for the rest of the run.
    pub fn wire_end(&mut self) {
        self.mode = Mode::Strict;
    }

    /// Run the full wiring pass: for every component's declared `needs`,
    /// resolve the target (materializing placeholders), add the reverse
    /// `needed_by` edge, and rewrite `needs` to the resolved canonical
    /// URI (collapsing `current`/`next` aliases). Brackets the pass in
    /// auto-fill/strict per spec — callers needing finer control can use
    /// [`Registry::wire_begin`]/[`Registry::wire_end`] directly.
    pub fn wire(&mut self) {
        self.wire_begin();
        let all_uris: Vec<Uri> = self.components.keys().cloned().collect();
        for uri in &all_uris {
            let Some(needed) = self.components.get(uri) else {
                continue;
            };
            let needs: Vec<Uri> = needed.needs().iter().cloned().collect();
            for needed_uri in needs {
                let canonical = self
                    .resolve(&needed_uri)
                    .expect("auto-fill mode never fails to resolve");
                if let Some(target) = self.components.get_mut(&canonical) {
                    target.add_needed_by(uri.clone());
                }
                if canonical != needed_uri {
                    if let Some(source) = self.components.get_mut(uri) {
                        source.replace_need(&needed_uri, canonical);
                    }
                }
            }
        }
        self.wire_end();
    }

    /// Number of distinct components held (aliases are not counted
    /// separately).
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True if the registry holds no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate all components, canonical-URI order.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Iterate the URIs of every `Host`, `Unreachable`, or `Ignored`
    /// placeholder — a run's full host set.
    pub fn host_uris(&self) -> impl Iterator<Item = &Uri> + '_ {
        self.components.values().filter_map(|c| match c {
            Component::Host(h) => Some(h.uri()),
            Component::Unreachable(h) => Some(h.uri()),
            Component::Ignored(h) => Some(h.uri()),
            _ => None,
        })
    }

    /// Compute a total, deterministic dependency score for every
    /// component: the number of transitive `needed_by` ancestors, with a
    /// BFS-depth tiebreaker. If `A` needs `B`, `score(B) > score(A)`
    /// (every ancestor of `A` is transitively also an ancestor of `B`,
    /// plus `A` itself) — the "score monotonicity" property holds
    /// strictly, a stronger guarantee than spec's `≥` requires.
    pub fn compute_dependency_scores(&self) -> BTreeMap<Uri, u64> {
        self.components
            .keys()
            .map(|uri| {
                let (count, depth) = self.transitive_needed_by(uri);
                (uri.clone(), (count as u64) * 1000 + depth as u64)
            })
            .collect()
    }

    fn transitive_needed_by(&self, start: &Uri) -> (usize, usize) {
        let mut visited: std::collections::BTreeSet<Uri> = std::collections::BTreeSet::new();
        let mut frontier: Vec<Uri> = self
            .components
            .get(start)
            .map(|c| c.needed_by().iter().cloned().collect())
            .unwrap_or_default();
        let mut depth = 0usize;
        while !frontier.is_empty() {
            depth += 1;
            let mut next = Vec::new();
            for uri in frontier {
                if visited.insert(uri.clone()) {
                    if let Some(c) = self.components.get(&uri) {
                        next.extend(c.needed_by().iter().cloned());
                    }
                }
            }
            frontier = next;
        }
        (visited.len(), depth)
    }

    /// Services declared on `host_uri`, ordered by ascending dependency
    /// score (dependencies sort before dependents) — the order
    /// `Host.defined_services` exposes.
    pub fn defined_services(&self, host_uri: &Uri, scores: &BTreeMap<Uri, u64>) -> Vec<Uri> {
        let mut services: Vec<Uri> = self
            .components
            .values()
            .filter_map(|c| match c {
                Component::Service(s) if &s.host_uri == host_uri => Some(s.uri().clone()),
                _ => None,
            })
            .collect();
        services.sort_by_key(|uri| scores.get(uri).copied().unwrap_or(0));
        services
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Host, ServiceSpec};
    use crate::service::Service;
    use yadt_uri::{ComponentKind, Revision};

    fn host_uri(name: &str) -> Uri {
        Uri::new(ComponentKind::Host, name, None, None)
    }

    #[test]
    fn strict_lookup_misses_return_none() {
        let registry = Registry::new();
        assert!(registry.get(&host_uri("web01")).is_none());
    }

    #[test]
    fn wiring_materializes_missing_and_adds_reverse_edge() {
        let mut registry = Registry::new();
        let host = Host::new("web01", "web01.example.com");
        let host_uri = host.uri().clone();
        registry.insert(Component::Host(host));

        let spec = ServiceSpec {
            needs_services: vec!["backend".to_string()],
            ..Default::default()
        };
        let frontend = Service::new(host_uri.clone(), "web01", "frontend", &spec);
        let frontend_uri = frontend.uri().clone();
        registry.insert(Component::Service(frontend));

        registry.wire();

        let backend_uri = Uri::parse("service://web01/backend").unwrap();
        let backend = registry.get(&backend_uri).expect("materialized as missing");
        assert!(matches!(backend, Component::Missing(_)));
        assert!(backend.needed_by().contains(&frontend_uri));
    }

    #[test]
    fn wiring_is_symmetric() {
        let mut registry = Registry::new();
        let host = Host::new("web01", "web01.example.com");
        let host_uri = host.uri().clone();
        registry.insert(Component::Host(host));
        let svc = Service::new(host_uri.clone(), "web01", "frontend", &ServiceSpec::default());
        let svc_uri = svc.uri().clone();
        registry.insert(Component::Service(svc));

        registry.wire();

        let svc_component = registry.get(&svc_uri).unwrap();
        let host_component = registry.get(&host_uri).unwrap();
        assert!(svc_component.needs().contains(&host_uri));
        assert!(host_component.needed_by().contains(&svc_uri));
    }

    #[test]
    fn alias_canonicalization_after_wiring() {
        let mut registry = Registry::new();
        let host = Host::new("web01", "web01.example.com");
        let h_uri = host.uri().clone();
        registry.insert(Component::Host(host));

        let artefact =
            Artefact::from_entry(h_uri.clone(), "web01", "myapp/14", Revision::Current).unwrap();
        let canonical_uri = artefact.uri().clone();
        registry.insert_artefact(artefact);

        let spec = ServiceSpec {
            needs_artefacts: vec!["myapp/current".to_string()],
            ..Default::default()
        };
        let svc = Service::new(h_uri, "web01", "frontend", &spec);
        registry.insert(Component::Service(svc));

        registry.wire();

        let svc_component = registry.get(&Uri::parse("service://web01/frontend").unwrap()).unwrap();
        assert!(svc_component.needs().contains(&canonical_uri));
        assert!(!svc_component
            .needs()
            .iter()
            .any(|u| u.to_string().ends_with("/current") || u.to_string().ends_with("/next")));

        let by_alias = registry
            .get(&Uri::parse("artefact://web01/myapp/current").unwrap())
            .unwrap();
        let by_canonical = registry.get(&canonical_uri).unwrap();
        assert_eq!(by_alias.uri(), by_canonical.uri());
    }

    #[test]
    fn from_components_round_trips_a_wired_registry() {
        let mut registry = Registry::new();
        let host = Host::new("web01", "web01.example.com");
        let h_uri = host.uri().clone();
        registry.insert(Component::Host(host));
        let svc = Service::new(h_uri.clone(), "web01", "frontend", &ServiceSpec::default());
        let svc_uri = svc.uri().clone();
        registry.insert(Component::Service(svc));
        registry.wire();

        let components: Vec<Component> = registry.iter().cloned().collect();
        let rebuilt = Registry::from_components(components);

        assert_eq!(rebuilt.len(), registry.len());
        assert!(rebuilt.get(&svc_uri).unwrap().needs().contains(&h_uri));
        assert!(rebuilt.get(&h_uri).unwrap().needed_by().contains(&svc_uri));
    }

    #[test]
    fn dependency_score_monotonic() {
        let mut registry = Registry::new();
        let host = Host::new("web01", "web01.example.com");
        let h_uri = host.uri().clone();
        registry.insert(Component::Host(host));
        let backend = Service::new(h_uri.clone(), "web01", "backend", &ServiceSpec::default());
        let backend_uri = backend.uri().clone();
        registry.insert(Component::Service(backend));
        let frontend_spec = ServiceSpec {
            needs_services: vec!["backend".to_string()],
            ..Default::default()
        };
        let frontend = Service::new(h_uri, "web01", "frontend", &frontend_spec);
        let frontend_uri = frontend.uri().clone();
        registry.insert(Component::Service(frontend));

        registry.wire();
        let scores = registry.compute_dependency_scores();
        assert!(scores[&backend_uri] > scores[&frontend_uri]);
    }
}
