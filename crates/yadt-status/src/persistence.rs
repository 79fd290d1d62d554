use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use yadt_registry::{Component, ComponentState, Registry};

use crate::error::Error;

/// A durable, serde-friendly mirror of a [`Registry`], sufficient to
/// reconstruct it — the binary form spec.md §6 calls `current_state.
/// components`.
///
/// The registry struct itself intentionally has no `Serialize`/
/// `Deserialize` impl (it also carries wiring-mode state that has no
/// business surviving a round trip); this snapshot is the crate's own
/// boundary type for the durable-binary requirement, storing the full
/// `Component` list so a later run can rebuild a working registry
/// rather than just a dump of identities, enriched from the corpus's
/// `bincode` usage (`harborgrid-justin-rusty-db`, `spineldb-spineldb`)
/// since the teacher has no direct analog for a binary snapshot format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Every component, in full — enough to rebuild the registry via
    /// [`RegistrySnapshot::into_registry`].
    pub components: Vec<Component>,
}

impl RegistrySnapshot {
    /// Capture every component from `registry`.
    pub fn capture(registry: &Registry) -> Self {
        Self {
            components: registry.iter().cloned().collect(),
        }
    }

    /// Rebuild a registry from this snapshot, rewiring `needed_by` edges
    /// and artefact aliases exactly as the status pipeline that produced
    /// it did.
    pub fn into_registry(self) -> Registry {
        Registry::from_components(self.components)
    }

    /// Encode this snapshot with `bincode`.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::Snapshot(e.to_string()))
    }

    /// Decode a previously-encoded snapshot.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(snapshot, _)| snapshot)
            .map_err(|e| Error::Snapshot(e.to_string()))
    }
}

/// Load the registry snapshot persisted under `out_dir` by a prior
/// `status` run. The registry is built by the status pipeline and is
/// read-only for the rest of a run — every other verb loads it rather
/// than re-probing the fleet.
pub fn load_registry(out_dir: &Path) -> Result<Registry, Error> {
    let bytes = std::fs::read(out_dir.join("current_state.components"))
        .map_err(|_| Error::NoSnapshot { out_dir: out_dir.to_path_buf() })?;
    Ok(RegistrySnapshot::decode(&bytes)?.into_registry())
}

/// Write the three newline-delimited URI manifests (`artefacts`,
/// `services`, `hosts`), the binary snapshot, and the one-line
/// `statusline` summary under `out_dir`.
pub fn persist_registry(out_dir: &Path, registry: &Registry) -> Result<(), Error> {
    std::fs::create_dir_all(out_dir)?;

    let mut artefacts = Vec::new();
    let mut services = Vec::new();
    let mut hosts = Vec::new();
    let mut counts: BTreeMap<ComponentState, usize> = BTreeMap::new();

    for component in registry.iter() {
        *counts.entry(component.state()).or_default() += 1;
        match component {
            Component::Artefact(_) => artefacts.push(component.uri().to_string()),
            Component::Service(_) | Component::ReadonlyService(_) => {
                services.push(component.uri().to_string())
            }
            Component::Host(_) | Component::Unreachable(_) | Component::Ignored(_) => {
                hosts.push(component.uri().to_string())
            }
            Component::Missing(_) => {}
        }
    }
    artefacts.sort();
    services.sort();
    hosts.sort();

    write_manifest(&out_dir.join("artefacts"), &artefacts)?;
    write_manifest(&out_dir.join("services"), &services)?;
    write_manifest(&out_dir.join("hosts"), &hosts)?;

    let snapshot = RegistrySnapshot::capture(registry);
    std::fs::write(out_dir.join("current_state.components"), snapshot.encode()?)?;

    let timestamp = chrono::Utc::now().to_rfc3339();
    let statusline = render_statusline(&counts);
    std::fs::write(out_dir.join("statusline"), format!("{timestamp} {statusline}\n"))?;

    Ok(())
}

fn write_manifest(path: &Path, uris: &[String]) -> Result<(), Error> {
    let mut content = uris.join("\n");
    if !uris.is_empty() {
        content.push('\n');
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// A one-line human summary of state counts, e.g.
/// `"3 uptodate, 1 update_needed, 2 up, 1 down"`.
pub fn render_statusline(counts: &BTreeMap<ComponentState, usize>) -> String {
    counts
        .iter()
        .map(|(state, count)| format!("{count} {state}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Persist a host's raw decoded form as `current_state_<host>.yaml`.
pub fn write_host_yaml(out_dir: &Path, host: &str, record: &crate::record::HostRecord) -> Result<(), Error> {
    let yaml = serde_yaml::to_string(record).map_err(|e| Error::Snapshot(e.to_string()))?;
    std::fs::write(out_dir.join(format!("current_state_{host}.yaml")), yaml)?;
    Ok(())
}

/// Persist a host's raw probe stdout as `<log_file>.<host>.status`.
pub fn write_host_data_to_file(log_file: &Path, host: &str, raw_stdout: &str) -> Result<(), Error> {
    let path: PathBuf = {
        let mut name = log_file.as_os_str().to_owned();
        name.push(format!(".{host}.status"));
        PathBuf::from(name)
    };
    std::fs::write(path, raw_stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yadt_registry::Host;

    #[test]
    fn snapshot_round_trips() {
        let mut registry = Registry::new();
        registry.insert(Component::Host(Host::new("web01", "web01.example.com")));
        registry.wire();

        let snapshot = RegistrySnapshot::capture(&registry);
        let bytes = snapshot.encode().unwrap();
        let decoded = RegistrySnapshot::decode(&bytes).unwrap();
        assert_eq!(decoded.components.len(), snapshot.components.len());
    }

    #[test]
    fn load_registry_round_trips_a_persisted_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new();
        registry.insert(Component::Host(Host::new("web01", "web01.example.com")));
        registry.wire();

        persist_registry(dir.path(), &registry).unwrap();
        let loaded = load_registry(dir.path()).unwrap();
        assert_eq!(loaded.len(), registry.len());
    }

    #[test]
    fn load_registry_without_a_prior_status_run_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_registry(dir.path()), Err(Error::NoSnapshot { .. })));
    }

    #[test]
    fn persists_manifests_and_statusline() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new();
        registry.insert(Component::Host(Host::new("web01", "web01.example.com")));
        registry.wire();

        persist_registry(dir.path(), &registry).unwrap();
        assert!(dir.path().join("hosts").exists());
        assert!(dir.path().join("artefacts").exists());
        assert!(dir.path().join("services").exists());
        assert!(dir.path().join("current_state.components").exists());
        let statusline = std::fs::read_to_string(dir.path().join("statusline")).unwrap();
        assert!(!statusline.is_empty());
    }
}
