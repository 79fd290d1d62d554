use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use yadt_registry::{LockState, ServiceSpec};

use crate::error::Error;

/// Extra, rarely-used settings a host record may carry under `defaults`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    /// Directory the remote minion keeps its lock file in.
    #[serde(rename = "YADT_LOCK_DIR", default)]
    pub yadt_lock_dir: Option<String>,
}

/// The decoded shape of `/usr/bin/yadt-status`'s stdout: a host record,
/// JSON by default with a YAML fallback (see [`decode_host_record`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    /// Fully qualified domain name.
    pub fqdn: String,
    /// Short hostname as the minion sees itself.
    pub hostname: String,
    /// Declared services, normalized from either the modern map form or
    /// the legacy list-of-single-entry-maps form.
    #[serde(default, deserialize_with = "deserialize_services")]
    pub services: BTreeMap<String, ServiceSpec>,
    /// `name/version` strings currently installed.
    #[serde(default)]
    pub current_artefacts: Vec<String>,
    /// `name/version` strings targeted by the next update.
    #[serde(default)]
    pub next_artefacts: Vec<String>,
    /// Advisory lock record, if locked.
    #[serde(default)]
    pub lockstate: Option<LockState>,
    /// Whether a kernel reboot is needed to activate what's installed.
    #[serde(default)]
    pub reboot_required_to_activate_latest_kernel: bool,
    /// Whether the next update will require a reboot.
    #[serde(default)]
    pub reboot_required_after_next_update: bool,
    /// Minion-side defaults.
    #[serde(default)]
    pub defaults: Defaults,
    /// Artefact names this host's services declare a dependency on.
    #[serde(default)]
    pub handled_artefacts: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ServicesRepr {
    Map(BTreeMap<String, ServiceSpec>),
    LegacyList(Vec<BTreeMap<String, ServiceSpec>>),
}

fn deserialize_services<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, ServiceSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    match ServicesRepr::deserialize(deserializer)? {
        ServicesRepr::Map(map) => Ok(map),
        ServicesRepr::LegacyList(entries) => {
            let mut merged = BTreeMap::new();
            for entry in entries {
                merged.extend(entry);
            }
            Ok(merged)
        }
    }
}

/// Decode a host record from `/usr/bin/yadt-status`'s stdout: JSON first,
/// falling back to YAML on parse failure.
pub fn decode_host_record(raw: &str) -> Result<HostRecord, Error> {
    match serde_json::from_str::<HostRecord>(raw) {
        Ok(record) => Ok(record),
        Err(json_err) => serde_yaml::from_str::<HostRecord>(raw)
            .map_err(|yaml_err| Error::Decode { json_err, yaml_err }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_json() {
        let raw = r#"{"fqdn":"web01.example.com","hostname":"web01","current_artefacts":["myapp/14"]}"#;
        let record = decode_host_record(raw).unwrap();
        assert_eq!(record.hostname, "web01");
        assert_eq!(record.current_artefacts, vec!["myapp/14"]);
    }

    #[test]
    fn falls_back_to_yaml() {
        let raw = "fqdn: web01.example.com\nhostname: web01\ncurrent_artefacts:\n  - myapp/14\n";
        let record = decode_host_record(raw).unwrap();
        assert_eq!(record.hostname, "web01");
    }

    #[test]
    fn normalizes_legacy_list_services() {
        let raw = r#"{"fqdn":"web01.example.com","hostname":"web01","services":[{"nginx":{"state":"up"}},{"backend":{"state":"down"}}]}"#;
        let record = decode_host_record(raw).unwrap();
        assert_eq!(record.services.len(), 2);
        assert!(record.services.contains_key("nginx"));
        assert!(record.services.contains_key("backend"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_host_record("not json, not yaml: [[[").is_err());
    }
}
