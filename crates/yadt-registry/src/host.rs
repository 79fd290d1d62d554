use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use yadt_uri::{ComponentKind, Uri};

use crate::command::{Directive, RemoteCommand};
use crate::component::Base;
use crate::error::ComponentError;
use crate::state::ComponentState;

/// Who (if anyone) holds an advisory lock on a host, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    /// The identity that took the lock.
    pub owner: String,
    /// The message given when locking.
    pub message: String,
    /// Whether the lock was taken with `--force`.
    pub force: bool,
}

/// A single declared service entry from a host record's `services` map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Implementation class name (defaults to `"Service"` when absent).
    #[serde(default)]
    pub class: Option<String>,
    /// Freeform state description string, resolved via
    /// [`crate::state::state_from_description`].
    #[serde(default)]
    pub state: Option<String>,
    /// `"serverside"` routes status probing to the controller instead of
    /// over SSH.
    #[serde(default)]
    pub state_handling: Option<String>,
    /// Other services (bare names, qualified to this host during
    /// instantiation) this service needs.
    #[serde(default)]
    pub needs_services: Vec<String>,
    /// Artefacts (bare `name` or `name/version`) this service needs.
    #[serde(default)]
    pub needs_artefacts: Vec<String>,
}

/// A fully described, reachable host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub(crate) base: Base,
    /// Fully qualified domain name as reported by the probe.
    pub fqdn: String,
    /// Short hostname as reported by the probe (`hostname` field).
    pub hostname: String,
    /// Declared services, name → spec.
    pub services: BTreeMap<String, ServiceSpec>,
    /// `name/version` strings currently installed.
    pub current_artefacts: Vec<String>,
    /// `name/version` strings targeted by the next update.
    pub next_artefacts: Vec<String>,
    /// Advisory lock record, if locked.
    pub lockstate: Option<LockState>,
    /// Whether a kernel reboot is needed to activate what's installed.
    pub reboot_required_to_activate_latest_kernel: bool,
    /// Whether the next update will require a reboot.
    pub reboot_required_after_next_update: bool,
    /// Maximum seconds the executor should poll for SSH to come back
    /// after a reboot-triggering update.
    pub ssh_poll_max_seconds: u64,
    /// Artefact names this host's services declare a dependency on.
    pub handled_artefacts: Vec<String>,
}

impl Host {
    /// A fresh, unwired host. `state` starts `Unknown` until
    /// [`Host::apply_decoded_state`] runs.
    pub fn new(host: impl Into<String>, fqdn: impl Into<String>) -> Self {
        let host = host.into();
        let uri = Uri::new(ComponentKind::Host, host.clone(), None, None);
        Self {
            base: Base::new(uri, ComponentState::Unknown),
            fqdn: fqdn.into(),
            hostname: host,
            services: BTreeMap::new(),
            current_artefacts: Vec::new(),
            next_artefacts: Vec::new(),
            lockstate: None,
            reboot_required_to_activate_latest_kernel: false,
            reboot_required_after_next_update: false,
            ssh_poll_max_seconds: 300,
            handled_artefacts: Vec::new(),
        }
    }

    /// This host's URI.
    pub fn uri(&self) -> &Uri {
        &self.base.uri
    }

    /// `hostname` validated against the first label of `fqdn`; warns (does
    /// not fail) on mismatch, per spec's `setAttrsFromData` step (a).
    pub fn validate_hostname(&self) {
        let expected = yadt_uri::short_host(&self.fqdn);
        if expected != self.hostname {
            warn!(
                host = %self.hostname,
                fqdn = %self.fqdn,
                expected,
                "decoded hostname does not match the first label of fqdn"
            );
        }
    }

    /// Set `state` from whether an update is pending: `Uptodate` iff
    /// `next_artefacts` is empty, else `UpdateNeeded`. Preserves the
    /// original's `['update_needed', 'uptodate'][not next_artefacts]`
    /// intent verbatim: empty ⇒ up to date.
    pub fn apply_decoded_state(&mut self) {
        self.base.state = if self.next_artefacts.is_empty() {
            ComponentState::Uptodate
        } else {
            ComponentState::UpdateNeeded
        };
    }

    /// True if currently locked by anyone.
    pub fn is_locked(&self) -> bool {
        self.lockstate.is_some()
    }

    /// True if locked, and the lock's owner matches `user`.
    pub fn is_locked_by_me(&self, user: &str) -> bool {
        self.lockstate.as_ref().is_some_and(|l| l.owner == user)
    }

    /// True if locked by someone other than `user`.
    pub fn is_locked_by_other(&self, user: &str) -> bool {
        self.lockstate.as_ref().is_some_and(|l| l.owner != user)
    }

    /// `lock(message, force)`: fails `InvalidArgument` if `message` is
    /// empty, otherwise describes `yadt-host-lock '<message>'`.
    pub fn lock(&self, message: &str, force: bool) -> Result<Directive, ComponentError> {
        if message.is_empty() {
            return Err(ComponentError::invalid_argument(self.uri()));
        }
        let mut argv = vec!["yadt-host-lock".to_string(), message.to_string()];
        if force {
            argv.push("--force".to_string());
        }
        Ok(Directive::Remote(
            RemoteCommand::new("lock", argv).with_force(force),
        ))
    }

    /// `unlock(force)`.
    pub fn unlock(&self, force: bool) -> Directive {
        let mut argv = vec!["yadt-host-unlock".to_string()];
        if force {
            argv.push("--force".to_string());
        }
        Directive::Remote(RemoteCommand::new("unlock", argv).with_force(force))
    }

    /// `update(rebootRequired, upgradePackages)`: `yadt-host-update [-r]
    /// [artefact…]`.
    pub fn update(&self, reboot_required: bool, upgrade_packages: &[String]) -> Directive {
        let mut argv = vec!["yadt-host-update".to_string()];
        if reboot_required {
            argv.push("-r".to_string());
        }
        argv.extend(upgrade_packages.iter().cloned());
        Directive::Remote(RemoteCommand::new("host-update", argv))
    }

    /// `probe()`: re-run the full status probe, `/usr/bin/yadt-status`.
    pub fn probe(&self) -> Directive {
        Directive::Remote(RemoteCommand::new(
            "probe",
            vec!["/usr/bin/yadt-status".to_string()],
        ))
    }

    /// `probeUptodate()`: the lighter-weight `/usr/bin/yadt-status-host`
    /// used after an update to re-check freshness.
    pub fn probe_uptodate(&self) -> Directive {
        Directive::Remote(RemoteCommand::new(
            "probe-uptodate",
            vec!["/usr/bin/yadt-status-host".to_string()],
        ))
    }
}

/// Placeholder for a host whose SSH probe exited 255 while
/// `ignore_unreachable_hosts` was set. Never participates in mutating
/// actions — the planner must skip it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreachableHost {
    pub(crate) base: Base,
    /// The short hostname this placeholder stands in for.
    pub hostname: String,
}

impl UnreachableHost {
    /// Build an unreachable-host placeholder. State is always `Unknown`.
    pub fn new(hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let uri = Uri::new(ComponentKind::Host, hostname.clone(), None, None);
        Self {
            base: Base::new(uri, ComponentState::Unknown),
            hostname,
        }
    }

    /// This placeholder's URI.
    pub fn uri(&self) -> &Uri {
        &self.base.uri
    }

    /// Always `false`.
    pub fn is_reachable(&self) -> bool {
        false
    }
}

/// A host administratively excluded by the broadcast service. Lock/unlock
/// and status are no-ops succeeding with null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoredHost {
    pub(crate) base: Base,
    /// The short hostname.
    pub hostname: String,
    /// The reason given when the host was ignored.
    pub message: String,
}

impl IgnoredHost {
    /// Build an ignored-host placeholder.
    pub fn new(hostname: impl Into<String>, message: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let uri = Uri::new(ComponentKind::Host, hostname.clone(), None, None);
        Self {
            base: Base::new(uri, ComponentState::Unknown),
            hostname,
            message: message.into(),
        }
    }

    /// This placeholder's URI.
    pub fn uri(&self) -> &Uri {
        &self.base.uri
    }

    /// Always `false`.
    pub fn is_reachable(&self) -> bool {
        false
    }

    /// Always `false` — an ignored host is a known, deliberate state.
    pub fn is_unknown(&self) -> bool {
        false
    }

    /// `lock`/`unlock`/`status` on an ignored host always succeed without
    /// spawning anything.
    pub fn noop(&self) -> Directive {
        Directive::Noop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_host_starts_unknown() {
        let h = Host::new("web01", "web01.example.com");
        assert_eq!(h.base.state, ComponentState::Unknown);
        assert_eq!(h.uri().to_string(), "host://web01");
    }

    #[test]
    fn apply_decoded_state_uptodate_when_no_pending_artefacts() {
        let mut h = Host::new("web01", "web01.example.com");
        h.apply_decoded_state();
        assert_eq!(h.base.state, ComponentState::Uptodate);
    }

    #[test]
    fn apply_decoded_state_update_needed_when_pending() {
        let mut h = Host::new("web01", "web01.example.com");
        h.next_artefacts.push("myapp/14".to_string());
        h.apply_decoded_state();
        assert_eq!(h.base.state, ComponentState::UpdateNeeded);
    }

    #[test]
    fn lock_without_message_is_invalid_argument() {
        let h = Host::new("web01", "web01.example.com");
        assert!(matches!(
            h.lock("", false),
            Err(ComponentError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn lock_with_message_describes_remote_command() {
        let h = Host::new("web01", "web01.example.com");
        let directive = h.lock("maintenance", false).unwrap();
        match directive {
            Directive::Remote(cmd) => {
                assert_eq!(cmd.argv, vec!["yadt-host-lock", "maintenance"]);
            }
            Directive::Noop => panic!("expected a remote command"),
        }
    }

    #[test]
    fn lock_ownership_checks() {
        let mut h = Host::new("web01", "web01.example.com");
        h.lockstate = Some(LockState {
            owner: "alice".to_string(),
            message: "maintenance".to_string(),
            force: false,
        });
        assert!(h.is_locked());
        assert!(h.is_locked_by_me("alice"));
        assert!(h.is_locked_by_other("bob"));
        assert!(!h.is_locked_by_other("alice"));
    }

    #[test]
    fn unreachable_host_is_never_reachable() {
        let u = UnreachableHost::new("web02");
        assert!(!u.is_reachable());
        assert_eq!(u.uri().to_string(), "host://web02");
    }

    #[test]
    fn ignored_host_noop() {
        let i = IgnoredHost::new("web03", "scheduled maintenance");
        assert!(!i.is_reachable());
        assert!(!i.is_unknown());
        assert_eq!(i.noop(), Directive::Noop);
    }
}
