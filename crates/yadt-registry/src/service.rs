use serde::{Deserialize, Serialize};
use yadt_uri::{ComponentKind, Uri};

use crate::command::{Directive, RemoteCommand};
use crate::component::Base;
use crate::error::ComponentError;
use crate::host::ServiceSpec;
use crate::state::ComponentState;

/// Where a service's status probing runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateHandling {
    /// Probed locally, on the controller.
    Serverside,
    /// Probed over SSH, the default.
    Remote,
}

impl StateHandling {
    /// Parse the spec's `state_handling` string (`"serverside"` or
    /// anything else, which means `Remote`).
    pub fn from_spec(s: Option<&str>) -> Self {
        match s {
            Some("serverside") => StateHandling::Serverside,
            _ => StateHandling::Remote,
        }
    }
}

/// A service declared by a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub(crate) base: Base,
    /// The host this service runs on.
    pub host_uri: Uri,
    /// Service name (unqualified).
    pub name: String,
    /// The `class` string from the spec, if any (default `"Service"`).
    pub class: Option<String>,
    /// Where status probing runs.
    pub state_handling: StateHandling,
}

impl Service {
    /// Build a service from its host and declared spec. `needs` is seeded
    /// with the host URI plus the spec's `needs_services` (qualified to
    /// this host) and `needs_artefacts` (qualified and defaulted to the
    /// `current` revision when no version is given).
    pub fn new(host_uri: Uri, host: &str, name: impl Into<String>, spec: &ServiceSpec) -> Self {
        let name = name.into();
        let uri = Uri::new(ComponentKind::Service, host.to_string(), Some(name.clone()), None);
        let mut base = Base::new(uri, ComponentState::Unknown);
        base.needs.insert(host_uri.clone());

        for needed in &spec.needs_services {
            base.needs
                .insert(Uri::new(ComponentKind::Service, host.to_string(), Some(needed.clone()), None));
        }
        for needed in &spec.needs_artefacts {
            let (artefact_name, version) = match needed.split_once('/') {
                Some((n, v)) => (n.to_string(), v.to_string()),
                None => (needed.clone(), "current".to_string()),
            };
            base.needs.insert(Uri::new(
                ComponentKind::Artefact,
                host.to_string(),
                Some(artefact_name),
                Some(version),
            ));
        }

        Self {
            base,
            host_uri,
            name,
            class: spec.class.clone(),
            state_handling: StateHandling::from_spec(spec.state_handling.as_deref()),
        }
    }

    /// This service's URI.
    pub fn uri(&self) -> &Uri {
        &self.base.uri
    }

    /// Set `state` from a decoded spec's `state` string, per the table in
    /// [`crate::state::state_from_description`].
    pub fn set_state_from_description(&mut self, description: Option<&str>) {
        self.base.state = description
            .map(crate::state::state_from_description)
            .unwrap_or(ComponentState::Unknown);
    }

    /// `start(force)`.
    pub fn start(&self, force: bool) -> Directive {
        let mut argv = vec!["yadt-service-start".to_string(), self.name.clone()];
        if force {
            argv.push("--force".to_string());
        }
        Directive::Remote(RemoteCommand::new("start", argv).with_force(force))
    }

    /// `stop(force)`.
    pub fn stop(&self, force: bool) -> Directive {
        let mut argv = vec!["yadt-service-stop".to_string(), self.name.clone()];
        if force {
            argv.push("--force".to_string());
        }
        Directive::Remote(RemoteCommand::new("stop", argv).with_force(force))
    }

    /// `status()`.
    pub fn status(&self) -> Directive {
        Directive::Remote(RemoteCommand::new(
            "status",
            vec!["yadt-service-status".to_string(), self.name.clone()],
        ))
    }

    /// `ignore(message, force)`: fails `InvalidArgument` if `message` is
    /// empty.
    pub fn ignore(&self, message: &str, force: bool) -> Result<Directive, ComponentError> {
        if message.is_empty() {
            return Err(ComponentError::invalid_argument(self.uri()));
        }
        let mut argv = vec![
            "yadt-service-ignore".to_string(),
            self.name.clone(),
            message.to_string(),
        ];
        if force {
            argv.push("--force".to_string());
        }
        Ok(Directive::Remote(
            RemoteCommand::new("ignore", argv).with_force(force),
        ))
    }

    /// `unignore()`.
    pub fn unignore(&self) -> Directive {
        Directive::Remote(RemoteCommand::new(
            "unignore",
            vec!["yadt-service-unignore".to_string(), self.name.clone()],
        ))
    }

    /// Apply the result of a `serverside` status probe run on the
    /// controller.
    pub fn apply_probe_result(&mut self, succeeded: bool) {
        self.base.state = if succeeded {
            ComponentState::Up
        } else {
            ComponentState::Down
        };
    }
}

/// A stand-in for a service referenced by `needs_services` somewhere but
/// never found among any host's declared services. Observable, but not
/// startable/stoppable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadonlyService {
    pub(crate) base: Base,
    /// The host it stands in for a service on.
    pub host_uri: Uri,
    /// Service name.
    pub name: String,
}

impl ReadonlyService {
    /// Build a readonly stand-in, inheriting `needed_by` from the
    /// `MissingComponent` it replaces.
    pub fn new(host_uri: Uri, host: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let uri = Uri::new(ComponentKind::Service, host.to_string(), Some(name.clone()), None);
        let mut base = Base::new(uri, ComponentState::Unknown);
        base.needs.insert(host_uri.clone());
        Self { base, host_uri, name }
    }

    /// This stand-in's URI.
    pub fn uri(&self) -> &Uri {
        &self.base.uri
    }

    /// `stop` always fails: `POLICY_DENIED`.
    pub fn stop(&self) -> Result<Directive, ComponentError> {
        Err(ComponentError::policy_denied(
            self.uri(),
            "cannot stop a readonly service",
        ))
    }

    /// `start` degenerates to a status probe.
    pub fn start(&self) -> Directive {
        self.status()
    }

    /// `status()`: probes `yadt-service-status <name>`; the caller sets
    /// `state` to `Up` on exit 0, `Down` otherwise.
    pub fn status(&self) -> Directive {
        Directive::Remote(RemoteCommand::new(
            "status",
            vec!["yadt-service-status".to_string(), self.name.clone()],
        ))
    }

    /// Apply the result of the `status()` probe described above.
    pub fn apply_probe_result(&mut self, succeeded: bool) {
        self.base.state = if succeeded {
            ComponentState::Up
        } else {
            ComponentState::Down
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_uri() -> Uri {
        Uri::new(ComponentKind::Host, "web01", None, None)
    }

    #[test]
    fn service_needs_includes_host() {
        let spec = ServiceSpec::default();
        let svc = Service::new(host_uri(), "web01", "nginx", &spec);
        assert!(svc.base.needs.contains(&host_uri()));
        assert_eq!(svc.uri().to_string(), "service://web01/nginx");
    }

    #[test]
    fn service_qualifies_bare_dependency_names() {
        let spec = ServiceSpec {
            needs_services: vec!["backend".to_string()],
            needs_artefacts: vec!["myapp".to_string()],
            ..Default::default()
        };
        let svc = Service::new(host_uri(), "web01", "frontend", &spec);
        assert!(svc
            .base
            .needs
            .contains(&Uri::parse("service://web01/backend").unwrap()));
        assert!(svc
            .base
            .needs
            .contains(&Uri::parse("artefact://web01/myapp/current").unwrap()));
    }

    #[test]
    fn ignore_without_message_is_invalid_argument() {
        let spec = ServiceSpec::default();
        let svc = Service::new(host_uri(), "web01", "nginx", &spec);
        assert!(matches!(
            svc.ignore("", false),
            Err(ComponentError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn readonly_service_cannot_stop() {
        let ro = ReadonlyService::new(host_uri(), "web01", "backend");
        assert!(matches!(
            ro.stop(),
            Err(ComponentError::PolicyDenied { .. })
        ));
    }

    #[test]
    fn readonly_service_start_is_a_status_probe() {
        let ro = ReadonlyService::new(host_uri(), "web01", "backend");
        assert_eq!(ro.start(), ro.status());
    }

    #[test]
    fn readonly_service_state_from_probe() {
        let mut ro = ReadonlyService::new(host_uri(), "web01", "backend");
        ro.apply_probe_result(true);
        assert_eq!(ro.base.state, ComponentState::Up);
        ro.apply_probe_result(false);
        assert_eq!(ro.base.state, ComponentState::Down);
    }
}
