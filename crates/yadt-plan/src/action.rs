use std::collections::BTreeSet;
use std::fmt;

use yadt_registry::Registry;
use yadt_uri::Uri;

use crate::error::PlanError;

/// The remote operation an [`Action`] performs.
///
/// `HostUpdate` and `WaitForSsh` are internal steps of the `update` verb's
/// per-host sub-sequence (spec.md §4.6); every other variant also appears
/// as a directly user-selectable verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    /// Start a service.
    Start,
    /// Stop a service.
    Stop,
    /// Lock a host.
    Lock,
    /// Unlock a host.
    Unlock,
    /// Administratively ignore a host or service.
    Ignore,
    /// Reverse [`Verb::Ignore`].
    Unignore,
    /// Run `yadt-host-update` on a host.
    HostUpdate,
    /// Poll `ssh H uptime` until the host comes back after a reboot.
    WaitForSsh,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Lock => "lock",
            Verb::Unlock => "unlock",
            Verb::Ignore => "ignore",
            Verb::Unignore => "unignore",
            Verb::HostUpdate => "host-update",
            Verb::WaitForSsh => "wait-for-ssh",
        };
        f.write_str(s)
    }
}

/// One planned operation on one component.
///
/// `preconditions` names other actions (by `(verb, uri)`, since a single
/// host can appear as the target of more than one verb within an `update`
/// chain) that must have completed before this one is ready to dispatch.
#[derive(Debug, Clone)]
pub struct Action {
    /// The operation to perform.
    pub verb: Verb,
    /// The component it targets.
    pub uri: Uri,
    /// Actions that must complete first.
    pub preconditions: BTreeSet<(Verb, Uri)>,
    /// The `-m` message, for `Lock`/`Ignore`.
    pub message: Option<String>,
    /// Whether `--force` was requested.
    pub force: bool,
    /// Whether a reboot is required, for `HostUpdate`/`WaitForSsh`.
    pub reboot_required: bool,
    /// `name/version` artefacts to install, for `HostUpdate`.
    pub artefacts: Vec<String>,
    /// The host's configured SSH poll bound, for `WaitForSsh`.
    pub ssh_poll_max_seconds: u64,
}

impl Action {
    /// A bare action with no preconditions, message or force flag.
    pub fn new(verb: Verb, uri: Uri) -> Self {
        Self {
            verb,
            uri,
            preconditions: BTreeSet::new(),
            message: None,
            force: false,
            reboot_required: false,
            artefacts: Vec::new(),
            ssh_poll_max_seconds: 0,
        }
    }

    /// This action's identity for precondition purposes.
    pub fn key(&self) -> (Verb, Uri) {
        (self.verb, self.uri.clone())
    }

    /// Attach a precondition set.
    pub fn with_preconditions(mut self, preconditions: BTreeSet<(Verb, Uri)>) -> Self {
        self.preconditions = preconditions;
        self
    }

    /// Attach the `-m` message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the `--force` flag.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set `reboot_required` and the artefact list, for `HostUpdate`.
    pub fn with_update_payload(mut self, reboot_required: bool, artefacts: Vec<String>) -> Self {
        self.reboot_required = reboot_required;
        self.artefacts = artefacts;
        self
    }

    /// Set `reboot_required` and the poll bound, for `WaitForSsh`.
    pub fn with_reboot_wait(mut self, reboot_required: bool, ssh_poll_max_seconds: u64) -> Self {
        self.reboot_required = reboot_required;
        self.ssh_poll_max_seconds = ssh_poll_max_seconds;
        self
    }
}

/// An ordered, flat collection of actions the executor dispatches in
/// ready-order (an action is ready once every action named in its
/// `preconditions` has completed).
///
/// Spec.md's "sub-plan barrier" is realized by [`ActionPlan::then`] rather
/// than a separate nested field: concatenating two plans makes every
/// action of the second precondition on every action of the first, which
/// is the only place this repo needs a literal barrier. Independent
/// per-host `update` chains stay siblings in one flat action list instead,
/// since they must run concurrently rather than wait on each other.
#[derive(Debug, Clone, Default)]
pub struct ActionPlan {
    /// A human-readable label (the verb, or `"update:host01"` for a
    /// per-host sub-chain assembled before concatenation).
    pub name: String,
    /// The actions this plan carries.
    pub actions: Vec<Action>,
}

impl ActionPlan {
    /// Build a plan from a name and its actions.
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self { name: name.into(), actions }
    }

    /// An empty, named plan (what `status` always produces).
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// True if this plan carries no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Concatenate `next` after `self` with an implicit barrier: every
    /// action in `next` preconditions on every action currently in `self`.
    pub fn then(self, next: ActionPlan) -> ActionPlan {
        let barrier: BTreeSet<(Verb, Uri)> = self.actions.iter().map(Action::key).collect();
        let mut actions = self.actions;
        for mut action in next.actions {
            action.preconditions.extend(barrier.iter().cloned());
            actions.push(action);
        }
        ActionPlan { name: next.name, actions }
    }

    /// Keep only actions whose component's `host_uri` is in
    /// `handled_hosts`, per spec.md §4.5. Fails [`PlanError::PlanEmpty`]
    /// if nothing survives.
    pub fn remove_actions_on_unhandled_hosts(
        &mut self,
        handled_hosts: &BTreeSet<Uri>,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        self.actions.retain(|action| {
            registry
                .get(&action.uri)
                .and_then(|c| c.host_uri())
                .is_some_and(|host_uri| handled_hosts.contains(&host_uri))
        });
        if self.actions.is_empty() {
            return Err(PlanError::PlanEmpty);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yadt_registry::{Component, Host, Service, ServiceSpec};
    use yadt_uri::ComponentKind;

    fn registry_with_three_hosts() -> Registry {
        let mut registry = Registry::new();
        for host in ["cowsay", "foobar", "foobaz"] {
            let h = Host::new(host, format!("{host}.example.com"));
            let host_uri = h.uri().clone();
            registry.insert(Component::Host(h));
            let svc = Service::new(host_uri, host, "service0", &ServiceSpec::default());
            registry.insert(Component::Service(svc));
        }
        registry.wire();
        registry
    }

    fn action_for(host: &str) -> Action {
        Action::new(
            Verb::Start,
            Uri::new(ComponentKind::Service, host, Some("service0".to_string()), None),
        )
    }

    #[test]
    fn removes_actions_on_unhandled_hosts() {
        let registry = registry_with_three_hosts();
        let mut plan = ActionPlan::new(
            "plan",
            vec![action_for("cowsay"), action_for("foobar"), action_for("foobaz")],
        );
        let handled: BTreeSet<Uri> = [Uri::new(ComponentKind::Host, "foobar", None, None)]
            .into_iter()
            .collect();

        plan.remove_actions_on_unhandled_hosts(&handled, &registry).unwrap();

        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].uri.to_string(), "service://foobar/service0");
    }

    #[test]
    fn does_not_affect_actions_on_handled_hosts() {
        let registry = registry_with_three_hosts();
        let mut plan = ActionPlan::new("plan", vec![action_for("foobar"), action_for("foobaz")]);
        let handled: BTreeSet<Uri> = [
            Uri::new(ComponentKind::Host, "foobar", None, None),
            Uri::new(ComponentKind::Host, "foobaz", None, None),
        ]
        .into_iter()
        .collect();

        plan.remove_actions_on_unhandled_hosts(&handled, &registry).unwrap();

        assert_eq!(plan.actions.len(), 2);
    }

    #[test]
    fn raises_plan_empty_when_everything_is_filtered_out() {
        let registry = registry_with_three_hosts();
        let mut plan = ActionPlan::new("plan", vec![action_for("foobar")]);
        let handled: BTreeSet<Uri> = BTreeSet::new();

        let err = plan.remove_actions_on_unhandled_hosts(&handled, &registry).unwrap_err();
        assert!(matches!(err, PlanError::PlanEmpty));
    }

    #[test]
    fn then_adds_a_barrier_precondition() {
        let first = ActionPlan::new("stop", vec![action_for("cowsay")]);
        let second = ActionPlan::new("update", vec![action_for("foobar")]);
        let combined = first.then(second);

        assert_eq!(combined.actions.len(), 2);
        assert!(combined.actions[1]
            .preconditions
            .contains(&(Verb::Start, Uri::parse("service://cowsay/service0").unwrap())));
    }
}
