use std::collections::BTreeSet;

use tracing::debug;
use wildmatch::WildMatch;
use yadt_registry::{Component, ComponentState, Registry};
use yadt_uri::Uri;

use crate::action::{Action, ActionPlan, Verb};
use crate::error::PlanError;

/// The eight user-facing verbs spec.md §6 names. `Status` always plans to
/// an empty [`ActionPlan`] — the status pipeline has already run by the
/// time a plan is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// No-op: status has already run.
    Status,
    /// Start selected services, dependencies first.
    Start,
    /// Stop selected services, dependents first.
    Stop,
    /// Stop, update, reboot-poll, start — per selected host.
    Update,
    /// Lock selected hosts.
    Lock,
    /// Unlock selected hosts.
    Unlock,
    /// Ignore selected hosts or services.
    Ignore,
    /// Reverse [`Command::Ignore`].
    Unignore,
}

/// Options that apply to any verb's planning pass.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// The `-m` message (required for `lock`/`ignore`).
    pub message: Option<String>,
    /// Whether `--force` was requested.
    pub force: bool,
}

/// Compiles a [`Command`] and a glob selector into an [`ActionPlan`]
/// against an already-wired, read-only [`Registry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Planner;

impl Planner {
    /// A stateless planner.
    pub fn new() -> Self {
        Self
    }

    /// Compile `command` over everything in `registry` matching `selector`.
    pub fn plan(
        &self,
        command: Command,
        selector: &str,
        registry: &Registry,
        options: &PlanOptions,
    ) -> Result<ActionPlan, PlanError> {
        if command == Command::Status {
            return Ok(ActionPlan::empty("status"));
        }

        let selected = select(registry, selector);
        if selected.is_empty() {
            return Err(PlanError::EmptySelector { selector: selector.to_string() });
        }

        match command {
            Command::Status => unreachable!("handled above"),
            Command::Start => Ok(self.plan_start(registry, &selected)),
            Command::Stop => Ok(self.plan_stop(registry, &selected)),
            Command::Update => self.plan_update(registry, &selected),
            Command::Lock => self.plan_simple(Verb::Lock, &selected, options, true),
            Command::Unlock => self.plan_simple(Verb::Unlock, &selected, options, false),
            Command::Ignore => self.plan_simple(Verb::Ignore, &selected, options, true),
            Command::Unignore => self.plan_simple(Verb::Unignore, &selected, options, false),
        }
    }

    fn plan_simple(
        &self,
        verb: Verb,
        selected: &[Uri],
        options: &PlanOptions,
        requires_message: bool,
    ) -> Result<ActionPlan, PlanError> {
        if requires_message && options.message.as_deref().unwrap_or("").is_empty() {
            return Err(PlanError::MissingMessage);
        }
        let actions = selected
            .iter()
            .map(|uri| {
                let mut action = Action::new(verb, uri.clone()).with_force(options.force);
                if let Some(message) = &options.message {
                    action = action.with_message(message.clone());
                }
                action
            })
            .collect();
        Ok(ActionPlan::new(verb.to_string(), actions))
    }

    fn plan_start(&self, registry: &Registry, selected: &[Uri]) -> ActionPlan {
        let scores = registry.compute_dependency_scores();
        let mut services: Vec<(Uri, u64)> = selected
            .iter()
            .cloned()
            .map(|uri| (scores.get(&uri).copied().unwrap_or(0), uri))
            .map(|(score, uri)| (uri, score))
            .collect();
        services.sort_by_key(|(_, score)| std::cmp::Reverse(*score));

        let actions = services
            .iter()
            .map(|(uri, score)| {
                let preconditions = services
                    .iter()
                    .filter(|(_, other_score)| other_score > score)
                    .map(|(other_uri, _)| (Verb::Start, other_uri.clone()))
                    .collect();
                Action::new(Verb::Start, uri.clone()).with_preconditions(preconditions)
            })
            .collect();
        ActionPlan::new("start", actions)
    }

    fn plan_stop(&self, registry: &Registry, selected: &[Uri]) -> ActionPlan {
        let scores = registry.compute_dependency_scores();
        let mut services: Vec<(Uri, u64)> = selected
            .iter()
            .filter(|uri| needs_stop(registry, uri))
            .cloned()
            .map(|uri| (scores.get(&uri).copied().unwrap_or(0), uri))
            .map(|(score, uri)| (uri, score))
            .collect();
        services.sort_by_key(|(_, score)| *score);

        let actions = services
            .iter()
            .map(|(uri, score)| {
                let preconditions = services
                    .iter()
                    .filter(|(_, other_score)| other_score < score)
                    .map(|(other_uri, _)| (Verb::Stop, other_uri.clone()))
                    .collect();
                Action::new(Verb::Stop, uri.clone()).with_preconditions(preconditions)
            })
            .collect();
        ActionPlan::new("stop", actions)
    }

    fn plan_update(&self, registry: &Registry, selected: &[Uri]) -> Result<ActionPlan, PlanError> {
        let scores = registry.compute_dependency_scores();
        let mut actions = Vec::new();

        for host_uri in selected {
            let host = match registry.get(host_uri) {
                Some(Component::Host(h)) => h,
                Some(_) => continue,
                None => return Err(PlanError::ComponentNotFound { uri: host_uri.clone() }),
            };

            let affected: Vec<Uri> = registry
                .iter()
                .filter_map(|c| match c {
                    Component::Service(s) if &s.host_uri == host_uri => Some(s.uri().clone()),
                    _ => None,
                })
                .collect();

            let mut stoppable: Vec<(Uri, u64)> = affected
                .iter()
                .filter(|uri| needs_stop(registry, uri))
                .cloned()
                .map(|uri| {
                    let score = scores.get(&uri).copied().unwrap_or(0);
                    (uri, score)
                })
                .collect();
            stoppable.sort_by_key(|(_, score)| *score);

            let stop_keys: BTreeSet<(Verb, Uri)> = stoppable
                .iter()
                .map(|(uri, _)| (Verb::Stop, uri.clone()))
                .collect();
            for (uri, score) in &stoppable {
                let preconditions = stoppable
                    .iter()
                    .filter(|(_, other_score)| other_score < score)
                    .map(|(other_uri, _)| (Verb::Stop, other_uri.clone()))
                    .collect();
                actions.push(Action::new(Verb::Stop, uri.clone()).with_preconditions(preconditions));
            }

            let update_action = Action::new(Verb::HostUpdate, host_uri.clone())
                .with_preconditions(stop_keys.clone())
                .with_force(false)
                .with_update_payload(
                    host.reboot_required_after_next_update,
                    host.next_artefacts.clone(),
                );
            actions.push(update_action);

            let wait_action = Action::new(Verb::WaitForSsh, host_uri.clone())
                .with_preconditions([(Verb::HostUpdate, host_uri.clone())].into_iter().collect())
                .with_reboot_wait(host.reboot_required_after_next_update, host.ssh_poll_max_seconds);
            actions.push(wait_action);

            let mut startable: Vec<(Uri, u64)> = affected
                .iter()
                .cloned()
                .map(|uri| {
                    let score = scores.get(&uri).copied().unwrap_or(0);
                    (uri, score)
                })
                .collect();
            startable.sort_by_key(|(_, score)| std::cmp::Reverse(*score));
            for (uri, score) in &startable {
                let mut preconditions: BTreeSet<(Verb, Uri)> = startable
                    .iter()
                    .filter(|(_, other_score)| other_score > score)
                    .map(|(other_uri, _)| (Verb::Start, other_uri.clone()))
                    .collect();
                preconditions.insert((Verb::WaitForSsh, host_uri.clone()));
                actions.push(Action::new(Verb::Start, uri.clone()).with_preconditions(preconditions));
            }

            debug!(host = %host_uri, affected = affected.len(), "planned update chain");
        }

        Ok(ActionPlan::new("update", actions))
    }
}

fn needs_stop(registry: &Registry, uri: &Uri) -> bool {
    !matches!(registry.get(uri).map(|c| c.state()), Some(ComponentState::Down))
}

/// Match every non-placeholder component in `registry` whose canonical URI
/// satisfies the glob `pattern` (e.g. `host://*`, `service://web01/*`).
fn select(registry: &Registry, pattern: &str) -> Vec<Uri> {
    let matcher = WildMatch::new(pattern);
    let mut uris: Vec<Uri> = registry
        .iter()
        .filter(|c| !matches!(c, Component::Missing(_)))
        .map(|c| c.uri().clone())
        .filter(|uri| matcher.matches(&uri.to_string()))
        .collect();
    uris.sort();
    uris
}

#[cfg(test)]
mod tests {
    use super::*;
    use yadt_registry::{Host, Service, ServiceSpec};
    use yadt_uri::ComponentKind;

    fn registry_with_dependency_chain() -> Registry {
        let mut registry = Registry::new();
        let host = Host::new("web01", "web01.example.com");
        let host_uri = host.uri().clone();
        registry.insert(Component::Host(host));

        let backend = Service::new(host_uri.clone(), "web01", "backend", &ServiceSpec::default());
        registry.insert(Component::Service(backend));

        let frontend_spec = ServiceSpec {
            needs_services: vec!["backend".to_string()],
            ..Default::default()
        };
        let frontend = Service::new(host_uri, "web01", "frontend", &frontend_spec);
        registry.insert(Component::Service(frontend));

        registry.wire();
        registry
    }

    #[test]
    fn empty_selector_is_usage_error() {
        let registry = registry_with_dependency_chain();
        let planner = Planner::new();
        let err = planner
            .plan(Command::Start, "service://nowhere/*", &registry, &PlanOptions::default())
            .unwrap_err();
        assert!(matches!(err, PlanError::EmptySelector { .. }));
    }

    #[test]
    fn status_always_plans_empty() {
        let registry = registry_with_dependency_chain();
        let planner = Planner::new();
        let plan = planner
            .plan(Command::Status, "host://*", &registry, &PlanOptions::default())
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn start_orders_dependencies_first() {
        let registry = registry_with_dependency_chain();
        let planner = Planner::new();
        let plan = planner
            .plan(Command::Start, "service://web01/*", &registry, &PlanOptions::default())
            .unwrap();

        let backend_uri = Uri::parse("service://web01/backend").unwrap();
        let frontend_uri = Uri::parse("service://web01/frontend").unwrap();
        let frontend_action = plan.actions.iter().find(|a| a.uri == frontend_uri).unwrap();
        assert!(frontend_action.preconditions.contains(&(Verb::Start, backend_uri)));
    }

    #[test]
    fn stop_orders_dependents_first() {
        let registry = registry_with_dependency_chain();
        let planner = Planner::new();
        let plan = planner
            .plan(Command::Stop, "service://web01/*", &registry, &PlanOptions::default())
            .unwrap();

        let backend_uri = Uri::parse("service://web01/backend").unwrap();
        let frontend_uri = Uri::parse("service://web01/frontend").unwrap();
        let backend_action = plan.actions.iter().find(|a| a.uri == backend_uri).unwrap();
        assert!(backend_action.preconditions.contains(&(Verb::Stop, frontend_uri)));
    }

    #[test]
    fn lock_requires_message() {
        let registry = registry_with_dependency_chain();
        let planner = Planner::new();
        let err = planner
            .plan(Command::Lock, "host://*", &registry, &PlanOptions::default())
            .unwrap_err();
        assert!(matches!(err, PlanError::MissingMessage));
    }

    #[test]
    fn lock_with_message_produces_one_action_per_host() {
        let registry = registry_with_dependency_chain();
        let planner = Planner::new();
        let options = PlanOptions { message: Some("maintenance".to_string()), force: false };
        let plan = planner.plan(Command::Lock, "host://*", &registry, &options).unwrap();
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].message.as_deref(), Some("maintenance"));
    }

    #[test]
    fn update_chain_barriers_stop_before_update_before_wait_before_start() {
        let registry = registry_with_dependency_chain();
        let planner = Planner::new();
        let plan = planner
            .plan(Command::Update, "host://*", &registry, &PlanOptions::default())
            .unwrap();

        let host_uri = Uri::parse("host://web01").unwrap();
        let update_action = plan
            .actions
            .iter()
            .find(|a| a.verb == Verb::HostUpdate && a.uri == host_uri)
            .unwrap();
        assert!(!update_action.preconditions.is_empty());

        let wait_action = plan
            .actions
            .iter()
            .find(|a| a.verb == Verb::WaitForSsh && a.uri == host_uri)
            .unwrap();
        assert!(wait_action.preconditions.contains(&(Verb::HostUpdate, host_uri.clone())));

        let backend_uri = Uri::parse("service://web01/backend").unwrap();
        let start_backend = plan
            .actions
            .iter()
            .find(|a| a.verb == Verb::Start && a.uri == backend_uri)
            .unwrap();
        assert!(start_backend.preconditions.contains(&(Verb::WaitForSsh, host_uri)));
    }
}
