use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tracing::{debug, info, warn};
use yadt_plan::{Action, ActionPlan, Verb};
use yadt_process::RemoteProcess;
use yadt_registry::{Component, Directive, Registry};
use yadt_uri::Uri;

use crate::error::{ExecError, Result};
use crate::outcome::{FailedAction, Outcome};

/// Exit code spec.md §7 reserves for "timed out waiting for reboot".
const REBOOT_TIMEOUT_EXIT: i32 = 152;
/// Exit code meaning the SSH connection dropped, expected mid-reboot.
const CONNECTION_DROPPED_EXIT: i32 = 255;

/// Tunables for one [`Executor`] run.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of actions dispatched concurrently (the `-p N` CLI
    /// flag).
    pub concurrency: usize,
    /// Delay between `ssh H uptime` polls while waiting for a host to come
    /// back after a reboot-triggering update.
    pub ssh_poll_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { concurrency: 10, ssh_poll_delay: Duration::from_secs(5) }
    }
}

/// Dispatches an [`ActionPlan`]'s actions in readiness order, bounded by
/// `concurrency` in-flight remote processes at a time.
///
/// Actions become ready once every key in [`Action::preconditions`] has
/// completed. A cancelled run stops dispatching new actions but lets
/// whatever is already in flight finish, per spec.md §4.7.
pub struct Executor {
    config: ExecutorConfig,
    cancelled: Arc<AtomicBool>,
}

struct StepResult {
    exit_code: Option<i32>,
    success: bool,
    reason: Option<String>,
}

impl Executor {
    /// Build an executor with the given tunables.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// A shared flag the caller can flip to cancel an in-progress [`Executor::run`].
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Run `plan` to completion against `registry`, returning an aggregated
    /// [`Outcome`]. Never returns an `Err` itself — failures are reported
    /// through the outcome so the caller sees partial progress; use
    /// [`outcome_to_result`] to get spec.md's aggregate
    /// `"Could not execute K action(s)"` error.
    pub async fn run(&self, plan: &ActionPlan, registry: &Registry) -> Outcome {
        let mut remaining: VecDeque<Action> = plan.actions.iter().cloned().collect();
        let mut completed: HashSet<(Verb, Uri)> = HashSet::new();
        let mut outcome = Outcome::default();
        let mut in_flight = FuturesUnordered::new();

        loop {
            if !self.cancelled.load(Ordering::Relaxed) {
                let mut i = 0;
                while i < remaining.len() && in_flight.len() < self.config.concurrency {
                    let ready = remaining[i].preconditions.iter().all(|k| completed.contains(k));
                    if ready {
                        let action = remaining.remove(i).expect("index is in bounds");
                        let delay = self.config.ssh_poll_delay;
                        in_flight.push(async move {
                            let result = run_action(&action, registry, delay).await;
                            (action, result)
                        });
                    } else {
                        i += 1;
                    }
                }
            }

            if in_flight.is_empty() {
                if !remaining.is_empty() {
                    if self.cancelled.load(Ordering::Relaxed) {
                        outcome.skipped.extend(remaining.drain(..).map(|a| a.key()));
                    } else {
                        for action in remaining.drain(..) {
                            outcome.failed.push(FailedAction {
                                key: action.key(),
                                exit_code: None,
                                reason: "blocked: a precondition failed and was never satisfied"
                                    .to_string(),
                            });
                        }
                    }
                }
                break;
            }

            let (action, result) = in_flight.next().await.expect("in_flight is non-empty");
            let key = action.key();
            if result.success {
                completed.insert(key.clone());
                outcome.succeeded.push(key);
            } else {
                warn!(verb = %action.verb, uri = %action.uri, exit_code = ?result.exit_code, "action failed");
                outcome.failed.push(FailedAction {
                    key,
                    exit_code: result.exit_code,
                    reason: result.reason.unwrap_or_default(),
                });
            }
        }

        outcome
    }
}

/// Turn an [`Outcome`] into spec.md §4.7's aggregate result: `Ok(())` if
/// nothing failed, otherwise `ActionsFailed { count }`.
pub fn outcome_to_result(outcome: &Outcome) -> Result<()> {
    if outcome.is_success() {
        Ok(())
    } else {
        Err(ExecError::ActionsFailed { count: outcome.failed_count() })
    }
}

async fn run_action(action: &Action, registry: &Registry, ssh_poll_delay: Duration) -> StepResult {
    if action.verb == Verb::WaitForSsh && action.reboot_required {
        return reboot_poll(action, ssh_poll_delay).await;
    }

    let directive = match directive_for(action, registry) {
        Ok(d) => d,
        Err(e) => return StepResult { exit_code: None, success: false, reason: Some(e.to_string()) },
    };

    match directive {
        Directive::Noop => StepResult { exit_code: Some(0), success: true, reason: None },
        Directive::Remote(cmd) => {
            let host = action.uri.host().to_string();
            let proc = RemoteProcess::new(action.uri.clone(), cmd.argv.clone());
            let outcome = proc.run_over_ssh(&host, cmd.stdin.as_deref(), false).await;

            match outcome {
                Ok(o) if o.exit_code == 0 => StepResult { exit_code: Some(0), success: true, reason: None },
                Ok(o) if action.verb == Verb::HostUpdate && action.reboot_required && o.exit_code == CONNECTION_DROPPED_EXIT => {
                    // The SSH session is expected to drop mid-reboot; the
                    // WaitForSsh step that follows does the actual poll.
                    StepResult { exit_code: Some(o.exit_code), success: true, reason: None }
                }
                Ok(o) if o.exit_code == REBOOT_TIMEOUT_EXIT => StepResult {
                    exit_code: Some(o.exit_code),
                    success: false,
                    reason: Some("timed out waiting for reboot".to_string()),
                },
                Ok(o) => StepResult { exit_code: Some(o.exit_code), success: false, reason: Some(o.err) },
                Err(e) => StepResult { exit_code: None, success: false, reason: Some(e.to_string()) },
            }
        }
    }
}

/// Poll `ssh H uptime` every `delay` until it succeeds or
/// `floor(action.ssh_poll_max_seconds / delay)` tries are exhausted.
async fn reboot_poll(action: &Action, delay: Duration) -> StepResult {
    let delay_secs = delay.as_secs().max(1);
    let max_tries = action.ssh_poll_max_seconds / delay_secs;
    let host = action.uri.host().to_string();

    for attempt in 1..=max_tries {
        async_io::Timer::after(delay).await;
        let proc = RemoteProcess::new(action.uri.clone(), vec!["uptime".to_string()]);
        if let Ok(o) = proc.run_over_ssh(&host, None, false).await {
            if o.exit_code == 0 {
                let elapsed = attempt * delay_secs;
                info!(host = %host, elapsed_seconds = elapsed, "host came back after reboot");
                return StepResult { exit_code: Some(0), success: true, reason: None };
            }
        }
        debug!(host = %host, attempt, max_tries, "still waiting for ssh after reboot");
    }

    StepResult {
        exit_code: None,
        success: false,
        reason: Some(format!(
            "ssh did not come back within {} seconds",
            action.ssh_poll_max_seconds
        )),
    }
}

/// Turn an action into the [`Directive`] its target component describes,
/// matching the verb against the component kind it actually applies to.
fn directive_for(action: &Action, registry: &Registry) -> std::result::Result<Directive, ExecError> {
    let component = registry
        .get(&action.uri)
        .ok_or_else(|| ExecError::ComponentNotFound { uri: action.uri.clone() })?;

    // An unreachable host never participates in a mutating operation; it
    // succeeds without anything being spawned (spec.md's "lock over a
    // mixed set with --ignore-unreachable-hosts" scenario).
    if matches!(component, Component::Unreachable(_)) {
        return Ok(Directive::Noop);
    }

    match (action.verb, component) {
        (Verb::Start, Component::Service(s)) => Ok(s.start(action.force)),
        (Verb::Start, Component::ReadonlyService(s)) => Ok(s.start()),
        (Verb::Stop, Component::Service(s)) => Ok(s.stop(action.force)),
        (Verb::Stop, Component::ReadonlyService(s)) => Ok(s.stop()?),
        (Verb::Lock, Component::Host(h)) => {
            Ok(h.lock(action.message.as_deref().unwrap_or(""), action.force)?)
        }
        (Verb::Unlock, Component::Host(h)) => Ok(h.unlock(action.force)),
        (Verb::Lock, Component::Ignored(h)) | (Verb::Unlock, Component::Ignored(h)) => Ok(h.noop()),
        (Verb::Ignore, Component::Service(s)) => {
            Ok(s.ignore(action.message.as_deref().unwrap_or(""), action.force)?)
        }
        (Verb::Unignore, Component::Service(s)) => Ok(s.unignore()),
        (Verb::Ignore, Component::Host(_)) => Ok(Directive::Noop),
        (Verb::Unignore, Component::Host(_)) => Ok(Directive::Noop),
        (Verb::Ignore, Component::Ignored(h)) | (Verb::Unignore, Component::Ignored(h)) => Ok(h.noop()),
        (Verb::HostUpdate, Component::Host(h)) => {
            Ok(h.update(action.reboot_required, &action.artefacts))
        }
        (Verb::WaitForSsh, Component::Host(h)) => Ok(h.probe_uptodate()),
        (verb, other) => Err(ExecError::UnsupportedVerb { verb, uri: other.uri().clone() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yadt_registry::{Host, Service, ServiceSpec};
    use yadt_uri::ComponentKind;

    fn registry_with_two_services() -> Registry {
        let mut registry = Registry::new();
        let host = Host::new("web01", "web01.example.com");
        let host_uri = host.uri().clone();
        registry.insert(Component::Host(host));
        registry.insert(Component::Service(Service::new(
            host_uri.clone(),
            "web01",
            "backend",
            &ServiceSpec::default(),
        )));
        registry.insert(Component::Service(Service::new(
            host_uri,
            "web01",
            "frontend",
            &ServiceSpec::default(),
        )));
        registry.wire();
        registry
    }

    #[smol_potat::test]
    async fn runs_an_action_with_no_preconditions() {
        let registry = registry_with_two_services();
        let uri = Uri::parse("service://web01/backend").unwrap();
        let plan = ActionPlan::new("start", vec![Action::new(Verb::Start, uri.clone())]);
        let executor = Executor::new(ExecutorConfig::default());
        let outcome = executor.run(&plan, &registry).await;
        // the real binary isn't present, so this fails, but it must have
        // actually attempted dispatch rather than being left blocked.
        assert!(outcome.succeeded.contains(&(Verb::Start, uri.clone())) || outcome.failed.iter().any(|f| f.key == (Verb::Start, uri.clone())));
    }

    #[test]
    fn lock_on_an_unreachable_host_is_a_noop() {
        let mut registry = Registry::new();
        registry.insert(Component::Unreachable(yadt_registry::UnreachableHost::new("web02")));
        registry.wire();
        let action = Action::new(Verb::Lock, Uri::parse("host://web02").unwrap()).with_message("maint");
        let directive = directive_for(&action, &registry).unwrap();
        assert_eq!(directive, Directive::Noop);
    }

    #[test]
    fn unsupported_verb_on_component_is_an_error() {
        let registry = registry_with_two_services();
        let action = Action::new(Verb::Lock, Uri::parse("service://web01/backend").unwrap());
        let err = directive_for(&action, &registry).unwrap_err();
        assert!(matches!(err, ExecError::UnsupportedVerb { .. }));
    }

    #[smol_potat::test]
    async fn empty_plan_dispatches_nothing() {
        let registry = registry_with_two_services();
        let plan = ActionPlan::empty("start");
        let executor = Executor::new(ExecutorConfig::default());
        let outcome = executor.run(&plan, &registry).await;
        assert!(outcome.succeeded.is_empty());
        assert!(outcome.failed.is_empty());
    }

    #[smol_potat::test]
    async fn cancellation_leaves_undispatched_actions_skipped() {
        let registry = registry_with_two_services();
        let uri = Uri::parse("service://web01/backend").unwrap();
        let plan = ActionPlan::new("start", vec![Action::new(Verb::Start, uri.clone())]);
        let executor = Executor::new(ExecutorConfig::default());
        executor.cancel_handle().store(true, Ordering::Relaxed);
        let outcome = executor.run(&plan, &registry).await;
        assert_eq!(outcome.skipped, vec![(Verb::Start, uri)]);
    }
}
