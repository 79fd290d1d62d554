use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, info_span};
use yadt_process::RemoteProcess;
use yadt_registry::{
    Artefact, Component, Directive, Host, IgnoredHost, ReadonlyService, Registry, Service,
    StateHandling, UnreachableHost,
};
use yadt_uri::{ComponentKind, Revision, Uri};

use crate::capability::{BroadcastClient, HostSnapshot, LocalServiceCollector, NoOpBroadcastClient};
use crate::class_registry::ServiceClassRegistry;
use crate::error::Error;
use crate::persistence;
use crate::record::{decode_host_record, HostRecord};

/// Settings the status pipeline needs beyond the host list itself.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Downgrade a 255-exit probe to an [`UnreachableHost`] instead of
    /// failing the branch.
    pub ignore_unreachable_hosts: bool,
    /// Where to write the persisted manifests, snapshot and statusline.
    pub out_dir: PathBuf,
    /// Base path for per-host raw-stdout capture
    /// (`<log_file>.<host>.status`).
    pub log_file: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ignore_unreachable_hosts: false,
            out_dir: PathBuf::from("."),
            log_file: PathBuf::from("yadtshell.log"),
        }
    }
}

enum ProbeOutcome {
    Ignored { host: String, message: String },
    Unreachable { host: String },
    Resolved { host: String, record: HostRecord, raw: String },
}

/// Orchestrates the per-host probe → decode → instantiate → wire →
/// resolve-missing → persist → broadcast pipeline spec.md §4.4 describes.
pub struct StatusPipeline {
    config: PipelineConfig,
    broadcast: Arc<dyn BroadcastClient>,
    classes: ServiceClassRegistry,
    collector: Option<Arc<dyn LocalServiceCollector>>,
}

impl StatusPipeline {
    /// Build a pipeline with a no-op broadcast client and the built-in
    /// service class registry.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            broadcast: Arc::new(NoOpBroadcastClient),
            classes: ServiceClassRegistry::with_builtins(),
            collector: None,
        }
    }

    /// Substitute the broadcast collaborator (defaults to a no-op).
    pub fn with_broadcast(mut self, broadcast: Arc<dyn BroadcastClient>) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Extend the service class registry before running.
    pub fn with_classes(mut self, classes: ServiceClassRegistry) -> Self {
        self.classes = classes;
        self
    }

    /// Register the run's local-service collector, if any.
    pub fn with_collector(mut self, collector: Arc<dyn LocalServiceCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Run the full pipeline over `hosts`, returning the wired, persisted
    /// registry. Fails if any per-host branch failed outright (as
    /// opposed to being substituted with an `UnreachableHost` or
    /// `IgnoredHost`).
    pub async fn run(&self, hosts: &[String]) -> Result<Registry, Error> {
        let resolved = self.probe_all(hosts).await?;

        let mut registry = Registry::new();
        for outcome in &resolved {
            match outcome {
                ProbeOutcome::Ignored { host, message } => {
                    registry.insert(Component::Ignored(IgnoredHost::new(host.clone(), message.clone())));
                }
                ProbeOutcome::Unreachable { host } => {
                    registry.insert(Component::Unreachable(UnreachableHost::new(host.clone())));
                }
                ProbeOutcome::Resolved { host, record, raw } => {
                    self.instantiate_host(&mut registry, host, record, raw)?;
                }
            }
        }

        self.run_local_state(&mut registry).await?;

        registry.wire();

        self.resolve_missing(&mut registry).await?;

        persistence::persist_registry(&self.config.out_dir, &registry)?;
        self.broadcast_full_update(&registry).await;

        Ok(registry)
    }

    async fn probe_all(&self, hosts: &[String]) -> Result<Vec<ProbeOutcome>, Error> {
        let pending: Arc<Mutex<BTreeSet<String>>> =
            Arc::new(Mutex::new(hosts.iter().cloned().collect()));
        let (done_tx, done_rx) = async_channel::bounded::<()>(1);

        let pending_for_timer = pending.clone();
        let timer = async move {
            loop {
                let sleep = async_io::Timer::after(Duration::from_secs(10));
                let recv = done_rx.recv();
                futures::pin_mut!(sleep);
                futures::pin_mut!(recv);
                match futures::future::select(sleep, recv).await {
                    futures::future::Either::Left(_) => {
                        let remaining: Vec<String> =
                            pending_for_timer.lock().expect("pending mutex poisoned").iter().cloned().collect();
                        if !remaining.is_empty() {
                            info!(pending = ?remaining, "still waiting on host status probes");
                        }
                    }
                    futures::future::Either::Right(_) => break,
                }
            }
        };

        let probes = async {
            let results = futures::future::join_all(hosts.iter().map(|host| {
                let pending = pending.clone();
                async move {
                    let span = info_span!("status", host = %host);
                    let _enter = span.enter();
                    let outcome = self.probe_host(host).await;
                    pending.lock().expect("pending mutex poisoned").remove(host);
                    (host.clone(), outcome)
                }
            }))
            .await;
            let _ = done_tx.send(()).await;
            results
        };

        let (outcomes, _) = futures::join!(probes, timer);

        let mut failed = Vec::new();
        let mut resolved = Vec::new();
        for (host, result) in outcomes {
            match result {
                Ok(outcome) => resolved.push(outcome),
                Err(_) => failed.push(host),
            }
        }
        if !failed.is_empty() {
            return Err(Error::BranchesFailed { failed, total: hosts.len() });
        }
        Ok(resolved)
    }

    async fn probe_host(&self, host: &str) -> Result<ProbeOutcome, Error> {
        if let Some(message) = self.broadcast.get_ignored_status(host).await? {
            return Ok(ProbeOutcome::Ignored { host: host.to_string(), message });
        }

        let proc = RemoteProcess::new(
            Uri::new(ComponentKind::Host, host, None, None),
            vec!["/usr/bin/yadt-status".to_string()],
        );
        let outcome = proc.run_over_ssh(host, None, true).await?;
        match outcome.exit_code {
            0 => {
                let raw = outcome.data.unwrap_or_default();
                let record = decode_host_record(&raw)?;
                Ok(ProbeOutcome::Resolved { host: host.to_string(), record, raw })
            }
            255 if self.config.ignore_unreachable_hosts => {
                Ok(ProbeOutcome::Unreachable { host: host.to_string() })
            }
            255 => Err(Error::Unreachable { host: host.to_string() }),
            127 => Err(Error::MissingMinion { host: host.to_string() }),
            other => Err(Error::RemoteFailure { host: host.to_string(), exit_code: other }),
        }
    }

    fn instantiate_host(
        &self,
        registry: &mut Registry,
        host: &str,
        record: &HostRecord,
        raw: &str,
    ) -> Result<(), Error> {
        let mut h = Host::new(host, record.fqdn.clone());
        h.hostname = record.hostname.clone();
        h.validate_hostname();
        h.services = record.services.clone();
        h.current_artefacts = record.current_artefacts.clone();
        h.next_artefacts = record.next_artefacts.clone();
        h.lockstate = record.lockstate.clone();
        h.reboot_required_to_activate_latest_kernel = record.reboot_required_to_activate_latest_kernel;
        h.reboot_required_after_next_update = record.reboot_required_after_next_update;
        h.handled_artefacts = record.handled_artefacts.clone();
        h.apply_decoded_state();
        let host_uri = h.uri().clone();

        persistence::write_host_data_to_file(&self.config.log_file, host, raw)?;
        persistence::write_host_yaml(&self.config.out_dir, host, record)?;

        registry.insert(Component::Host(h));

        for (name, spec) in &record.services {
            self.classes.resolve(spec.class.as_deref())?;
            let mut svc = Service::new(host_uri.clone(), host, name.clone(), spec);
            svc.set_state_from_description(spec.state.as_deref());
            registry.insert(Component::Service(svc));
        }

        for entry in &record.current_artefacts {
            if let Some(artefact) = Artefact::from_entry(host_uri.clone(), host, entry, Revision::Current) {
                registry.insert_artefact(artefact);
            }
        }
        for entry in &record.next_artefacts {
            if let Some(artefact) = Artefact::from_entry(host_uri.clone(), host, entry, Revision::Next) {
                registry.insert_artefact(artefact);
            }
        }

        Ok(())
    }

    async fn run_local_state(&self, registry: &mut Registry) -> Result<(), Error> {
        let serverside: Vec<Uri> = registry
            .iter()
            .filter_map(|c| match c {
                Component::Service(s) if s.state_handling == StateHandling::Serverside => {
                    Some(s.uri().clone())
                }
                _ => None,
            })
            .collect();

        for uri in serverside {
            let directive = match registry.get(&uri) {
                Some(Component::Service(s)) => s.status(),
                _ => continue,
            };
            if let Directive::Remote(cmd) = directive {
                let proc = RemoteProcess::new(uri.clone(), cmd.argv.clone());
                let outcome = proc.run_local(cmd.stdin.as_deref(), false).await?;
                if let Some(Component::Service(s)) = registry.get_mut(&uri) {
                    s.apply_probe_result(outcome.success());
                }
            }
        }

        if let Some(collector) = &self.collector {
            collector.notify();
        }

        Ok(())
    }

    async fn resolve_missing(&self, registry: &mut Registry) -> Result<(), Error> {
        let missing: Vec<Uri> = registry
            .iter()
            .filter_map(|c| matches!(c, Component::Missing(_)).then(|| c.uri().clone()))
            .collect();

        for uri in missing {
            match uri.kind() {
                ComponentKind::Host => {
                    let host = uri.host().to_string();
                    match self.probe_host(&host).await? {
                        ProbeOutcome::Ignored { host, message } => {
                            registry.insert(Component::Ignored(IgnoredHost::new(host, message)));
                        }
                        ProbeOutcome::Unreachable { host } => {
                            registry.insert(Component::Unreachable(UnreachableHost::new(host)));
                        }
                        ProbeOutcome::Resolved { host, record, raw } => {
                            self.instantiate_host(registry, &host, &record, &raw)?;
                        }
                    }
                }
                ComponentKind::Service => {
                    let host = uri.host().to_string();
                    let name = uri.name().unwrap_or_default().to_string();
                    let host_uri = Uri::new(ComponentKind::Host, host.clone(), None, None);
                    let mut readonly = ReadonlyService::new(host_uri, &host, name.clone());

                    let proc = RemoteProcess::new(
                        uri.clone(),
                        vec!["yadt-service-status".to_string(), name],
                    );
                    let outcome = proc.run_over_ssh(&host, None, false).await?;
                    readonly.apply_probe_result(outcome.success());
                    registry.insert(Component::ReadonlyService(readonly));
                }
                ComponentKind::Artefact => {
                    // No resolution is defined for a missing artefact; it
                    // stays a sentinel.
                }
            }
        }

        Ok(())
    }

    async fn broadcast_full_update(&self, registry: &Registry) {
        let mut by_host: std::collections::BTreeMap<String, HostSnapshot> = std::collections::BTreeMap::new();
        for component in registry.iter() {
            match component {
                Component::Service(s) => {
                    by_host
                        .entry(s.host_uri.host().to_string())
                        .or_insert_with(|| HostSnapshot {
                            name: s.host_uri.host().to_string(),
                            services: Vec::new(),
                            artefacts: Vec::new(),
                        })
                        .services
                        .push((s.uri().to_string(), s.name.clone(), component.state().to_string()));
                }
                Component::Artefact(a) => {
                    by_host
                        .entry(a.host_uri.host().to_string())
                        .or_insert_with(|| HostSnapshot {
                            name: a.host_uri.host().to_string(),
                            services: Vec::new(),
                            artefacts: Vec::new(),
                        })
                        .artefacts
                        .push((a.uri().to_string(), a.name.clone(), a.revision == Revision::Current));
                }
                _ => {}
            }
        }
        let groups = vec![by_host.into_values().collect::<Vec<_>>()];
        self.broadcast.send_full_update(&groups, "").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_are_sane() {
        let config = PipelineConfig::default();
        assert!(!config.ignore_unreachable_hosts);
    }
}
