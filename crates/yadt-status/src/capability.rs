use async_trait::async_trait;
use futures_lite::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::Error;

/// A host's services and artefacts, as reported in a broadcast snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HostSnapshot {
    /// Short hostname.
    pub name: String,
    /// `(uri, name, state)` triples for this host's services.
    pub services: Vec<(String, String, String)>,
    /// `(uri, name, is_current)` triples for this host's artefacts.
    pub artefacts: Vec<(String, String, bool)>,
}

/// The pub/sub broadcast collaborator spec.md treats as external: an
/// ignored-status lookup, and tracking-update emission.
///
/// A capability interface (per spec.md §9's design note) so tests can
/// substitute a fake instead of reaching the network.
#[async_trait]
pub trait BroadcastClient: Send + Sync {
    /// Query whether `host` is administratively ignored. `Some(message)`
    /// if so; `None` otherwise.
    async fn get_ignored_status(&self, host: &str) -> Result<Option<String>, Error>;

    /// Notify the broadcast service of a single host's change.
    async fn send_host_change(&self, host: &str, snapshot: &HostSnapshot);

    /// Notify the broadcast service of the full, group-ordered snapshot
    /// built at the end of a run.
    async fn send_full_update(&self, groups: &[Vec<HostSnapshot>], tracking_id: &str);
}

/// Expands a host-group pattern (as declared in target configuration)
/// into concrete hostnames.
///
/// A capability interface so the planner and status pipeline don't need
/// to know how groups are declared.
pub trait HostExpander: Send + Sync {
    /// Expand `pattern` into the hostnames it denotes.
    fn expand(&self, pattern: &str) -> Vec<String>;
}

/// An expander with no group knowledge: every pattern expands to itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityExpander;

impl HostExpander for IdentityExpander {
    fn expand(&self, pattern: &str) -> Vec<String> {
        vec![pattern.to_string()]
    }
}

/// A designated service's hook, notified once every per-host status
/// branch has settled (`status.py`'s `local_service_collector`).
///
/// At most one service per run registers one of these; the pipeline
/// looks it up by name once instantiation completes.
pub trait LocalServiceCollector: Send + Sync {
    /// Called once after all per-host branches have joined.
    fn notify(&self);
}

/// A [`BroadcastClient`] that never reaches the network: every host is
/// reported reachable, and outgoing notifications are only logged. Used
/// in tests and as the default when no broadcast endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpBroadcastClient;

#[async_trait]
impl BroadcastClient for NoOpBroadcastClient {
    async fn get_ignored_status(&self, host: &str) -> Result<Option<String>, Error> {
        trace!(host, "no-op broadcast client: host is never ignored");
        Ok(None)
    }

    async fn send_host_change(&self, host: &str, _snapshot: &HostSnapshot) {
        debug!(host, "no-op broadcast client: dropping host-change notification");
    }

    async fn send_full_update(&self, groups: &[Vec<HostSnapshot>], tracking_id: &str) {
        let host_count: usize = groups.iter().map(|g| g.len()).sum();
        debug!(host_count, tracking_id, "no-op broadcast client: dropping full update");
    }
}

/// A [`BroadcastClient`] whose ignored-status lookup is a hand-rolled
/// HTTP/1.1 GET to `http://<base>/api/v1/hosts/<short>/status-ignored`
/// over `async-net`, in the same "build the wire protocol directly"
/// idiom the corpus uses for its own websocket/registry protocols rather
/// than pulling in a full HTTP client stack.
///
/// Full-update/host-change notifications are logged only; spec.md treats
/// the write side of the broadcast client as an opaque external
/// collaborator offering `sendFullUpdate`/`sendHostChange` and doesn't
/// fix a wire format for them.
#[derive(Debug, Clone)]
pub struct HttpBroadcastClient {
    base: String,
    retry_count: u32,
}

impl HttpBroadcastClient {
    /// `base` is `host:port` of the broadcast service, no scheme.
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into(), retry_count: 3 }
    }

    /// Override the retry count (default 3, per spec.md §7).
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    async fn get_once(&self, path: &str) -> std::io::Result<(u16, String)> {
        let mut stream = async_net::TcpStream::connect(&self.base).await?;
        let request = format!(
            "GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n",
            path = path,
            host = self.base,
        );
        stream.write_all(request.as_bytes()).await?;
        stream.flush().await?;

        let mut response = String::new();
        stream.read_to_string(&mut response).await?;

        let mut lines = response.splitn(2, "\r\n\r\n");
        let head = lines.next().unwrap_or_default();
        let body = lines.next().unwrap_or_default().to_string();
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .unwrap_or(0);
        Ok((status, body))
    }
}

#[async_trait]
impl BroadcastClient for HttpBroadcastClient {
    async fn get_ignored_status(&self, host: &str) -> Result<Option<String>, Error> {
        let path = format!("/api/v1/hosts/{host}/status-ignored");
        let mut last_err = None;
        for attempt in 0..=self.retry_count {
            match self.get_once(&path).await {
                Ok((status, body)) if (200..300).contains(&status) => {
                    return Ok(Some(body));
                }
                Ok(_) => return Ok(None),
                Err(err) => {
                    trace!(host, attempt, error = %err, "ignored-status probe failed, retrying");
                    last_err = Some(err);
                    async_io::Timer::after(std::time::Duration::from_secs(1)).await;
                }
            }
        }
        Err(Error::Io(last_err.expect("loop runs at least once")))
    }

    async fn send_host_change(&self, host: &str, _snapshot: &HostSnapshot) {
        debug!(host, base = %self.base, "would send host-change notification");
    }

    async fn send_full_update(&self, groups: &[Vec<HostSnapshot>], tracking_id: &str) {
        let host_count: usize = groups.iter().map(|g| g.len()).sum();
        debug!(host_count, tracking_id, base = %self.base, "would send full update");
    }
}
