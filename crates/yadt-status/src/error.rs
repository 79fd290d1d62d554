use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the status pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A host's SSH probe exited 255 and `ignore_unreachable_hosts` was
    /// not set.
    #[error("host {host} is unreachable")]
    Unreachable {
        /// The short hostname.
        host: String,
    },
    /// A host's SSH probe exited 127 (no `yadt-status` installed).
    #[error("host {host} has no minion installed")]
    MissingMinion {
        /// The short hostname.
        host: String,
    },
    /// A host's SSH probe exited with a code other than 0, 127 or 255.
    #[error("host {host} status probe exited with unexpected code {exit_code}")]
    RemoteFailure {
        /// The short hostname.
        host: String,
        /// The exit code reported.
        exit_code: i32,
    },
    /// A selector or flag combination was invalid.
    #[error("usage error: {0}")]
    Usage(String),
    /// A host's stdout decoded as neither JSON nor YAML.
    #[error("could not decode host record as JSON ({json_err}) or YAML ({yaml_err})")]
    Decode {
        /// The JSON decode failure.
        json_err: serde_json::Error,
        /// The YAML decode failure.
        yaml_err: serde_yaml::Error,
    },
    /// A component-level error surfaced during wiring or instantiation.
    #[error(transparent)]
    Component(#[from] yadt_registry::ComponentError),
    /// A remote process could not be spawned or its I/O failed.
    #[error(transparent)]
    Process(#[from] yadt_process::Error),
    /// Persisting the registry to disk failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Encoding or decoding the binary registry snapshot failed.
    #[error("failed to encode registry snapshot: {0}")]
    Snapshot(String),
    /// A non-`status` verb needs a persisted registry but none exists yet.
    #[error("no status snapshot found under {}; run `status` first", out_dir.display())]
    NoSnapshot {
        /// The directory that was checked for `current_state.components`.
        out_dir: PathBuf,
    },
    /// One or more per-host probe branches failed; the pipeline as a
    /// whole fails even though the other branches succeeded.
    #[error("{} of {} host branches failed: {}", failed.len(), total, failed.join(", "))]
    BranchesFailed {
        /// Hostnames whose branch failed.
        failed: Vec<String>,
        /// Total hosts attempted.
        total: usize,
    },
}

/// Crate-local `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;
