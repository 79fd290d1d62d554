use thiserror::Error;

/// Errors raised by the remote process protocol.
///
/// Every variant here is what spec.md calls an INFRASTRUCTURE error: the
/// process could not be spawned or its I/O failed, as opposed to the
/// process running and exiting non-zero (which the caller classifies
/// itself from the exit code).
#[derive(Debug, Error)]
pub enum Error {
    /// The subprocess could not be spawned at all.
    #[error("failed to spawn {argv:?}: {source}")]
    SpawnFailed {
        /// The argv that failed to spawn.
        argv: Vec<String>,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Writing to the child's stdin failed.
    #[error("failed writing to stdin of {argv:?}: {source}")]
    StdinFailed {
        /// The argv whose stdin write failed.
        argv: Vec<String>,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Reading the child's stdout/stderr failed.
    #[error("failed reading output of {argv:?}: {source}")]
    OutputFailed {
        /// The argv whose output read failed.
        argv: Vec<String>,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Crate-local `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;
