/// A remote command descriptor identifying what the executor should run
/// over SSH on behalf of a mutating component operation.
///
/// Components never spawn processes themselves — they only describe one;
/// `yadt-exec` (via `yadt-process`) is responsible for actually running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    /// The remote argv, e.g. `["yadt-host-lock", "maintenance"]`.
    pub argv: Vec<String>,
    /// Data written to the remote process's stdin, if any (`yadt-yum
    /// upgrade` reads `update` this way).
    pub stdin: Option<String>,
    /// A short label identifying the operation, used in logging and error
    /// attribution (`"lock"`, `"start"`, `"host-update"`, ...).
    pub tag: String,
    /// Whether `--force` was requested for this operation.
    pub force_flag: bool,
}

impl RemoteCommand {
    /// Build a descriptor from argv parts and a tag, with no stdin and no
    /// force flag.
    pub fn new(tag: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            argv,
            stdin: None,
            tag: tag.into(),
            force_flag: false,
        }
    }

    /// Attach stdin data to this descriptor.
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Mark this descriptor as force-flagged.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force_flag = force;
        self
    }
}

/// The outcome of requesting a mutating operation on a component.
///
/// Most operations yield a [`RemoteCommand`] for the executor to run.
/// Operations on an `IgnoredHost`, or `status` on most component kinds
/// that turn out to be local-only, instead complete immediately with a
/// synthetic success — `Noop` models that without inventing a fake
/// subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Run this remote command.
    Remote(RemoteCommand),
    /// Complete with a synthetic success; nothing is spawned.
    Noop,
}
