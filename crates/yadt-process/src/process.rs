use std::process::Stdio;

use async_process::Command as AsyncCommand;
use futures_lite::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use yadt_uri::Uri;

use crate::error::{Error, Result};
use crate::ssh::ssh_argv;

/// The result of a remote process running to completion.
///
/// This is the "resolved `done` future" of spec.md's Remote Process
/// Protocol: exit code plus whatever of stdout/stderr was captured.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Process exit code (`-1` if terminated by signal rather than
    /// exiting normally).
    pub exit_code: i32,
    /// Accumulated stdout, present only when the caller asked for it
    /// (e.g. the status decoder).
    pub data: Option<String>,
    /// Accumulated stderr — always captured, for diagnostics.
    pub err: String,
}

impl ProcessOutcome {
    /// True on exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// An argv + optional stdin bound to the component that triggered it.
///
/// `component` is the back-reference spec.md names — whatever fails,
/// callers can attribute the failure to this URI without the process
/// itself needing to know about the registry.
#[derive(Debug, Clone)]
pub struct RemoteProcess {
    /// The component this process acts on behalf of, for error
    /// attribution.
    pub component: Uri,
    /// The remote argv (before any SSH wrapping).
    pub cmd: Vec<String>,
}

impl RemoteProcess {
    /// Describe a new remote process for `component`.
    pub fn new(component: Uri, cmd: Vec<String>) -> Self {
        Self { component, cmd }
    }

    /// Run this process on `host` over SSH, awaiting completion.
    ///
    /// `collect_stdout` controls whether stdout is accumulated into
    /// [`ProcessOutcome::data`] or merely streamed to the trace log —
    /// only the status decoder needs the bytes, everything else only
    /// cares about the exit code. Stderr is always captured.
    pub async fn run_over_ssh(
        &self,
        host: &str,
        stdin: Option<&str>,
        collect_stdout: bool,
    ) -> Result<ProcessOutcome> {
        self.spawn_and_wait(ssh_argv(host, &self.cmd), stdin, collect_stdout)
            .await
    }

    /// Run this process's argv directly on the controller, without SSH —
    /// used for a service's `serverside` status probe.
    pub async fn run_local(&self, stdin: Option<&str>, collect_stdout: bool) -> Result<ProcessOutcome> {
        self.spawn_and_wait(self.cmd.clone(), stdin, collect_stdout).await
    }

    async fn spawn_and_wait(
        &self,
        argv: Vec<String>,
        stdin: Option<&str>,
        collect_stdout: bool,
    ) -> Result<ProcessOutcome> {
        let (program, args) = argv.split_first().expect("argv is never empty");

        debug!(component = %self.component, argv = ?argv, "spawning remote process");

        let mut command = AsyncCommand::new(program);
        command.args(args);
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });

        let mut child = command
            .spawn()
            .map_err(|source| Error::SpawnFailed { argv: argv.clone(), source })?;

        if let Some(input) = stdin {
            let mut child_stdin = child.stdin.take().expect("stdin was requested piped");
            child_stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|source| Error::StdinFailed { argv: argv.clone(), source })?;
            child_stdin
                .close()
                .await
                .map_err(|source| Error::StdinFailed { argv: argv.clone(), source })?;
        }

        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let (out_res, err_res) = futures::join!(
            stdout.read_to_end(&mut out_buf),
            stderr.read_to_end(&mut err_buf)
        );
        out_res.map_err(|source| Error::OutputFailed { argv: argv.clone(), source })?;
        err_res.map_err(|source| Error::OutputFailed { argv: argv.clone(), source })?;

        let status = child
            .status()
            .await
            .map_err(|source| Error::OutputFailed { argv: argv.clone(), source })?;
        let exit_code = status.code().unwrap_or(-1);
        let err = String::from_utf8_lossy(&err_buf).into_owned();
        if !err.is_empty() {
            warn!(component = %self.component, argv = ?argv, stderr = %err, "remote process wrote to stderr");
        }

        let data = if collect_stdout {
            Some(String::from_utf8_lossy(&out_buf).into_owned())
        } else {
            if !out_buf.is_empty() {
                debug!(component = %self.component, stdout = %String::from_utf8_lossy(&out_buf), "remote process stdout");
            }
            None
        };

        Ok(ProcessOutcome { exit_code, data, err })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yadt_uri::{ComponentKind, Uri};

    fn component() -> Uri {
        Uri::new(ComponentKind::Host, "web01", None, None)
    }

    #[smol_potat::test]
    async fn runs_local_echo_and_collects_stdout() {
        let proc = RemoteProcess::new(
            component(),
            vec!["echo".to_string(), "hello".to_string()],
        );
        let outcome = proc.run_local(None, true).await.unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.data.as_deref(), Some("hello\n"));
    }

    #[smol_potat::test]
    async fn nonzero_exit_is_not_success() {
        let proc = RemoteProcess::new(component(), vec!["false".to_string()]);
        let outcome = proc.run_local(None, false).await.unwrap();
        assert!(!outcome.success());
    }

    #[smol_potat::test]
    async fn stdin_is_forwarded() {
        let proc = RemoteProcess::new(component(), vec!["cat".to_string()]);
        let outcome = proc.run_local(Some("update"), true).await.unwrap();
        assert_eq!(outcome.data.as_deref(), Some("update"));
    }

    #[smol_potat::test]
    async fn spawn_failure_is_infrastructure_error() {
        let proc = RemoteProcess::new(
            component(),
            vec!["definitely-not-a-real-binary".to_string()],
        );
        let err = proc.run_local(None, false).await.unwrap_err();
        assert!(matches!(err, Error::SpawnFailed { .. }));
    }
}
