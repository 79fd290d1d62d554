//! The remote process protocol.
//!
//! Wraps an argv + optional stdin, runs it either over SSH or locally on
//! the controller, and reports a [`ProcessOutcome`] carrying exit code
//! and captured output. Spawn/IO failures are the crate's own
//! [`Error`] — what spec.md calls an INFRASTRUCTURE error, as distinct
//! from a process that ran and simply exited non-zero.

#![warn(missing_docs)]

mod error;
mod process;
mod ssh;

pub use error::{Error, Result};
pub use process::{ProcessOutcome, RemoteProcess};
pub use ssh::{format_remote_command, shell_escape, ssh_argv};
