//! Typed component model and registry.
//!
//! Hosts, services, artefacts and their placeholder stand-ins, wired into
//! a dependency graph by a [`Registry`]. Components never hold references
//! to one another — only peer URIs — so the registry is the only owner of
//! the graph and the only thing that mutates it, and only during wiring.

#![warn(missing_docs)]

mod artefact;
mod command;
mod component;
mod error;
mod host;
mod missing;
mod registry;
mod service;
mod state;

pub use artefact::Artefact;
pub use command::{Directive, RemoteCommand};
pub use component::{Base, Component};
pub use error::ComponentError;
pub use host::{Host, IgnoredHost, LockState, ServiceSpec, UnreachableHost};
pub use missing::MissingComponent;
pub use registry::Registry;
pub use service::{ReadonlyService, Service, StateHandling};
pub use state::{state_from_description, ComponentState};
