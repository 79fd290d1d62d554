//! The status pipeline: probe every host over SSH, decode its record,
//! wire the results into a [`yadt_registry::Registry`], and persist it.
//!
//! This crate owns everything between "a list of hostnames" and "a wired,
//! persisted registry" — probing, decoding, service-class resolution,
//! missing-component resolution, and the broadcast/host-expander/local-
//! service capability interfaces the pipeline is built against instead of
//! concrete infrastructure.

#![warn(missing_docs)]

mod capability;
mod class_registry;
mod error;
mod persistence;
mod pipeline;
mod record;

pub use capability::{
    BroadcastClient, HostExpander, HostSnapshot, HttpBroadcastClient, IdentityExpander,
    LocalServiceCollector, NoOpBroadcastClient,
};
pub use class_registry::ServiceClassRegistry;
pub use error::{Error, Result};
pub use persistence::{load_registry, persist_registry, render_statusline, RegistrySnapshot};
pub use pipeline::{PipelineConfig, StatusPipeline};
pub use record::{decode_host_record, Defaults, HostRecord};
