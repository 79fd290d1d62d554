use serde::{Deserialize, Serialize};
use std::fmt;

/// The state a component can be in. Not every kind uses every variant —
/// see each constructor for the subset it restricts itself to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    /// State has not yet been determined.
    Unknown,
    /// A service is running.
    Up,
    /// A service is not running.
    Down,
    /// An artefact is installed.
    Installed,
    /// A sentinel for a URI referenced but never materialized.
    Missing,
    /// A host has artefacts pending (`next_artefacts` non-empty).
    UpdateNeeded,
    /// A host has no pending artefacts.
    Uptodate,
}

impl ComponentState {
    /// True for the "up"-equivalent states (`Up`, `Installed`, `Uptodate`).
    pub fn is_up(self) -> bool {
        matches!(
            self,
            ComponentState::Up | ComponentState::Installed | ComponentState::Uptodate
        )
    }

    /// True for `Unknown`.
    pub fn is_unknown(self) -> bool {
        matches!(self, ComponentState::Unknown)
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentState::Unknown => "unknown",
            ComponentState::Up => "up",
            ComponentState::Down => "down",
            ComponentState::Installed => "installed",
            ComponentState::Missing => "missing",
            ComponentState::UpdateNeeded => "update_needed",
            ComponentState::Uptodate => "uptodate",
        };
        f.write_str(s)
    }
}

/// Resolve a freeform state description string (as decoded from a host
/// record's service spec) to a [`ComponentState`]. Unrecognized strings
/// map to `Unknown` rather than erroring — the decoder only ever sees
/// this table, never the raw exception paths of the original source.
pub fn state_from_description(description: &str) -> ComponentState {
    match description {
        "up" => ComponentState::Up,
        "down" => ComponentState::Down,
        "installed" => ComponentState::Installed,
        "update_needed" => ComponentState::UpdateNeeded,
        "uptodate" => ComponentState::Uptodate,
        _ => ComponentState::Unknown,
    }
}
