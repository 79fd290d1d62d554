//! Action/plan model and the verb planner.
//!
//! Compiles a user-facing verb and a glob selector into a flat,
//! precondition-ordered [`ActionPlan`] against an already-wired, read-only
//! [`yadt_registry::Registry`]. The executor (`yadt-exec`) is the only
//! consumer that actually dispatches these actions.

#![warn(missing_docs)]

mod action;
mod error;
mod planner;

pub use action::{Action, ActionPlan, Verb};
pub use error::{PlanError, Result};
pub use planner::{Command, PlanOptions, Planner};
