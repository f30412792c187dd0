//! # Converge
//!
//! The reconciliation engine behind `cairn`: given a desired system state
//! (composed from one or more YAML documents) and the current state of a
//! live Alpine Linux installation, compute an ordered plan of discrete
//! actions and apply it transactionally, rolling completed actions back in
//! reverse order when one fails.
//!
//! ## Core Concepts
//!
//! - **SystemState**: one shape for both desired and current state
//!   (packages, services, users, managed config files, per-user packages)
//! - **Action**: a single mutation with `apply` and a compensating
//!   `rollback`, plus a stable description and preview details
//! - **Plan**: an ordered `Vec<Action>` produced by the diff engine and
//!   consumed linearly by the executor
//! - **Host**: the injected pair of command runner + filesystem every
//!   stage operates through, so tests can swap in mocks
//!
//! ## Pipeline
//!
//! ```ignore
//! let host = Host::new(&runner, &fs);
//! let desired = config::load_config(Path::new("system.yaml"), &host)?;
//! let (current, _ignored) = scanner::infer_system_state(&host, false)?;
//! let mut plan = diff::calculate_plan(&desired, &current, &host, false)?;
//! executor::execute_plan(&mut plan, &host)?;
//! ```

pub mod action;
pub mod config;
pub mod diff;
pub mod error;
pub mod executor;
pub mod filesystem;
pub mod glob;
pub mod host;
pub mod model;
pub mod plan;
pub mod runner;
pub mod scanner;
pub mod validate;

#[cfg(test)]
pub(crate) mod testutil;

pub use action::Action;
pub use config::load_config;
pub use diff::calculate_plan;
pub use error::{Error, Result};
pub use executor::execute_plan;
pub use filesystem::{Filesystem, MemFs, OsFs};
pub use host::Host;
pub use model::{IgnoredConfig, SystemState};
pub use plan::{plan_entries, render_plan_text, PlanEntry};
pub use runner::{CommandRunner, LiveCommandRunner};
pub use scanner::infer_system_state;
