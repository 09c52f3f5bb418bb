//! # omst-migrate: Scenario Version Migration
//!
//! Upgrades a parsed scenario [`Document`](omst_core::Document) from the
//! schema version it declares to a requested target, one version increment
//! at a time.
//!
//! ## Architecture
//!
//! - [`policy`]: operator choices for upgrades that cannot be decided from
//!   the document alone.
//! - [`step`]: the step signature, failures and the per-document warning log.
//! - [`steps`]: one function per increment, 0→1 through 30→31.
//! - [`registry`]: the static table mapping increments to steps.
//! - [`dispatch`]: drives a document through the registry and stamps the
//!   version after every step.
//! - [`one_day`]: optional conversion of 5-day fitting scenarios to 1-day
//!   timesteps, applied after migrating to version 18.
//!
//! ## Failure Model
//!
//! Every failure aborts the document. Steps never guess: an ambiguity with
//! no policy decision, an unrecognised enumerant or a missing required
//! element all surface as a [`MigrationError`] naming the transition.

pub mod dispatch;
pub mod error;
pub mod one_day;
pub mod policy;
pub mod registry;
pub mod step;
pub mod steps;

pub use dispatch::{Dispatcher, MigrationOutcome};
pub use error::MigrationError;
pub use one_day::ONE_DAY_BASELINE;
pub use policy::{BugCorrection, IptiSpOption, ItnDescription, Policy, PolicyField, ReportOnlyAtRisk};
pub use registry::{lookup, steps as registered_steps, StepEntry};
pub use step::{StepFailure, StepFn, StepLog, StepResult, StepWarning, Transition};
