//! # omst-cli: Scenario Translator Command-Line Interface
//!
//! Provides the `omst` command, which upgrades folders of OpenMalaria
//! scenario files to a target schema version.
//!
//! ## Subcommands
//!
//! - `omst translate`: batch translation with optional validation.
//! - `omst steps`: list the registered translation steps.
//!
//! ```bash
//! omst translate --input-folder scenarios --output-folder out --max-dens-correction true
//! omst -v --config policy.yaml translate --jobs 8 --report report.json
//! omst steps --json
//! ```
//!
//! ## Crate Policy
//!
//! - Argument parsing and configuration live here; translation logic lives
//!   in `omst-migrate` and validation in `omst-schema`.
//! - Per-document failures are reported, never fatal to the batch.

pub mod batch;
pub mod config;
pub mod steps;
pub mod translate;
