//! # omst-core: Foundational Types for the Scenario Translator
//!
//! This crate is the leaf of the translator's crate graph. It defines the
//! mutable document tree that every migration step edits in place, the XML
//! codec that loads and writes scenario files, and the schema name constants
//! shared by the step catalogue.
//!
//! ## Key Design Principles
//!
//! 1. **Arena tree with copyable handles.** A [`Document`] owns all of its
//!    nodes; steps hold [`NodeId`] handles. Detached nodes stay in the arena
//!    until the document is dropped, so a handle never dangles.
//!
//! 2. **Snapshots, never live views.** Every multi-node query returns a
//!    materialized `Vec<NodeId>`. Removing or relocating nodes while walking
//!    such a list cannot skip or repeat entries.
//!
//! 3. **At most one child per name by default.** [`Document::child`] fails
//!    with [`DocumentError::DuplicateChild`] when a name occurs more than once.
//!    Repeated collections are read with [`Document::children_named`].
//!
//! 4. **Shared names are constants.** Element and attribute names read by
//!    more than one crate (root versioning attributes, the schema location
//!    hint, validation-time overrides) live in [`names`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `omst-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod codec;
pub mod document;
pub mod error;
pub mod names;
pub mod version;

pub use codec::{parse_document, serialize_document};
pub use document::{Document, NodeId, NodeKind, Position};
pub use error::DocumentError;
pub use version::{SchemaId, SchemaNaming, SchemaVersion, LATEST_VERSION};
