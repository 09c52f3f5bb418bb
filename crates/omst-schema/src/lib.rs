//! # omst-schema: Validation Gate
//!
//! Checks a translated scenario against the XSD schema for its version
//! before it is written out.
//!
//! ## Validation (`validate`)
//!
//! [`SchemaValidator`] indexes the `*.xsd` files of a schema folder and runs
//! an external XSD validator (`xmllint` by default) on a prepared copy of
//! each document. The validator's diagnostics are parsed into structured
//! [`Violation`]s.
//!
//! ## Preparation (`prepare`)
//!
//! [`prepare_for_validation`] produces the throw-away copy that is actually
//! validated. Deployment-time placeholders (`wuID`, the `@parameters@`
//! block) are filled in so that template scenarios validate. The caller's
//! document is never modified.
//!
//! ## Crate Policy
//!
//! - Depends only on `omst-core` internally.
//! - Validation is the last gate before output: a document that fails it
//!   is never written.

pub mod prepare;
pub mod validate;

pub use omst_core::{SchemaId, SchemaNaming};
pub use prepare::prepare_for_validation;
pub use validate::{
    parse_diagnostics, SchemaValidationError, SchemaValidator, ValidationGate, ValidationViolations,
    Violation,
};
