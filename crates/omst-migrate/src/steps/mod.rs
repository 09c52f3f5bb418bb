//! # Step Catalogue
//!
//! One function per version increment, grouped by range. Every function
//! has the [`StepFn`](crate::step::StepFn) signature and is registered in
//! [`registry`](crate::registry).
//!
//! Helpers shared by several steps live here.

use omst_core::{Document, DocumentError, NodeId};

use crate::policy::Policy;
use crate::step::{StepLog, StepResult};

pub mod v00_v10;
pub mod v10_v20;
pub mod v20_v31;

/// Registered for increments that introduced only optional additions.
pub fn no_changes(_doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    Ok(())
}

/// Format a number the way scenario files have always written derived
/// values: shortest round-trip form, always with a decimal point.
pub(crate) fn fmt_f64(v: f64) -> String {
    format!("{v:?}")
}

/// Append a new element carrying the given attributes in order.
pub(crate) fn append_with_attrs(
    doc: &mut Document,
    parent: NodeId,
    name: &str,
    attrs: &[(&str, &str)],
) -> NodeId {
    let id = doc.append_element(parent, name);
    for (k, v) in attrs {
        doc.set_attr(id, k, *v);
    }
    id
}

/// Create a detached element carrying the given attributes in order.
pub(crate) fn create_with_attrs(doc: &mut Document, name: &str, attrs: &[(&str, &str)]) -> NodeId {
    let id = doc.create_element(name);
    for (k, v) in attrs {
        doc.set_attr(id, k, *v);
    }
    id
}

/// Append `<option name=".." value=".."/>`.
pub(crate) fn append_option(doc: &mut Document, options: NodeId, name: &str, value: bool) -> NodeId {
    append_with_attrs(
        doc,
        options,
        "option",
        &[("name", name), ("value", if value { "true" } else { "false" })],
    )
}

/// The `<option>` child of `options` with the given name, if any.
pub(crate) fn find_option(doc: &Document, options: NodeId, name: &str) -> Option<NodeId> {
    doc.children_named(options, "option")
        .into_iter()
        .find(|o| doc.attr(*o, "name") == Some(name))
}

/// Options that are enabled when a scenario does not mention them.
const DEFAULT_ON_OPTIONS: &[&str] = &["MAX_DENS_CORRECTION"];

/// Whether the scenario's `ModelOptions` enable `name`.
pub(crate) fn uses_option(doc: &Document, name: &str) -> Result<bool, DocumentError> {
    let root = doc.root();
    let options = doc
        .first_descendant(root, "ModelOptions")
        .ok_or_else(|| DocumentError::MissingElement {
            parent: doc.name(root).to_string(),
            name: "ModelOptions".to_string(),
        })?;
    match find_option(doc, options, name) {
        Some(o) => Ok(doc
            .attr(o, "value")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))),
        None => Ok(DEFAULT_ON_OPTIONS.contains(&name)),
    }
}

/// The first descendant of the root with the given name, which must exist.
pub(crate) fn require_descendant(doc: &Document, name: &str) -> Result<NodeId, DocumentError> {
    let root = doc.root();
    doc.first_descendant(root, name)
        .ok_or_else(|| DocumentError::MissingElement {
            parent: doc.name(root).to_string(),
            name: name.to_string(),
        })
}
