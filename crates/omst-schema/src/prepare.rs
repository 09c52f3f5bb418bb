//! Validation-time preparation of a scenario copy.
//!
//! Scenario files are often templates completed at deployment time: the
//! work-unit id is assigned by the job server and the fitted parameter
//! block may be a `@parameters@` placeholder. Neither is a translation
//! error, so both are filled in before validation.

use omst_core::{names, Document, DocumentError, NodeId, NodeKind, SchemaVersion};

/// Work-unit id written into the copy that is validated.
const VALIDATION_WU_ID: &str = "123";

/// `assimMode` is mandatory up to this version.
const LAST_VERSION_WITH_ASSIM_MODE: SchemaVersion = SchemaVersion(23);

/// Return the copy of `doc` that is validated against the schema for
/// `version`.
pub fn prepare_for_validation(doc: &Document, version: SchemaVersion) -> Result<Document, DocumentError> {
    let mut copy = doc.clone();
    let root = copy.root();
    copy.remove_attr(root, names::SCHEMA_LOCATION);
    if version <= LAST_VERSION_WITH_ASSIM_MODE {
        copy.set_attr(root, names::ASSIM_MODE, "0");
    }
    copy.set_attr(root, names::WU_ID, VALIDATION_WU_ID);

    for placeholder in parameter_placeholders(&copy) {
        let block = dummy_parameters(&mut copy);
        copy.replace_child(placeholder, block)?;
    }
    Ok(copy)
}

/// Text nodes holding the `@parameters@` placeholder, in document order.
fn parameter_placeholders(doc: &Document) -> Vec<NodeId> {
    let root = doc.root();
    let mut elements = vec![root];
    elements.extend(doc.descendant_elements(root));
    elements
        .into_iter()
        .flat_map(|e| doc.children(e))
        .filter(|c| {
            doc.kind(*c) == NodeKind::Text && doc.value(*c).contains(names::PARAMETERS_PLACEHOLDER)
        })
        .collect()
}

fn dummy_parameters(doc: &mut Document) -> NodeId {
    let params = doc.create_element(names::PARAMETERS);
    for attr in ["latentp", "delta", "interval", "iseed"] {
        doc.set_attr(params, attr, "0");
    }
    let p = doc.append_element(params, "parameter");
    for attr in ["value", "name", "number"] {
        doc.set_attr(p, attr, "0");
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use omst_core::parse_document;

    #[test]
    fn fills_deployment_fields() {
        let xml = r#"<scenario schemaVersion="20" xsi:noNamespaceSchemaLocation="scenario_20.xsd"/>"#;
        let doc = parse_document(xml).unwrap();
        let copy = prepare_for_validation(&doc, SchemaVersion(20)).unwrap();
        let root = copy.root();
        assert!(!copy.has_attr(root, names::SCHEMA_LOCATION));
        assert_eq!(copy.attr(root, names::WU_ID), Some("123"));
        assert_eq!(copy.attr(root, names::ASSIM_MODE), Some("0"));

        // The input is untouched.
        assert!(doc.has_attr(doc.root(), names::SCHEMA_LOCATION));
        assert!(!doc.has_attr(doc.root(), names::WU_ID));
    }

    #[test]
    fn assim_mode_only_for_old_schemas() {
        let doc = parse_document(r#"<scenario schemaVersion="24"/>"#).unwrap();
        let copy = prepare_for_validation(&doc, SchemaVersion(24)).unwrap();
        assert!(!copy.has_attr(copy.root(), names::ASSIM_MODE));
    }

    #[test]
    fn replaces_parameters_placeholder() {
        let xml = r#"<scenario><model><clinical/>@parameters@</model></scenario>"#;
        let doc = parse_document(xml).unwrap();
        let copy = prepare_for_validation(&doc, SchemaVersion(31)).unwrap();
        let model = copy.require_child(copy.root(), "model").unwrap();
        let kids: Vec<_> = copy.children(model).iter().map(|c| copy.name(*c).to_string()).collect();
        assert_eq!(kids, ["clinical", "parameters"]);
        let params = copy.require_child(model, "parameters").unwrap();
        assert_eq!(copy.attr(params, "interval"), Some("0"));
        assert_eq!(copy.children_named(params, "parameter").len(), 1);
    }
}
