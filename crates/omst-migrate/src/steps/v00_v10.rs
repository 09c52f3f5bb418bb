//! Steps 1→2 through 7→8.

use omst_core::{names, Document, Position};

use crate::policy::Policy;
use crate::step::{StepFailure, StepLog, StepResult};

/// Namespace and root defaults, `nspore` → `eipDuration`, `best` → `value`.
pub fn translate_1_to_2(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    doc.set_attr(root, names::XMLNS_XSI, names::XSI_NAMESPACE);
    if !doc.has_attr(root, names::WU_ID) {
        doc.set_attr(root, names::WU_ID, "0");
    }
    if !doc.has_attr(root, names::ASSIM_MODE) {
        doc.set_attr(root, names::ASSIM_MODE, "0");
    }

    let mut with_first_day = Vec::new();
    if let Some(ento) = doc.child(root, "entoData")? {
        with_first_day.push(ento);
    }
    with_first_day.extend(doc.descendants_named(root, "changeEIR"));
    for elt in with_first_day {
        if doc.remove_attr(elt, "firstDay").is_some() {
            log.warn(format!("removed firstDay attribute from <{}>", doc.name(elt)));
        }
    }

    for sources in doc.descendants_named(root, "sources") {
        doc.detach(sources);
    }
    for item in doc.descendants_named(root, "item") {
        doc.set_text(item, "");
    }

    if let Some(params) = doc.first_descendant(root, "parameters") {
        doc.remove_attr(params, "useIseed");
        let nspore: i64 = doc.require_attr_parse(params, "nspore")?;
        doc.set_attr(params, "eipDuration", (nspore * 5).to_string());
        doc.remove_attr(params, "nspore");
    }

    for mda in doc.descendants_named(root, "MDA") {
        doc.set_attr(mda, "minAge", "0");
        doc.set_attr(mda, "maxAge", "99");
        doc.set_attr(mda, "coverage", "1");
    }

    for el in doc.descendant_elements(root) {
        doc.rename_attr(el, "best", "value");
    }
    Ok(())
}

/// `EIRDaily` lists move under a new `nonVector` element and `anopheles`
/// lists under a new `vector` element; `eipDuration` moves from the
/// parameters to `nonVector` and to forced-EIR interventions.
pub fn translate_3_to_4(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let eip = match doc.child(root, "parameters")? {
        Some(params) => doc.remove_attr(params, "eipDuration"),
        None => None,
    };
    let eip_value = eip.as_deref().unwrap_or("10").to_string();

    if let Some(ento) = doc.child(root, "entoData")? {
        let eirs = doc.descendants_named(ento, "EIRDaily");
        if !eirs.is_empty() {
            let non_vector = doc.append_element(ento, "nonVector");
            for eir in eirs {
                doc.move_node(eir, non_vector, Position::Last)?;
            }
            doc.set_attr(non_vector, "eipDuration", eip_value.as_str());
        }

        let species = doc.descendants_named(ento, "anopheles");
        if !species.is_empty() {
            let vector = doc.append_element(ento, "vector");
            for anoph in species {
                doc.remove_attr(anoph, "useNv0Guess");
                doc.move_node(anoph, vector, Position::Last)?;
            }
        }
        doc.remove_attr(ento, "inputType");
    }

    if let Some(timed) = doc.path(root, &["interventions", "timed"])? {
        for interv in doc.descendants_named(timed, "intervention") {
            if let Some(change_eir) = doc.child(interv, "changeEIR")? {
                doc.remove_attr(change_eir, "inputType");
                doc.remove_attr(change_eir, "name");
                doc.set_attr(change_eir, "eipDuration", eip_value.as_str());
            }
        }
    }
    Ok(())
}

const INCIDENCE_MODEL_FLAGS: i64 = 0x68;
const LOGNORMAL_MASS_ACTION_PLUS_PRE_IMM: i64 = 1 << 5;

/// Infection-incidence model flags changed meaning. A scenario using only
/// `LOGNORMAL_MASS_ACTION_PLUS_PRE_IMM` is kept with a warning; mixing it with
/// another incidence flag was never valid.
pub fn translate_4_to_5(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let flags: i64 = doc.require_attr_parse(root, "modelVersion")?;
    let incidence = flags & INCIDENCE_MODEL_FLAGS;
    if incidence != 0 && flags & LOGNORMAL_MASS_ACTION_PLUS_PRE_IMM != 0 {
        if incidence == LOGNORMAL_MASS_ACTION_PLUS_PRE_IMM {
            log.warn("scenario uses LOGNORMAL_MASS_ACTION_PLUS_PRE_IMM, which has had a bug fixed");
        } else {
            return Err(StepFailure::precondition(format!(
                "modelVersion {flags} combines several infection incidence model flags; this was never valid"
            )));
        }
    }
    Ok(())
}

const CLINICAL_EVENT_SCHEDULER: i64 = 1 << 13;

/// `wuID` is removed; each case-management `nmf` element is split into
/// `nmfP` and `nmfNP`.
pub fn translate_5_to_6(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let flags: i64 = doc.require_attr_parse(root, "modelVersion")?;
    let case_managements = doc.first_descendant(root, "caseManagements");
    doc.remove_attr(root, names::WU_ID);

    if flags & CLINICAL_EVENT_SCHEDULER != 0 {
        if doc.first_descendant(root, "healthSystem").is_some() {
            log.warn("healthSystem element present but not used");
        }
    } else if case_managements.is_some() {
        log.warn("caseManagement element present but not used (updating anyway)");
    }

    let Some(cms) = case_managements else {
        return Ok(());
    };
    for cm in doc.descendants_named(cms, "caseManagement") {
        doc.remove_attr(cm, "minAgeYrs");
        let nmf_np = doc.require_child(cm, "nmf")?;
        doc.rename(nmf_np, "nmfNP");
        let nmf_p = doc.deep_clone(nmf_np);
        doc.rename(nmf_p, "nmfP");
        doc.insert_before(cm, nmf_p, nmf_np)?;
    }
    Ok(())
}

/// Emergence rates moved into the scenario; the old file reference is
/// dropped.
pub fn translate_7_to_8(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let ento = doc.require_child(root, "entoData")?;
    let Some(vector) = doc.child(ento, "vector")? else {
        return Ok(());
    };
    for anoph in doc.children_named(vector, "anopheles") {
        let mosq = doc.require_child(anoph, "mosq")?;
        if doc.remove_attr(mosq, "emergenceRateFilename").is_some() {
            log.warn(
                "emergence rate data is now stored in the scenario document; \
                 update by hand or run openMalaria with --enableERC",
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_util::{run, run_ok};

    const V1: &str = r#"<scenario schemaVersion="1" modelVersion="0">
        <entoData firstDay="3"><EIRDaily origin="x">1</EIRDaily></entoData>
        <monitoring><sources><x/></sources></monitoring>
        <healthSystem><item maxAgeYrs="5" value="0.1">junk</item><sources/></healthSystem>
        <interventions><timed><intervention time="1"><changeEIR firstDay="2"/><MDA/></intervention></timed></interventions>
        <parameters nspore="2" useIseed="1"><parameter number="1" best="0.5"/></parameters>
    </scenario>"#;

    #[test]
    fn one_to_two_applies_defaults() {
        let (doc, warnings) = run_ok(translate_1_to_2, 2, V1);
        let root = doc.root();
        assert_eq!(doc.attr(root, names::XMLNS_XSI), Some(names::XSI_NAMESPACE));
        assert_eq!(doc.attr(root, names::WU_ID), Some("0"));
        assert_eq!(doc.attr(root, names::ASSIM_MODE), Some("0"));
        assert_eq!(warnings.len(), 2);
        assert!(doc.descendants_named(root, "sources").is_empty());

        let item = doc.first_descendant(root, "item").unwrap();
        assert_eq!(doc.text(item), "");

        let params = doc.require_child(root, "parameters").unwrap();
        assert_eq!(doc.attr(params, "eipDuration"), Some("10"));
        assert!(!doc.has_attr(params, "nspore"));
        assert!(!doc.has_attr(params, "useIseed"));

        let mda = doc.first_descendant(root, "MDA").unwrap();
        assert_eq!(doc.attr(mda, "maxAge"), Some("99"));

        let p = doc.first_descendant(root, "parameter").unwrap();
        assert_eq!(doc.attr(p, "value"), Some("0.5"));
        assert!(!doc.has_attr(p, "best"));
    }

    #[test]
    fn one_to_two_requires_nspore() {
        let (_, r, _) = run(
            translate_1_to_2,
            2,
            "<scenario><parameters/></scenario>",
            &Policy::default(),
        );
        assert!(matches!(r, Err(StepFailure::Structure(_))));
    }

    #[test]
    fn three_to_four_splits_ento_data() {
        let xml = r#"<scenario>
            <entoData inputType="EIR"><EIRDaily>1</EIRDaily><EIRDaily>2</EIRDaily></entoData>
            <interventions><timed><intervention time="3"><changeEIR inputType="EIR" name="n"/></intervention></timed></interventions>
            <parameters eipDuration="12"/>
        </scenario>"#;
        let (doc, _) = run_ok(translate_3_to_4, 4, xml);
        let root = doc.root();
        let nv = doc.require_path(root, &["entoData", "nonVector"]).unwrap();
        assert_eq!(doc.attr(nv, "eipDuration"), Some("12"));
        let eirs = doc.children_named(nv, "EIRDaily");
        assert_eq!(eirs.len(), 2);
        assert_eq!(doc.text(eirs[0]), "1");
        let ento = doc.require_child(root, "entoData").unwrap();
        assert!(!doc.has_attr(ento, "inputType"));
        let ceir = doc.first_descendant(root, "changeEIR").unwrap();
        assert_eq!(doc.attrs(ceir), &[("eipDuration".to_string(), "12".to_string())]);
    }

    #[test]
    fn three_to_four_moves_anopheles() {
        let xml = r#"<scenario><entoData><anopheles mosquito="a" useNv0Guess="1"/><anopheles mosquito="b"/></entoData></scenario>"#;
        let (doc, _) = run_ok(translate_3_to_4, 4, xml);
        let v = doc.require_path(doc.root(), &["entoData", "vector"]).unwrap();
        let species = doc.children_named(v, "anopheles");
        assert_eq!(doc.attr(species[0], "mosquito"), Some("a"));
        assert!(!doc.has_attr(species[0], "useNv0Guess"));
        assert_eq!(doc.attr(species[1], "mosquito"), Some("b"));
    }

    #[test]
    fn four_to_five_flag_checks() {
        let (_, _, w) = run(translate_4_to_5, 5, r#"<scenario modelVersion="32"/>"#, &Policy::default());
        assert_eq!(w.len(), 1);
        let (_, r, _) = run(translate_4_to_5, 5, r#"<scenario modelVersion="40"/>"#, &Policy::default());
        assert!(matches!(r, Err(StepFailure::Precondition(_))));
        let (_, r, w) = run(translate_4_to_5, 5, r#"<scenario modelVersion="8"/>"#, &Policy::default());
        assert!(r.is_ok() && w.is_empty());
    }

    #[test]
    fn five_to_six_splits_nmf() {
        let xml = r#"<scenario modelVersion="0" wuID="4">
            <caseManagements><caseManagement minAgeYrs="0"><endPoints/><nmf value="1"/></caseManagement></caseManagements>
        </scenario>"#;
        let (doc, w) = run_ok(translate_5_to_6, 6, xml);
        let root = doc.root();
        assert!(!doc.has_attr(root, names::WU_ID));
        assert_eq!(w.len(), 1);
        let cm = doc.first_descendant(root, "caseManagement").unwrap();
        let kids: Vec<_> = doc.child_elements(cm).iter().map(|c| doc.name(*c).to_string()).collect();
        assert_eq!(kids, ["endPoints", "nmfP", "nmfNP"]);
        assert!(!doc.has_attr(cm, "minAgeYrs"));
    }

    #[test]
    fn seven_to_eight_drops_emergence_file() {
        let xml = r#"<scenario><entoData><vector><anopheles><mosq emergenceRateFilename="f"/></anopheles></vector></entoData></scenario>"#;
        let (doc, w) = run_ok(translate_7_to_8, 8, xml);
        let mosq = doc.first_descendant(doc.root(), "mosq").unwrap();
        assert!(!doc.has_attr(mosq, "emergenceRateFilename"));
        assert_eq!(w.len(), 1);
    }
}
