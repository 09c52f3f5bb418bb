//! # One-Day Timestep Pipeline
//!
//! Converts a 5-day-timestep fitting scenario at version 18 into a 1-day
//! scenario. Only the simple case-management descriptions used by fitting
//! runs are recognised: the immediate-outcomes health system is replaced
//! by an event-scheduler decision tree treating with a single idealised
//! "effective" drug.

use omst_core::{Document, DocumentError, NodeId, Position, SchemaVersion};

use crate::step::{StepFailure, StepLog};
use crate::steps::{append_option, append_with_attrs};

/// The only version this pipeline accepts as input.
pub const ONE_DAY_BASELINE: SchemaVersion = SchemaVersion(18);

/// Days per old timestep.
const OLD_STEP_DAYS: i64 = 5;

const HEALTH_SYSTEM_MEMORY_DAYS: &str = "28";

const ADDED_OPTIONS: [&str; 3] = ["MOLINEAUX_WITHIN_HOST_MODEL", "INCLUDES_PK_PD", "CLINICAL_EVENT_SCHEDULER"];

/// Map a 1-based 5-day timestep to the first day of that step.
pub fn rescale_time(t: i64) -> i64 {
    (t - 1) * OLD_STEP_DAYS + 1
}

struct Decision {
    name: &'static str,
    depends: &'static str,
    values: &'static str,
    tree: &'static str,
}

const fn decision(
    name: &'static str,
    depends: &'static str,
    values: &'static str,
    tree: &'static str,
) -> Decision {
    Decision {
        name,
        depends,
        values,
        tree,
    }
}

const TEST_NONE: Decision = decision("test", "", "none,microscopy,RDT", "none");

/// Decision lists for the uncomplicated and complicated branches.
struct CaseManagement {
    uncomplicated: &'static [Decision],
    complicated: &'static [Decision],
}

/// Changed health systems that monitor and treat every case.
const TREAT_ALL: CaseManagement = CaseManagement {
    uncomplicated: &[
        decision("treatment", "", "effective_treat,none", "effective_treat"),
        TEST_NONE,
    ],
    complicated: &[
        decision("treatment", "", "effective_treat,none", "effective_treat"),
        decision("hospitalisation", "", "none,delayed,immediate", "immediate"),
        TEST_NONE,
    ],
};

const NO_TREATMENT: CaseManagement = CaseManagement {
    uncomplicated: &[
        decision("treatment", "", "effective_treat,none", "none"),
        TEST_NONE,
    ],
    complicated: &[
        decision("treatment", "", "effective_treat,none", "none"),
        decision("hospitalisation", "", "none,delayed,immediate", "none"),
        TEST_NONE,
    ],
};

const OFFICIAL_CARE_TREATMENT: &str =
    "official_care(yes){p(.6): effective_treat p(.4): none} official_care(no): none";

const IRONMAL: CaseManagement = CaseManagement {
    uncomplicated: &[
        decision("official_care", "p", "yes,no", "p(.64): yes p(.36): no"),
        decision("treatment", "official_care,p", "effective_treat,none", OFFICIAL_CARE_TREATMENT),
        TEST_NONE,
    ],
    complicated: &[
        decision("official_care", "p", "yes,no", "p(.48): yes p(.52): no"),
        decision("treatment", "official_care,p", "effective_treat,none", OFFICIAL_CARE_TREATMENT),
        decision(
            "hospitalisation",
            "official_care",
            "none,delayed,immediate",
            "official_care(yes): immediate official_care(no): none",
        ),
        TEST_NONE,
    ],
};

const CLINICAL_OUTCOMES: [(&str, &str); 5] = [
    ("maxUCSeekingMemory", "3"),
    ("uncomplicatedCaseDuration", "3"),
    ("complicatedCaseDuration", "5"),
    ("complicatedRiskDuration", "5"),
    ("pImmediateUC", "1"),
];

fn health_system_template(name: &str) -> Option<&'static CaseManagement> {
    match name {
        "no Treatment" | "Mortality Fitting" | "no Treatment no Mortality" => Some(&NO_TREATMENT),
        "Ironmal" => Some(&IRONMAL),
        _ => None,
    }
}

fn changed_health_system_template(name: &str) -> Option<&'static CaseManagement> {
    match name {
        "Do Monitoring HS" | "Np Monitoring HS" => Some(&TREAT_ALL),
        _ => None,
    }
}

fn append_branch(doc: &mut Document, scheduler: NodeId, name: &str, decisions: &[Decision]) {
    let branch = doc.append_element(scheduler, name);
    let list = doc.append_element(branch, "decisions");
    for d in decisions {
        let elt = append_with_attrs(
            doc,
            list,
            "decision",
            &[("name", d.name), ("depends", d.depends), ("values", d.values)],
        );
        doc.set_text(elt, d.tree);
    }

    let treatments = doc.append_element(branch, "treatments");
    let effective = append_with_attrs(doc, treatments, "treatment", &[("name", "effective_treat")]);
    let schedule = doc.append_element(effective, "schedule");
    append_with_attrs(
        doc,
        schedule,
        "medicate",
        &[("drug", "effective"), ("mg", "1"), ("hour", "0")],
    );
    let none = append_with_attrs(doc, treatments, "treatment", &[("name", "none")]);
    doc.append_element(none, "schedule");
}

/// Replace the `ImmediateOutcomes` child of `hs` by an `EventScheduler`
/// built from the template its name selects.
fn replace_immediate_outcomes(
    doc: &mut Document,
    hs: NodeId,
    template: fn(&str) -> Option<&'static CaseManagement>,
) -> Result<(), StepFailure> {
    let outcomes = doc.require_child(hs, "ImmediateOutcomes")?;
    let name = doc.attr(outcomes, "name").unwrap_or_default().to_string();
    let cm = template(&name)
        .ok_or_else(|| StepFailure::unrecognized("health system for one-day timesteps", name))?;
    doc.detach(outcomes);

    let scheduler = doc.create_element("EventScheduler");
    append_branch(doc, scheduler, "uncomplicated", cm.uncomplicated);
    append_branch(doc, scheduler, "complicated", cm.complicated);
    let clinical = doc.append_element(scheduler, "ClinicalOutcomes");
    for (name, text) in CLINICAL_OUTCOMES {
        doc.append_text_element(clinical, name, text);
    }

    let position = match doc.child(hs, "CFR")? {
        Some(cfr) => Position::Before(cfr),
        None => Position::Last,
    };
    doc.move_node(scheduler, hs, position)?;
    Ok(())
}

fn append_effective_drug(doc: &mut Document, pharmacology: NodeId) {
    let drug = append_with_attrs(doc, pharmacology, "drug", &[("abbrev", "effective")]);
    let pd = doc.append_element(drug, "PD");
    let allele = append_with_attrs(doc, pd, "allele", &[("name", "sensitive")]);
    for (name, text) in [
        ("initial_frequency", "1"),
        ("max_killing_rate", "1e7"),
        ("IC50", "1"),
        ("slope", "1"),
    ] {
        doc.append_text_element(allele, name, text);
    }
    let pk = doc.append_element(drug, "PK");
    for (name, text) in [
        ("negligible_concentration", "1e-5"),
        ("half_life", "0.00069"),
        ("vol_dist", "0.01667"),
    ] {
        doc.append_text_element(pk, name, text);
    }
}

fn rescale_text(doc: &mut Document, id: NodeId) -> Result<(), DocumentError> {
    let t: i64 = doc.text_parse(id)?;
    doc.set_text(id, rescale_time(t).to_string());
    Ok(())
}

/// Apply the one-day conversion to a document at [`ONE_DAY_BASELINE`].
pub fn apply(doc: &mut Document, log: &mut StepLog) -> Result<(), StepFailure> {
    let root = doc.root();
    log.warn("one-day timestep conversion only supports simple fitting scenarios");

    let surveys = doc
        .first_descendant(root, "surveys")
        .ok_or_else(|| StepFailure::precondition("no surveys element"))?;
    for t in doc.descendants_named(surveys, "surveyTime") {
        rescale_text(doc, t)?;
    }

    let model = doc.require_child(root, "model")?;
    let options = doc.require_child(model, "ModelOptions")?;
    for name in ADDED_OPTIONS {
        append_option(doc, options, name, true);
    }

    let clinical = doc
        .first_descendant(root, "clinical")
        .ok_or_else(|| StepFailure::precondition("no clinical element"))?;
    doc.require_attr(clinical, "healthSystemMemory")?;
    doc.set_attr(clinical, "healthSystemMemory", HEALTH_SYSTEM_MEMORY_DAYS);

    for interv in doc.descendants_named(root, "intervention") {
        if let Some(t) = doc.attr_i64(interv, "time")? {
            doc.set_attr(interv, "time", rescale_time(t).to_string());
        }
    }

    for change in doc.descendants_named(root, "changeHS") {
        replace_immediate_outcomes(doc, change, changed_health_system_template)?;
    }
    let hs = doc
        .first_descendant(root, "healthSystem")
        .ok_or_else(|| StepFailure::precondition("no healthSystem element"))?;
    replace_immediate_outcomes(doc, hs, health_system_template)?;

    let pharmacology = doc.create_element("drugDescription");
    append_effective_drug(doc, pharmacology);
    doc.insert_before(root, pharmacology, model)?;

    let interventions = doc.require_child(root, "interventions")?;
    if doc.attr(interventions, "name") == Some("A2 Intervention") {
        let mda = doc.create_element("MDADescription");
        let schedule = doc.append_element(mda, "schedule");
        append_with_attrs(
            doc,
            schedule,
            "medicate",
            &[("drug", "effective"), ("hour", "0"), ("mg", "1")],
        );
        doc.move_node(mda, interventions, Position::First)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Transition;
    use omst_core::parse_document;

    const V18: &str = r#"<scenario schemaVersion="18">
        <monitoring><surveys><surveyTime>1</surveyTime><surveyTime>73</surveyTime></surveys></monitoring>
        <interventions name="A2 Intervention"><timed>
            <intervention time="2"><changeHS><ImmediateOutcomes name="Do Monitoring HS"/><CFR/></changeHS></intervention>
            <intervention time="10"/>
        </timed></interventions>
        <healthSystem><ImmediateOutcomes name="Ironmal"/><CFR/></healthSystem>
        <model><ModelOptions/><clinical healthSystemMemory="6"/></model>
    </scenario>"#;

    fn apply_to(xml: &str) -> (Document, Result<(), StepFailure>) {
        let mut doc = parse_document(xml).unwrap();
        let mut log = StepLog::new(Transition::into_version(ONE_DAY_BASELINE));
        let r = apply(&mut doc, &mut log);
        (doc, r)
    }

    #[test]
    fn rescale_maps_step_to_first_day() {
        assert_eq!(rescale_time(1), 1);
        assert_eq!(rescale_time(2), 6);
        assert_eq!(rescale_time(73), 361);
    }

    #[test]
    fn converts_fitting_scenario() {
        let (doc, r) = apply_to(V18);
        r.unwrap();
        let root = doc.root();

        let times: Vec<String> = doc
            .descendants_named(root, "surveyTime")
            .iter()
            .map(|t| doc.text(*t))
            .collect();
        assert_eq!(times, ["1", "361"]);

        let interventions: Vec<_> = doc
            .descendants_named(root, "intervention")
            .iter()
            .map(|i| doc.attr(*i, "time").unwrap().to_string())
            .collect();
        assert_eq!(interventions, ["6", "46"]);

        let clinical = doc.first_descendant(root, "clinical").unwrap();
        assert_eq!(doc.attr(clinical, "healthSystemMemory"), Some("28"));
        let options = doc.first_descendant(root, "ModelOptions").unwrap();
        assert_eq!(doc.children_named(options, "option").len(), 3);

        let hs = doc.require_child(root, "healthSystem").unwrap();
        let names: Vec<_> = doc.child_elements(hs).iter().map(|c| doc.name(*c).to_string()).collect();
        assert_eq!(names, ["EventScheduler", "CFR"]);
        let first = doc.first_descendant(hs, "decision").unwrap();
        assert_eq!(doc.attr(first, "name"), Some("official_care"));

        let change = doc.first_descendant(root, "changeHS").unwrap();
        assert!(doc.require_child(change, "EventScheduler").is_ok());
        assert!(doc.child(change, "ImmediateOutcomes").unwrap().is_none());

        let drug = doc.require_path(root, &["drugDescription", "drug"]).unwrap();
        assert_eq!(doc.attr(drug, "abbrev"), Some("effective"));
        let i = doc.require_child(root, "interventions").unwrap();
        assert_eq!(doc.name(doc.child_elements(i)[0]), "MDADescription");
    }

    #[test]
    fn unknown_health_system_is_fatal() {
        let xml = V18.replace("Ironmal", "Something Else");
        let (_, r) = apply_to(&xml);
        assert!(matches!(r, Err(StepFailure::UnrecognizedVariant { .. })));
    }
}
