//! Steps 20→21 through 30→31.
//!
//! The interventions element is reorganised twice in this range: first all
//! descriptions move into one `descriptions` block (21), then everything is
//! regrouped per intervention type (28) and each type's deployments are
//! collected into lists (30).

use omst_core::{names, Document, DocumentError, NodeId, NodeKind, Position};

use super::{append_option, append_with_attrs, create_with_attrs, find_option, fmt_f64, uses_option};
use crate::policy::{ItnDescription, Policy, PolicyField, ReportOnlyAtRisk};
use crate::step::{StepFailure, StepLog, StepResult};

// ── 20 → 21 ──────────────────────────────────────────────────────────

/// Every intervention description moves into a leading `descriptions`
/// element; only the `continuous` and `timed` lists stay in place.
pub fn translate_20_to_21(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let interventions = doc.require_child(root, "interventions")?;
    let existing = doc.children(interventions);
    let descriptions = doc.create_element("descriptions");
    doc.move_node(descriptions, interventions, Position::First)?;
    for elt in existing {
        if doc.kind(elt) == NodeKind::Element && !matches!(doc.name(elt), "continuous" | "timed") {
            doc.append_child(descriptions, elt)?;
        }
    }
    Ok(())
}

// ── 22 → 23 ──────────────────────────────────────────────────────────

/// `REPORT_ONLY_AT_RISK` changes the output of IPTi SP scenarios; the
/// operator decides whether to turn it on.
pub fn translate_22_to_23(doc: &mut Document, policy: &Policy, _log: &mut StepLog) -> StepResult {
    if !uses_option(doc, "IPTI_SP_MODEL")? {
        return Ok(());
    }
    match policy.ipti_report_only_at_risk {
        ReportOnlyAtRisk::Off => Ok(()),
        ReportOnlyAtRisk::On => {
            let root = doc.root();
            let options = doc.require_path(root, &["model", "ModelOptions"])?;
            append_option(doc, options, "REPORT_ONLY_AT_RISK", true);
            Ok(())
        }
        ReportOnlyAtRisk::Unspecified => Err(StepFailure::policy(
            PolicyField::IPTI_REPORT_ONLY_AT_RISK,
            "scenario uses IPTI_SP_MODEL, whose reporting changed with REPORT_ONLY_AT_RISK",
        )),
    }
}

// ── 23 → 24 ──────────────────────────────────────────────────────────

/// Age-group lower bounds of the human availability and weight tables, from
/// a Tanzanian survey.
const HUMAN_GROUP_LOWER_BOUNDS: [f64; 18] = [
    0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 20.0, 20.0,
];

const HUMAN_AVAILABILITY: [f64; 18] = [
    0.225940909648,
    0.286173633441,
    0.336898395722,
    0.370989854675,
    0.403114915112,
    0.442585112522,
    0.473839351511,
    0.512630464378,
    0.54487872702,
    0.581527755812,
    0.630257580698,
    0.663063362714,
    0.702417432755,
    0.734605377277,
    0.788908765653,
    0.839587932303,
    1.0,
    1.0,
];

const HUMAN_WEIGHT: [f64; 18] = [
    13.9856718,
    18.30372108,
    21.745749,
    24.25753512,
    26.06595444,
    28.48868784,
    30.84202788,
    33.48638244,
    35.20335432,
    37.19394024,
    40.1368962,
    42.00539916,
    44.53731348,
    46.77769728,
    49.48396092,
    54.36,
    60.0,
    60.0,
];

const HUMAN_WEIGHT_MULT_STD_DEV: &str = "0.14";

fn append_age_groups(doc: &mut Document, parent: NodeId, values: &[f64]) {
    for (lower, value) in HUMAN_GROUP_LOWER_BOUNDS.iter().zip(values) {
        append_with_attrs(
            doc,
            parent,
            "group",
            &[
                ("lowerbound", fmt_f64(*lower).as_str()),
                ("value", fmt_f64(*value).as_str()),
            ],
        );
    }
}

/// `assimMode` is removed (only 0 was ever supported) and the human
/// availability/weight tables move from code into the scenario.
pub fn translate_23_to_24(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    match doc.remove_attr(root, names::ASSIM_MODE) {
        Some(mode) if mode.trim() == "0" => {}
        Some(mode) => {
            return Err(StepFailure::precondition(format!(
                "assimMode=\"{mode}\" is no longer supported"
            )));
        }
        None => {
            return Err(StepFailure::precondition(
                "assimMode is missing; only assimMode=\"0\" can be translated",
            ));
        }
    }

    let ento = doc.require_child(root, "entoData")?;
    if !doc.children_named(ento, "vector").is_empty() {
        log.warn(
            "units of EIR for the vector model changed from inoculations per averaged person \
             to inoculations per average adult",
        );
    }

    let model = doc.require_child(root, "model")?;
    let params = doc.require_child(model, "parameters")?;
    let human = doc.create_element("human");
    doc.insert_before(model, human, params)?;
    let availability = doc.append_element(human, "availabilityToMosquitoes");
    append_age_groups(doc, availability, &HUMAN_AVAILABILITY);

    let interval: i64 = doc.require_attr_parse(params, "interval")?;
    if interval == 1 {
        // Only used by the PK/PD model.
        let weight = doc.append_element(human, "weight");
        append_age_groups(doc, weight, &HUMAN_WEIGHT);
        doc.set_attr(weight, "multStdDev", HUMAN_WEIGHT_MULT_STD_DEV);
    }
    Ok(())
}

// ── 24 → 25 ──────────────────────────────────────────────────────────

const WEIBULL_DECAYED_ELEMENTS: [&str; 4] = [
    "preprandialKillingEffect",
    "postprandialKillingEffect",
    "killingEffect",
    "deterrency",
];

/// Vaccine types become names, half-lives and Weibull parameters become
/// decay functions, and MDA descriptions become a decision tree.
pub fn translate_24_to_25(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    for vd in doc.descendants_named(root, "vaccineDescription") {
        let kind: i64 = doc.require_attr_parse(vd, "vaccineType")?;
        let name = match kind {
            1 => "PEV",
            2 => "BSV",
            3 => "TBV",
            other => return Err(StepFailure::unrecognized("vaccine type", other.to_string())),
        };
        doc.set_attr(vd, "vaccineType", name);

        let half_life = doc.require_child(vd, "halfLifeYrs")?;
        let hl: f64 = doc.require_attr_parse(half_life, "value")?;
        let function = if hl == 0.0 { "constant" } else { "exponential" };
        let decay = create_with_attrs(
            doc,
            "decay",
            &[("L", fmt_f64(hl).as_str()), ("function", function)],
        );
        doc.replace_child(half_life, decay)?;
    }

    for name in WEIBULL_DECAYED_ELEMENTS {
        for node in doc.descendants_named(root, name) {
            weibull_to_decay_function(doc, node)?;
        }
    }

    if let Some(mda) = doc.first_descendant(root, "MDADescription") {
        let schedule = doc.require_child(mda, "schedule")?;
        let decisions = doc.append_element(mda, "decisions");
        let test = append_with_attrs(
            doc,
            decisions,
            "decision",
            &[("name", "test"), ("depends", ""), ("values", "none,microscopy,RDT")],
        );
        doc.set_text(test, "none");
        let treatment = append_with_attrs(
            doc,
            decisions,
            "decision",
            &[("name", "treatment"), ("depends", ""), ("values", "1")],
        );
        doc.set_text(treatment, "1");

        let treatments = doc.append_element(mda, "treatments");
        let first = append_with_attrs(doc, treatments, "treatment", &[("name", "1")]);
        doc.append_child(first, schedule)?;
    }
    Ok(())
}

fn weibull_to_decay_function(doc: &mut Document, node: NodeId) -> Result<(), DocumentError> {
    // The half-life is the same parameter for both distributions.
    let half_life = doc.require_attr(node, "halflife")?.to_string();
    doc.remove_attr(node, "halflife");
    doc.set_attr(node, "L", half_life);
    match doc.remove_attr(node, "Weibullk") {
        Some(k) => {
            doc.set_attr(node, "function", "weibull");
            doc.set_attr(node, "k", k);
        }
        None => doc.set_attr(node, "function", "exponential"),
    }
    Ok(())
}

// ── 25 → 26 ──────────────────────────────────────────────────────────

/// Convert a per-case probability of immediate treatment-seeking into daily
/// probabilities over three days: `p`, `(1-p)p`, `(1-p)²p`, normalised.
///
/// Returns `None` for probabilities outside `(0, 1]`.
pub fn daily_immediate_uc(p: f64) -> Option<Vec<f64>> {
    if p == 1.0 {
        return Some(vec![1.0]);
    }
    if !(p > 0.0 && p < 1.0) {
        return None;
    }
    let inv = 1.0 - p;
    let terms = [p, inv * p, inv * inv * p];
    let total: f64 = terms.iter().sum();
    Some(terms.iter().map(|t| t / total).collect())
}

/// `pImmediateUC` is replaced by daily probabilities, and vector
/// interventions share one decay function per intervention type.
pub fn translate_25_to_26(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    for outcomes in doc.descendants_named(root, "ClinicalOutcomes") {
        let imm = doc.require_child(outcomes, "pImmediateUC")?;
        let p: f64 = doc.text_parse(imm)?;
        doc.detach(imm);
        let daily = daily_immediate_uc(p).ok_or_else(|| {
            StepFailure::precondition(format!("pImmediateUC = {p} is outside (0, 1]"))
        })?;
        if daily.len() == 1 {
            doc.append_text_element(outcomes, "dailyPrImmUCTS", "1");
            continue;
        }
        log.warn("pImmediateUC element replaced with dailyPrImmUCTS: not an exact equivalent");
        for v in daily {
            doc.append_text_element(outcomes, "dailyPrImmUCTS", &fmt_f64(v));
        }
    }

    let descriptions = doc.require_path(root, &["interventions", "descriptions"])?;
    let species = doc.children_named(descriptions, "anopheles");
    for (description, decay) in [
        ("ITNDescription", "ITNDecay"),
        ("IRSDescription", "IRSDecay"),
        ("VADescription", "VADecay"),
    ] {
        consolidate_vector_decay(doc, descriptions, &species, description, decay)?;
    }
    Ok(())
}

/// A decay function shared by all effects of one vector intervention.
struct SharedDecay {
    function: String,
    l: String,
    k: String,
}

fn consolidate_vector_decay(
    doc: &mut Document,
    descriptions: NodeId,
    species: &[NodeId],
    description: &str,
    decay_name: &str,
) -> StepResult {
    let mut shared: Option<SharedDecay> = None;
    for &anoph in species {
        let Some(interv) = doc.child(anoph, description)? else {
            continue;
        };
        for effect in doc.child_elements(interv) {
            let function = doc.require_attr(effect, "function")?.to_string();
            let l = doc.require_attr(effect, "L")?.to_string();
            let k = doc.attr(effect, "k").unwrap_or("1").to_string();
            match &shared {
                None => {
                    shared = Some(SharedDecay { function, l, k });
                }
                Some(s) => {
                    let differs = |what: &str, a: &str, b: &str| {
                        StepFailure::precondition(format!(
                            "{description}: differing decay functions are no longer supported \
                             ({what}: {a} and {b})"
                        ))
                    };
                    if s.function != function {
                        return Err(differs("function", &s.function, &function));
                    }
                    if parse_f64(doc, effect, "L", &s.l)? != parse_f64(doc, effect, "L", &l)? {
                        return Err(differs("L", &s.l, &l));
                    }
                    if parse_f64(doc, effect, "k", &s.k)? != parse_f64(doc, effect, "k", &k)? {
                        return Err(differs("k", &s.k, &k));
                    }
                }
            }
            doc.remove_attr(effect, "function");
            doc.remove_attr(effect, "L");
            doc.remove_attr(effect, "k");
            let initial = doc.require_attr(effect, "initial")?.to_string();
            doc.remove_attr(effect, "initial");
            doc.set_attr(effect, "value", initial);
        }
    }

    if let (Some(s), Some(&first)) = (shared, species.first()) {
        let decay = create_with_attrs(doc, decay_name, &[("function", s.function.as_str()), ("L", s.l.as_str())]);
        if parse_f64(doc, decay, "k", &s.k)? != 1.0 {
            doc.set_attr(decay, "k", s.k);
        }
        doc.insert_before(descriptions, decay, first)?;
    }
    Ok(())
}

fn parse_f64(doc: &Document, id: NodeId, field: &str, raw: &str) -> Result<f64, DocumentError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| doc.invalid(id, field, raw, e.to_string()))
}

// ── 27 → 28 ──────────────────────────────────────────────────────────

/// Old description element → (intervention group, new element name).
const DESCRIPTION_GROUPS: [(&str, &str, &str); 6] = [
    ("iptiDescription", "IPT", "description"),
    ("vaccineDescription", "vaccine", "description"),
    ("MDADescription", "MDA", "description"),
    ("ITNDecay", "ITN", "decay"),
    ("IRSDecay", "IRS", "decay"),
    ("VADecay", "vectorDeterrent", "decay"),
];

/// Per-species description element → intervention group.
const SPECIES_DESCRIPTION_GROUPS: [(&str, &str); 3] = [
    ("ITNDescription", "ITN"),
    ("IRSDescription", "IRS"),
    ("VADescription", "vectorDeterrent"),
];

/// Continuous deployment element → intervention group.
const CONTINUOUS_GROUPS: [(&str, &str); 4] = [
    ("ipti", "IPT"),
    ("vaccine", "vaccine"),
    ("cohort", "cohort"),
    ("ITN", "ITN"),
];

/// Timed deployment element → intervention group.
const TIMED_GROUPS: [(&str, &str); 12] = [
    ("changeHS", "changeHS"),
    ("changeEIR", "changeEIR"),
    ("MDA", "MDA"),
    ("vaccinate", "vaccine"),
    ("ITN", "ITN"),
    ("IRS", "IRS"),
    ("VectorAvailability", "vectorDeterrent"),
    ("ipti", "IPT"),
    ("cohort", "cohort"),
    ("uninfectVectors", "uninfectVectors"),
    ("immuneSuppression", "immuneSuppression"),
    ("insertR_0Case", "insertR_0Case"),
];

fn group_for<'a>(table: &'a [(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    table.iter().find(|(from, _)| *from == name).map(|(_, g)| *g)
}

/// Move `elt` into the intervention group `group` (created on demand) and
/// rename it.
fn regroup(
    doc: &mut Document,
    interventions: NodeId,
    elt: NodeId,
    group: &str,
    new_name: &str,
) -> Result<NodeId, DocumentError> {
    let g = doc.get_or_create_child(interventions, group, Position::Last)?;
    doc.append_child(g, elt)?;
    doc.rename(elt, new_name);
    Ok(g)
}

fn steps_per_year(doc: &Document) -> Result<f64, StepFailure> {
    let params = doc.require_path(doc.root(), &["model", "parameters"])?;
    let interval: i64 = doc.require_attr_parse(params, "interval")?;
    if interval <= 0 {
        return Err(doc.invalid(params, "interval", &interval.to_string(), "must be positive").into());
    }
    Ok(365.0 / interval as f64)
}

/// Entomology renames and regrouping of interventions by type.
pub fn translate_27_to_28(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();

    let ento = doc.require_child(root, "entoData")?;
    doc.rename(ento, "entomology");
    if let Some(vector) = doc.child(ento, "vector")? {
        for anoph in doc.children_named(vector, "anopheles") {
            for eir in doc.children_named(anoph, "eir") {
                doc.rename(eir, "EIR");
            }
            for monthly in doc.children_named(anoph, "monthlyEir") {
                doc.rename(monthly, "monthlyEIR");
            }
        }
    }
    for drugs in doc.children_named(root, "drugDescription") {
        doc.rename(drugs, "pharmacology");
    }

    let interventions = doc.require_child(root, "interventions")?;
    let descriptions = doc.require_child(interventions, "descriptions")?;
    for old in doc.child_elements(descriptions) {
        let name = doc.name(old).to_string();
        if name == "anopheles" {
            regroup_species_descriptions(doc, interventions, old)?;
            continue;
        }
        let (_, group, new_name) = DESCRIPTION_GROUPS
            .iter()
            .find(|(from, _, _)| *from == name)
            .ok_or_else(|| StepFailure::unrecognized("element interventions/descriptions", name.clone()))?;
        regroup(doc, interventions, old, group, new_name)?;
    }
    doc.detach(descriptions);

    if let Some(continuous) = doc.child(interventions, "continuous")? {
        for old in doc.child_elements(continuous) {
            let name = doc.name(old).to_string();
            let group = group_for(&CONTINUOUS_GROUPS, &name)
                .ok_or_else(|| StepFailure::unrecognized("element interventions/continuous", name.clone()))?;
            regroup(doc, interventions, old, group, "continuous")?;
        }
        doc.detach(continuous);
    }

    if let Some(timed) = doc.child(interventions, "timed")? {
        let mut imported_warning_given = false;
        for time_elt in doc.children_named(timed, "intervention") {
            let time = doc.require_attr(time_elt, "time")?.to_string();
            for old in doc.child_elements(time_elt) {
                let name = doc.name(old).to_string();
                match name.as_str() {
                    "larviciding" => {
                        return Err(StepFailure::precondition(
                            "the larviciding intervention model has changed significantly; \
                             please remove it and add it again",
                        ));
                    }
                    "importedInfectionsPerThousandHosts" => {
                        if !imported_warning_given {
                            log.warn(
                                "doing an exact conversion from the old imported infections \
                                 representation; this is probably not what you want unless \
                                 results must be replicated",
                            );
                            imported_warning_given = true;
                        }
                        convert_imported_infections(doc, interventions, old, &time)?;
                    }
                    _ => {
                        let group = group_for(&TIMED_GROUPS, &name).ok_or_else(|| {
                            StepFailure::unrecognized("element interventions/timed/intervention", name.clone())
                        })?;
                        regroup(doc, interventions, old, group, "timed")?;
                        doc.set_attr(old, "time", time.as_str());
                    }
                }
            }
        }
        doc.detach(timed);
    }
    Ok(())
}

fn regroup_species_descriptions(doc: &mut Document, interventions: NodeId, anoph: NodeId) -> StepResult {
    let mosquito = doc.attr(anoph, "mosquito").unwrap_or_default().to_string();
    for old in doc.child_elements(anoph) {
        let name = doc.name(old).to_string();
        let group = group_for(&SPECIES_DESCRIPTION_GROUPS, &name).ok_or_else(|| {
            StepFailure::unrecognized("element interventions/descriptions/anopheles", name.clone())
        })?;
        let g = regroup(doc, interventions, old, group, "anophelesParams")?;
        doc.set_attr(old, "mosquito", mosquito.as_str());
        let old_name = doc.remove_attr(old, "name");
        if !doc.has_attr(g, "name") {
            doc.set_attr(g, "name", old_name.unwrap_or_default());
        }
    }
    Ok(())
}

/// Imported infections per thousand hosts per timestep become a yearly
/// rate that drops back to zero on the following timestep.
fn convert_imported_infections(
    doc: &mut Document,
    interventions: NodeId,
    old: NodeId,
    time: &str,
) -> StepResult {
    let per_step: f64 = doc.text_parse(old)?;
    let t: i64 = time
        .trim()
        .parse()
        .map_err(|_| doc.invalid(old, "time", time, "not an integer"))?;
    let rate = per_step * steps_per_year(doc)?;
    doc.detach(old);

    let group = doc.get_or_create_child(interventions, "importedInfections", Position::Last)?;
    let timed = doc.get_or_create_child(group, "timed", Position::Last)?;
    let previous = doc.children_named(timed, "rate").last().copied();
    let now = match previous {
        // A zero added for the previous timestep at this same time point.
        Some(p) if doc.attr_i64(p, "time")? == Some(t) => p,
        _ => append_with_attrs(doc, timed, "rate", &[("time", time)]),
    };
    doc.set_attr(now, "value", fmt_f64(rate));
    append_with_attrs(
        doc,
        timed,
        "rate",
        &[("time", (t + 1).to_string().as_str()), ("value", "0")],
    );
    Ok(())
}

// ── 28 → 29 ──────────────────────────────────────────────────────────

/// Default parameterisation of the net-based ITN model.
const ITN_DESCRIPTION_ELEMENTS: [(&str, &[(&str, &str)]); 7] = [
    ("usage", &[("value", "0.8")]),
    ("holeRate", &[("mean", "0.9"), ("sigma", "0.8")]),
    ("ripRate", &[("mean", "0.7"), ("sigma", "0.8")]),
    ("ripFactor", &[("value", "0.4")]),
    ("initialInsecticide", &[("mu", "70"), ("sigma", "20")]),
    (
        "insecticideDecay",
        &[("L", "2.2"), ("function", "exponential"), ("mu", "-0.32"), ("sigma", "0.8")],
    ),
    ("attritionOfNets", &[("L", "12"), ("k", "2"), ("function", "smooth-compact")]),
];

/// Per-species ITN effect parameters: (mosquito, deterrency insecticide
/// factor, pre-prandial insecticide scaling factor).
const ITN_SPECIES: [(&str, &str, &str); 3] = [
    ("gambiae_ss", "0.67", "1"),
    ("funestus", "0.67", "1"),
    ("arabiensis", "0.1", "0.1"),
];

fn append_itn_species(doc: &mut Document, desc: NodeId, species: (&str, &str, &str)) {
    let (mosquito, deterrency_insecticide, preprandial_scaling) = species;
    let params = append_with_attrs(doc, desc, "anophelesParams", &[("mosquito", mosquito)]);
    append_with_attrs(
        doc,
        params,
        "deterrency",
        &[
            ("holeFactor", "0.5"),
            ("insecticideFactor", deterrency_insecticide),
            ("interactionFactor", "1.492537"),
            ("holeScalingFactor", "0.1"),
            ("insecticideScalingFactor", "0.1"),
        ],
    );
    append_with_attrs(
        doc,
        params,
        "preprandialKillingEffect",
        &[
            ("baseFactor", "0.09"),
            ("holeFactor", "0.57"),
            ("insecticideFactor", "0.604"),
            ("interactionFactor", "-0.424"),
            ("holeScalingFactor", "0.1"),
            ("insecticideScalingFactor", preprandial_scaling),
        ],
    );
    append_with_attrs(
        doc,
        params,
        "postprandialKillingEffect",
        &[
            ("baseFactor", "0.10"),
            ("holeFactor", "0"),
            ("insecticideFactor", "0.55"),
            ("interactionFactor", "0"),
            ("holeScalingFactor", "0.1"),
            ("insecticideScalingFactor", "0.1"),
        ],
    );
}

/// The ITN model changed. The old description is either replaced by the
/// default parameterisation of the new one, or left for hand editing.
pub fn translate_28_to_29(doc: &mut Document, policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let interventions = doc.require_child(root, "interventions")?;
    let Some(itn) = doc.child(interventions, "ITN")? else {
        return Ok(());
    };
    match policy.itn_description {
        ItnDescription::Unspecified => Err(StepFailure::policy(
            PolicyField::ITN_DESCRIPTION,
            "the ITN description changed",
        )),
        ItnDescription::Manual => {
            log.warn("leaving ITN description unchanged as requested");
            Ok(())
        }
        ItnDescription::Replace => {
            let decay = doc.require_child(itn, "decay")?;
            doc.detach(decay);
            for params in doc.children_named(itn, "anophelesParams") {
                doc.detach(params);
            }
            let desc = doc.create_element("description");
            doc.move_node(desc, itn, Position::First)?;
            for (name, attrs) in ITN_DESCRIPTION_ELEMENTS {
                append_with_attrs(doc, desc, name, attrs);
            }
            for species in ITN_SPECIES {
                append_itn_species(doc, desc, species);
            }
            Ok(())
        }
    }
}

// ── 29 → 30 ──────────────────────────────────────────────────────────

/// Integrate a two-harmonic Fourier EIR series over one year of daily
/// values: Σ_{t=0}^{364} exp(a0 + a1·cos(wt−r) + b1·sin(wt−r) + a2·cos(2(wt−r)) + b2·sin(2(wt−r))),
/// with w = 2π/365.
pub fn fourier_annual_eir(a0: f64, a1: f64, b1: f64, a2: f64, b2: f64, rotate: f64) -> f64 {
    let w = 2.0 * std::f64::consts::PI / 365.0;
    (0..365)
        .map(|t| {
            let wt = w * t as f64 - rotate;
            (a0 + a1 * wt.cos() + b1 * wt.sin() + a2 * (2.0 * wt).cos() + b2 * (2.0 * wt).sin()).exp()
        })
        .sum()
}

/// Mosquito attributes converted to elements, in document order.
const MOSQ_VALUE_ELEMENTS_BEFORE: [&str; 5] = [
    "mosqRestDuration",
    "extrinsicIncubationPeriod",
    "mosqLaidEggsSameDayProportion",
    "mosqSeekingDuration",
    "mosqSurvivalFeedingCycleProbability",
];
const MOSQ_BETA_MEAN_ELEMENTS: [&str; 3] = ["mosqProbBiting", "mosqProbFindRestSite", "mosqProbResting"];
const MOSQ_VALUE_ELEMENTS_AFTER: [&str; 2] = ["mosqProbOvipositing", "mosqHumanBloodIndex"];
const NON_HUMAN_HOST_VALUE_ELEMENTS: [&str; 4] = [
    "mosqRelativeEntoAvailability",
    "mosqProbBiting",
    "mosqProbFindRestSite",
    "mosqProbResting",
];

fn attr_to_element(doc: &mut Document, parent: NodeId, name: &str) -> Result<(), DocumentError> {
    let value = doc.require_attr(parent, name)?.to_string();
    doc.remove_attr(parent, name);
    append_with_attrs(doc, parent, name, &[("value", value.as_str())]);
    Ok(())
}

fn attr_to_beta_mean_element(doc: &mut Document, parent: NodeId, name: &str) -> Result<(), DocumentError> {
    let mean = doc.require_attr(parent, name)?.to_string();
    doc.remove_attr(parent, name);
    append_with_attrs(doc, parent, name, &[("mean", mean.as_str()), ("variance", "0")]);
    Ok(())
}

/// Groups whose timed deployments keep their own element, renamed.
const TIMED_DEPLOYMENT_RENAMES: [&str; 4] = ["changeHS", "changeEIR", "insertR_0Case", "uninfectVectors"];

/// Groups whose deployments are collected into `continuous`/`timed` lists
/// of `deploy` elements.
const DEPLOYMENT_LISTS: [(&str, &[&str]); 8] = [
    ("MDA", &["timed"]),
    ("vaccine", &["continuous", "timed"]),
    ("IPT", &["continuous", "timed"]),
    ("ITN", &["continuous", "timed"]),
    ("IRS", &["timed"]),
    ("vectorDeterrent", &["timed"]),
    ("cohort", &["continuous", "timed"]),
    ("immuneSuppression", &["timed"]),
];

/// Survey measure renames, keyword EIR modes, mosquito attributes as
/// elements, seasonality input and deployment lists.
pub fn translate_29_to_30(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let survey_options = doc.require_path(root, &["monitoring", "SurveyOptions"])?;
    for opt in doc.children_named(survey_options, "option") {
        let renamed = match doc.attr(opt, "name") {
            Some("Vector_EIR_Input") => "inputEIR",
            Some("Vector_EIR_Simulated") => "simulatedEIR",
            _ => continue,
        };
        doc.set_attr(opt, "name", renamed);
    }

    let ento = doc.require_child(root, "entomology")?;
    let mode: i64 = doc.require_attr_parse(ento, "mode")?;
    let keyword = match mode {
        2 => "forced",
        4 => "dynamic",
        other => return Err(StepFailure::unrecognized("entomology mode", other.to_string())),
    };
    doc.set_attr(ento, "mode", keyword);
    doc.rename_attr(ento, "annualEIR", "scaledAnnualEIR");

    if let Some(vector) = doc.child(ento, "vector")? {
        for anoph in doc.children_named(vector, "anopheles") {
            translate_species_29_to_30(doc, anoph)?;
        }
    }

    let interventions = doc.require_child(root, "interventions")?;
    for group in TIMED_DEPLOYMENT_RENAMES {
        if let Some(g) = doc.child(interventions, group)? {
            for t in doc.children_named(g, "timed") {
                doc.rename(t, "timedDeployment");
            }
        }
    }

    if let Some(irs) = doc.child(interventions, "IRS")? {
        add_irs_description(doc, irs)?;
    }

    for (group, lists) in DEPLOYMENT_LISTS {
        let Some(g) = doc.child(interventions, group)? else {
            continue;
        };
        for list_name in lists {
            let deployments = doc.children_named(g, list_name);
            if deployments.is_empty() {
                continue;
            }
            let list = doc.create_element(list_name);
            for d in deployments {
                doc.append_child(list, d)?;
                doc.rename(d, "deploy");
            }
            doc.append_child(g, list)?;
        }
    }
    Ok(())
}

fn translate_species_29_to_30(doc: &mut Document, anoph: NodeId) -> StepResult {
    let mosq = doc.require_child(anoph, "mosq")?;
    for name in MOSQ_VALUE_ELEMENTS_BEFORE {
        attr_to_element(doc, mosq, name)?;
    }
    append_with_attrs(doc, mosq, "availabilityVariance", &[("value", "0")]);
    for name in MOSQ_BETA_MEAN_ELEMENTS {
        attr_to_beta_mean_element(doc, mosq, name)?;
    }
    for name in MOSQ_VALUE_ELEMENTS_AFTER {
        attr_to_element(doc, mosq, name)?;
    }

    for nhh in doc.children_named(anoph, "nonHumanHosts") {
        for name in NON_HUMAN_HOST_VALUE_ELEMENTS {
            attr_to_element(doc, nhh, name)?;
        }
    }

    let seasonality = create_with_attrs(doc, "seasonality", &[("input", "EIR")]);
    doc.move_node(seasonality, anoph, Position::First)?;

    if let Some(eir) = doc.child(anoph, "EIR")? {
        let coefficient = |doc: &Document, name: &str| -> Result<f64, DocumentError> {
            doc.require_attr_parse(eir, name)
        };
        let a0 = coefficient(doc, "a0")?;
        let a1 = coefficient(doc, "a1")?;
        let b1 = coefficient(doc, "b1")?;
        let a2 = coefficient(doc, "a2")?;
        let b2 = coefficient(doc, "b2")?;
        let rotate_raw = doc.require_attr(eir, "EIRRotateAngle")?.to_string();
        let rotate = coefficient(doc, "EIRRotateAngle")?;

        let series = doc.append_element(seasonality, "fourierSeries");
        for (a, b) in [("a1", "b1"), ("a2", "b2")] {
            let a_raw = doc.require_attr(eir, a)?.to_string();
            let b_raw = doc.require_attr(eir, b)?.to_string();
            append_with_attrs(doc, series, "coeffic", &[("a", a_raw.as_str()), ("b", b_raw.as_str())]);
        }
        doc.set_attr(series, "EIRRotateAngle", rotate_raw);

        let annual = fourier_annual_eir(a0, a1, b1, a2, b2, rotate);
        doc.set_attr(seasonality, "annualEIR", fmt_f64(annual));
        doc.detach(eir);
    }

    if let Some(monthly) = doc.child(anoph, "monthlyEIR")? {
        let annual = doc.require_attr(monthly, "annualEIR")?.to_string();
        let values = doc.append_element(seasonality, "monthlyValues");
        doc.set_attr(seasonality, "annualEIR", annual);
        doc.set_attr(values, "smoothing", "fourier");
        for item in doc.children_named(monthly, "item") {
            let text = doc.text(item);
            doc.append_text_element(values, "value", &text);
        }
        doc.detach(monthly);
    }
    Ok(())
}

/// The IRS model gained a choice of parameterisation; old parameters move
/// into a `description` with a zero pre-prandial killing effect.
fn add_irs_description(doc: &mut Document, irs: NodeId) -> StepResult {
    let desc = doc.create_element("description");
    let decay = doc.require_child(irs, "decay")?;
    doc.append_child(desc, decay)?;
    for params in doc.children_named(irs, "anophelesParams") {
        let killing = doc.require_child(params, "killingEffect")?;
        let pre = create_with_attrs(doc, "preprandialKillingEffect", &[("value", "0")]);
        doc.insert_before(params, pre, killing)?;
        doc.rename(killing, "postprandialKillingEffect");
        doc.append_child(desc, params)?;
    }
    doc.append_child(irs, desc)?;
    Ok(())
}

// ── 30 → 31 ──────────────────────────────────────────────────────────

/// `INNATE_MAX_DENS` now defaults to on; older scenarios that never set it
/// keep the old behaviour explicitly. Larviciding becomes a generic
/// vector-population intervention with a step decay.
pub fn translate_30_to_31(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let options = doc.require_path(root, &["model", "ModelOptions"])?;
    if find_option(doc, options, "INNATE_MAX_DENS").is_none() {
        append_option(doc, options, "INNATE_MAX_DENS", false);
    }

    let interventions = doc.require_child(root, "interventions")?;
    let Some(larv) = doc.child(interventions, "larviciding")? else {
        return Ok(());
    };
    let steps_per_year = steps_per_year(doc)?;

    let vector_pop = doc.append_element(interventions, "vectorPop");
    doc.append_child(vector_pop, larv)?;
    let name = format!(
        "{} translated from schema 30",
        doc.attr(larv, "name").unwrap_or("simple larviciding")
    );
    doc.set_attr(larv, "name", name);

    let desc = doc.require_child(larv, "description")?;
    for anoph in doc.children_named(desc, "anopheles") {
        let duration = doc.require_child(anoph, "duration")?;
        let effectiveness = doc.require_child(anoph, "effectiveness")?;
        let duration_steps: f64 = doc.require_attr_parse(duration, "value")?;
        let initial = doc.require_attr(effectiveness, "value")?.to_string();
        doc.detach(duration);
        doc.detach(effectiveness);

        let reduction = append_with_attrs(doc, anoph, "emergenceReduction", &[("initial", initial.as_str())]);
        let years = fmt_f64(duration_steps / steps_per_year);
        append_with_attrs(doc, reduction, "decay", &[("function", "step"), ("L", years.as_str())]);
    }
    doc.rename(larv, "intervention");
    Ok(())
}
