//! Steps 10→11 through 19→20.
//!
//! This range holds the two bitfield decodes (model options and survey
//! options), the `model`/`healthSystem` regrouping and the first
//! policy-dependent upgrades.

use omst_core::{Document, DocumentError, NodeId, Position};

use super::{append_option, append_with_attrs, fmt_f64, require_descendant};
use crate::policy::{BugCorrection, IptiSpOption, Policy, PolicyField};
use crate::step::{StepFailure, StepLog, StepResult};

/// Cached emergence rates are removed; infection proportions get defaults.
pub fn translate_10_to_11(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let ento = doc.require_child(root, "entoData")?;
    let Some(vector) = doc.child(ento, "vector")? else {
        return Ok(());
    };
    for anoph in doc.descendants_named(vector, "anopheles") {
        doc.remove_child_named(anoph, "emergence")?;
        // Anopheles gambiae in Namawala, Tanzania.
        doc.set_attr(anoph, "propInfected", "0.078");
        doc.set_attr(anoph, "propInfectious", "0.021");
    }
    log.warn(
        "new attributes propInfected and propInfectious created with default values; \
         please correct them for each anopheles section",
    );
    Ok(())
}

/// Old case-management data cannot be converted to the event scheduler
/// automatically; `simulationDuration` is dropped.
pub fn translate_11_to_12(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    if doc.first_descendant(root, "caseManagements").is_some() {
        return Err(StepFailure::precondition(
            "please replace the caseManagements element with an EventScheduler element \
             (automatic translation is not available)",
        ));
    }
    doc.remove_attr(root, "simulationDuration");
    Ok(())
}

/// `modelVersion` bit → option name. Bit 0 was never assigned.
pub const MODEL_OPTION_BITS: [(u32, &str); 22] = [
    (1, "PENALISATION_EPISODES"),
    (2, "NEGATIVE_BINOMIAL_MASS_ACTION"),
    (3, "ATTENUATION_ASEXUAL_DENSITY"),
    (4, "LOGNORMAL_MASS_ACTION"),
    (5, "NO_PRE_ERYTHROCYTIC"),
    (6, "MAX_DENS_CORRECTION"),
    (7, "INNATE_MAX_DENS"),
    (8, "MAX_DENS_RESET"),
    (9, "DUMMY_WITHIN_HOST_MODEL"),
    (10, "PREDETERMINED_EPISODES"),
    (11, "NON_MALARIA_FEVERS"),
    (12, "INCLUDES_PK_PD"),
    (13, "CLINICAL_EVENT_SCHEDULER"),
    (14, "MUELLER_PRESENTATION_MODEL"),
    (15, "TRANS_HET"),
    (16, "COMORB_HET"),
    (17, "TREAT_HET"),
    (18, "COMORB_TRANS_HET"),
    (19, "TRANS_TREAT_HET"),
    (20, "COMORB_TREAT_HET"),
    (21, "TRIPLE_HET"),
    (22, "EMPIRICAL_WITHIN_HOST_MODEL"),
];

/// `summaryOption` bit → survey measure name.
pub const SURVEY_OPTION_BITS: [&str; 31] = [
    "nHost",
    "nInfect",
    "nExpectd",
    "nPatent",
    "sumLogPyrogenThres",
    "sumlogDens",
    "totalInfs",
    "nTransmit",
    "totalPatentInf",
    "contrib",
    "sumPyrogenThresh",
    "nTreatments1",
    "nTreatments2",
    "nTreatments3",
    "nUncomp",
    "nSevere",
    "nSeq",
    "nHospitalDeaths",
    "nIndDeaths",
    "nDirDeaths",
    "nEPIVaccinations",
    "imr_summary",
    "nMassVaccinations",
    "nHospitalRecovs",
    "nHospitalSeqs",
    "nIPTDoses",
    "annAvgK",
    "nNMFever",
    "innoculationsPerDayOfYear",
    "kappaPerDayOfYear",
    "innoculationsPerAgeGroup",
];

/// Bits whose presence makes the maximum-density correction irrelevant or
/// already explicit: MAX_DENS_CORRECTION itself and the two alternative
/// within-host models.
const MAX_DENS_DECIDED: i64 = (1 << 6) | (1 << 9) | (1 << 22);

/// Analysis numbers once reserved for Garki scenarios.
const GARKI_ANALYSIS_NUMBERS: std::ops::RangeInclusive<i64> = 22..=30;

/// Names of the set bits of `flags`, in ascending bit order.
pub fn decode_model_options(flags: i64) -> Vec<&'static str> {
    MODEL_OPTION_BITS
        .iter()
        .filter(|(bit, _)| flags & (1i64 << *bit) != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Names of the set bits of `flags`, in ascending bit order.
pub fn decode_survey_options(flags: i64) -> Vec<&'static str> {
    SURVEY_OPTION_BITS
        .iter()
        .enumerate()
        .filter(|(bit, _)| flags & (1i64 << *bit) != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// `modelVersion` and `summaryOption` bitfields become `ModelOptions` and
/// `SurveyOptions` lists of named options.
pub fn translate_12_to_13(doc: &mut Document, policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let model_flags: i64 = doc.require_attr_parse(root, "modelVersion")?;

    let model_options = doc.create_element("ModelOptions");
    for name in decode_model_options(model_flags) {
        append_option(doc, model_options, name, true);
    }
    if model_flags & MAX_DENS_DECIDED == 0 {
        match policy.max_dens_correction {
            // Enabled by default, nothing to add.
            BugCorrection::Correct => {}
            BugCorrection::DontCorrect => {
                append_option(doc, model_options, "MAX_DENS_CORRECTION", false);
            }
            BugCorrection::Unspecified => {
                return Err(StepFailure::policy(
                    PolicyField::MAX_DENS_CORRECTION,
                    "scenario doesn't include MAX_DENS_CORRECTION",
                ));
            }
        }
    }
    doc.move_node(model_options, root, Position::First)?;
    doc.remove_attr(root, "modelVersion");

    let monitoring = doc.require_child(root, "monitoring")?;
    let surveys = doc.require_child(monitoring, "surveys")?;
    let survey_flags: i64 = doc.require_attr_parse(surveys, "summaryOption")?;
    let survey_options = doc.create_element("SurveyOptions");
    for name in decode_survey_options(survey_flags) {
        append_option(doc, survey_options, name, true);
    }
    doc.insert_before(monitoring, survey_options, surveys)?;
    doc.remove_attr(surveys, "summaryOption");

    let analysis_no: i64 = doc.require_attr_parse(root, "analysisNo")?;
    if GARKI_ANALYSIS_NUMBERS.contains(&analysis_no) {
        append_option(doc, model_options, "GARKI_DENSITY_BIAS", true);
    }
    Ok(())
}

/// The drug description format changed with no direct translation.
pub fn translate_13_to_14(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    if doc.first_descendant(doc.root(), "drugDescription").is_some() {
        log.warn("drugDescription element has changed; please rewrite it manually");
    }
    Ok(())
}

/// Model options, clinical settings and parameters move under `model`; the
/// health system is regrouped around either `ImmediateOutcomes` or the
/// `EventScheduler`.
pub fn translate_15_to_16(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let model_options = require_descendant(doc, "ModelOptions")?;
    let parameters = doc.require_child(root, "parameters")?;

    let model = doc.create_element("model");
    doc.append_child(model, model_options)?;
    let clinical = doc.append_element(model, "clinical");
    doc.append_child(model, parameters)?;
    doc.append_child(root, model)?;

    let health_system = doc.create_element("healthSystem");
    let memory = match doc.child(root, "healthSystem")? {
        None => {
            let scheduler = require_descendant(doc, "EventScheduler")?;
            let memory = doc.require_attr(scheduler, "healthSystemMemory")?.to_string();
            doc.remove_attr(scheduler, "healthSystemMemory");
            doc.append_child(health_system, scheduler)?;
            let cfr = doc.append_element(health_system, "CFR");
            append_with_attrs(doc, cfr, "group", &[("cfr", "0"), ("lowerbound", "0")]);
            memory
        }
        Some(old) => {
            let memory = doc.require_attr(old, "healthSystemMemory")?.to_string();
            doc.remove_attr(old, "healthSystemMemory");
            doc.rename(old, "ImmediateOutcomes");
            let cfr = doc.require_child(old, "CFR")?;
            doc.append_child(health_system, old)?;
            doc.append_child(health_system, cfr)?;
            memory
        }
    };

    for interv in doc.descendants_named(root, "intervention") {
        let Some(change_hs) = doc.child(interv, "changeHS")? else {
            continue;
        };
        doc.remove_attr(change_hs, "healthSystemMemory");
        doc.rename(change_hs, "ImmediateOutcomes");
        let cfr = doc.require_child(change_hs, "CFR")?;
        let regrouped = doc.append_element(interv, "changeHS");
        doc.append_child(regrouped, change_hs)?;
        doc.append_child(regrouped, cfr)?;
    }

    match doc.child(root, "entoData")? {
        Some(ento) => doc.insert_before(root, health_system, ento)?,
        None => doc.append_child(root, health_system)?,
    }
    doc.set_attr(clinical, "healthSystemMemory", memory);
    Ok(())
}

/// Standard per-species mosquito parameters.
struct SpeciesDefaults {
    mosquito: &'static str,
    human_blood_index: f64,
    laid_eggs_same_day: f64,
    survival_feeding_cycle: f64,
}

const SPECIES_DEFAULTS: [SpeciesDefaults; 3] = [
    SpeciesDefaults {
        mosquito: "gambiae_ss",
        human_blood_index: 0.939,
        laid_eggs_same_day: 0.313,
        survival_feeding_cycle: 0.623,
    },
    SpeciesDefaults {
        mosquito: "funestus",
        human_blood_index: 0.98,
        laid_eggs_same_day: 0.616,
        survival_feeding_cycle: 0.611,
    },
    SpeciesDefaults {
        mosquito: "arabiensis",
        human_blood_index: 0.871,
        laid_eggs_same_day: 0.313,
        survival_feeding_cycle: 0.623,
    },
];

const HUMAN_BLOOD_INDEX_WITHOUT_NON_HUMAN_HOSTS: f64 = 1.0;
const STANDARD_NON_HUMAN_HOST_NUMBER: f64 = 1.0;
const STANDARD_RELATIVE_ENTO_AVAILABILITY: f64 = 1.0;

/// Mosquito parameters are re-expressed per species and non-human host
/// populations get an explicit size.
pub fn translate_16_to_17(doc: &mut Document, _policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let Some(vector) = doc.first_descendant(root, "vector") else {
        return Ok(());
    };
    let species = doc.descendants_named(vector, "anopheles");
    let first = *species.first().ok_or_else(|| DocumentError::MissingElement {
        parent: "vector".to_string(),
        name: "anopheles".to_string(),
    })?;

    if let Some(nhh) = doc.first_descendant(first, "nonHumanHosts") {
        let name = doc.attr(nhh, "name").unwrap_or_default().to_string();
        append_with_attrs(
            doc,
            vector,
            "nonHumanHosts",
            &[
                ("name", name.as_str()),
                ("number", fmt_f64(STANDARD_NON_HUMAN_HOST_NUMBER).as_str()),
            ],
        );
    }

    for anoph in species {
        let kind = doc.attr(anoph, "mosquito").unwrap_or_default().to_string();
        let defaults = SPECIES_DEFAULTS
            .iter()
            .find(|d| d.mosquito == kind)
            .ok_or_else(|| {
                StepFailure::precondition(format!(
                    "there are no standard values for mosquito species \"{kind}\"; \
                     please edit the values by hand"
                ))
            })?;
        let non_human_hosts = doc.descendants_named(anoph, "nonHumanHosts");
        let mosq = doc.first_descendant(anoph, "mosq").ok_or_else(|| DocumentError::MissingElement {
            parent: "anopheles".to_string(),
            name: "mosq".to_string(),
        })?;
        set_mosquito_defaults(doc, mosq, defaults, &non_human_hosts, log);
    }
    Ok(())
}

fn set_mosquito_defaults(
    doc: &mut Document,
    mosq: NodeId,
    defaults: &SpeciesDefaults,
    non_human_hosts: &[NodeId],
    log: &mut StepLog,
) {
    let human_blood_index = match non_human_hosts {
        [] => HUMAN_BLOOD_INDEX_WITHOUT_NON_HUMAN_HOSTS,
        [nhh] => {
            doc.set_attr(
                *nhh,
                "mosqRelativeEntoAvailability",
                fmt_f64(STANDARD_RELATIVE_ENTO_AVAILABILITY),
            );
            doc.remove_attr(*nhh, "mosqEntoAvailability");
            defaults.human_blood_index
        }
        _ => {
            log.warn(
                "more than one non-human host type in this scenario; please edit the \
                 relative entomological availability of each by hand",
            );
            defaults.human_blood_index
        }
    };
    doc.set_attr(mosq, "mosqHumanBloodIndex", fmt_f64(human_blood_index));
    doc.set_attr(mosq, "mosqLaidEggsSameDayProportion", fmt_f64(defaults.laid_eggs_same_day));
    doc.set_attr(
        mosq,
        "mosqSurvivalFeedingCycleProbability",
        fmt_f64(defaults.survival_feeding_cycle),
    );
    doc.remove_attr(mosq, "mosqEntoAvailability");
    doc.remove_attr(mosq, "mosqSeekingDeathRate");
}

/// Population settings move to `demography` and the EIR mode to
/// `entoData`.
pub fn translate_17_to_18(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let pop_size = doc.require_attr(root, "popSize")?.to_string();
    let max_age = doc.require_attr(root, "maximumAgeYrs")?.to_string();
    let mode = doc.require_attr(root, "mode")?.to_string();
    let demography = doc.require_child(root, "demography")?;
    let ento = doc.require_child(root, "entoData")?;

    for attr in ["popSize", "maximumAgeYrs", "mode"] {
        doc.remove_attr(root, attr);
    }
    doc.set_attr(demography, "popSize", pop_size);
    doc.set_attr(demography, "maximumAgeYrs", max_age);
    doc.set_attr(ento, "mode", mode);
    Ok(())
}

/// EIR mode 3 is gone; it is only equivalent to mode 4 when a `changeEIR`
/// intervention supplies the EIR from time 0. The unused `delta` parameter
/// is removed.
pub fn translate_18_to_19(doc: &mut Document, _policy: &Policy, _log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let ento = doc.require_child(root, "entoData")?;
    let mode: i64 = doc.require_attr_parse(ento, "mode")?;

    if mode == 3 {
        let mut transient_eir_at_0 = false;
        if let Some(timed) = doc.path(root, &["interventions", "timed"])? {
            for interv in doc.descendants_named(timed, "intervention") {
                let time: i64 = doc.require_attr_parse(interv, "time")?;
                if time == 0 && doc.child(interv, "changeEIR")?.is_some() {
                    transient_eir_at_0 = true;
                }
            }
        }
        if !transient_eir_at_0 {
            return Err(StepFailure::precondition(
                "entoData has mode=\"3\", but no changeEIR intervention found at time 0",
            ));
        }
        doc.set_attr(ento, "mode", "4");
    }

    if let Some(params) = doc.path(root, &["model", "parameters"])? {
        doc.remove_attr(params, "delta");
    }
    Ok(())
}

/// Upper age bounds the pre-20 `pSequelaeInpatient` groups always had.
const V19_SEQUELAE_UPPER_BOUNDS: [f64; 2] = [5.0, 99.0];
const SEQUELAE_LOWER_BOUNDS: [f64; 2] = [0.0, 5.0];
const DEFAULT_SEQUELAE_VALUES: [f64; 2] = [0.0132, 0.005];

/// Continuous reporting period units, IMR naming, vector thresholds, the
/// IPTi model option and health-system sequelae/CFR restructuring.
pub fn translate_19_to_20(doc: &mut Document, policy: &Policy, log: &mut StepLog) -> StepResult {
    let root = doc.root();
    let monitoring = doc.require_child(root, "monitoring")?;
    if let Some(continuous) = doc.child(monitoring, "continuous")? {
        if doc.attr(continuous, "period") == Some("5") {
            doc.set_attr(continuous, "period", "1");
        } else {
            log.warn("monitoring/continuous period changed unit from days to timesteps; please update it");
        }
    }

    let survey_options = doc.require_child(monitoring, "SurveyOptions")?;
    for option in doc.descendants_named(survey_options, "option") {
        if doc.attr(option, "name") == Some("imr_summary") {
            doc.set_attr(option, "name", "allCauseIMR");
        }
    }

    let ento = doc.require_child(root, "entoData")?;
    if let Some(vector) = doc.child(ento, "vector")? {
        for anoph in doc.descendants_named(vector, "anopheles") {
            let mosq = doc.require_child(anoph, "mosq")?;
            doc.set_attr(mosq, "minInfectedThreshold", "0.01");
        }
        log.warn(
            "new attribute minInfectedThreshold created with default 0.01; \
             please correct it for each anopheles section",
        );
    }

    let interventions = doc.child(root, "interventions")?;
    if let Some(interventions) = interventions {
        add_ipti_option(doc, interventions, policy, log)?;
    }

    let health_system = doc.require_child(root, "healthSystem")?;
    restructure_health_system(doc, health_system, log)?;
    if let Some(timed) = match interventions {
        Some(i) => doc.child(i, "timed")?,
        None => None,
    } {
        for change_hs in doc.descendants_named(timed, "changeHS") {
            restructure_health_system(doc, change_hs, log)?;
        }
    }
    Ok(())
}

fn add_ipti_option(
    doc: &mut Document,
    interventions: NodeId,
    policy: &Policy,
    log: &mut StepLog,
) -> StepResult {
    if doc.child(interventions, "iptiDescription")?.is_none() {
        return Ok(());
    }
    let mut n_ipti = 0;
    if let Some(continuous) = doc.child(interventions, "continuous")? {
        n_ipti += doc.descendants_named(continuous, "ipti").len();
    }
    if let Some(timed) = doc.child(interventions, "timed")? {
        for interv in doc.descendants_named(timed, "intervention") {
            n_ipti += doc.descendants_named(interv, "ipti").len();
        }
    }

    let root = doc.root();
    let model_options = doc.require_path(root, &["model", "ModelOptions"])?;
    let enabled = if n_ipti > 0 {
        true
    } else {
        log.warn("iptiDescription without IPT interventions");
        match policy.ipti_sp_without_interventions {
            IptiSpOption::AssumeIntended => true,
            IptiSpOption::AssumeUnintended => false,
            IptiSpOption::Unspecified => {
                return Err(StepFailure::policy(
                    PolicyField::IPTI_SP_WITHOUT_INTERVENTIONS,
                    "iptiDescription is present without IPT interventions",
                ));
            }
        }
    };
    append_option(doc, model_options, "IPTI_SP_MODEL", enabled);
    Ok(())
}

/// Read the two pre-20 sequelae groups, which must have exactly the
/// historical upper bounds.
fn read_v19_sequelae(doc: &Document, old: NodeId) -> Result<[f64; 2], StepFailure> {
    let items = doc.descendants_named(old, "item");
    let mismatch = || {
        StepFailure::precondition(
            "expected pSequelaeInpatient to have two age groups: 0-5 and 5-99; \
             manual correction required",
        )
    };
    if items.len() != V19_SEQUELAE_UPPER_BOUNDS.len() {
        return Err(mismatch());
    }
    let mut values = [0.0; 2];
    for (i, item) in items.iter().enumerate() {
        let upper: f64 = doc.require_attr_parse(*item, "maxAgeYrs")?;
        if upper != V19_SEQUELAE_UPPER_BOUNDS[i] {
            return Err(mismatch());
        }
        values[i] = doc.require_attr_parse(*item, "value")?;
    }
    Ok(values)
}

fn restructure_health_system(doc: &mut Document, hs: NodeId, log: &mut StepLog) -> StepResult {
    let values = match doc.child(hs, "ImmediateOutcomes")? {
        Some(outcomes) => {
            let old = doc.require_child(outcomes, "pSequelaeInpatient")?;
            let values = read_v19_sequelae(doc, old)?;
            doc.detach(old);
            values
        }
        None => {
            // The event scheduler had no sequelae data; this set has always
            // been used apart from where zero sequelae were wanted.
            log.warn("pSequelaeInpatient element with default data added");
            DEFAULT_SEQUELAE_VALUES
        }
    };
    let groups = doc.append_element(hs, "pSequelaeInpatient");
    for (value, lower) in values.iter().zip(SEQUELAE_LOWER_BOUNDS) {
        append_with_attrs(
            doc,
            groups,
            "group",
            &[
                ("value", fmt_f64(*value).as_str()),
                ("lowerbound", fmt_f64(lower).as_str()),
            ],
        );
    }

    let cfr = doc.require_child(hs, "CFR")?;
    for group in doc.descendants_named(cfr, "group") {
        let value = doc.require_attr(group, "cfr")?.to_string();
        doc.remove_attr(group, "cfr");
        doc.set_attr(group, "value", value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_util::{run, run_ok};

    #[test]
    fn decode_model_bits_in_ascending_order() {
        assert_eq!(
            decode_model_options(6),
            ["PENALISATION_EPISODES", "NEGATIVE_BINOMIAL_MASS_ACTION"]
        );
        assert!(decode_model_options(1).is_empty());
    }

    #[test]
    fn decode_survey_bits() {
        assert_eq!(decode_survey_options(1 | (1 << 21)), ["nHost", "imr_summary"]);
        assert_eq!(decode_survey_options(1 << 30), ["innoculationsPerAgeGroup"]);
    }

    const V12: &str = r#"<scenario modelVersion="6" analysisNo="24">
        <monitoring><continuous/><surveys summaryOption="3"><surveyTime>1</surveyTime></surveys></monitoring>
    </scenario>"#;

    #[test]
    fn twelve_to_thirteen_requires_max_dens_policy() {
        let (_, r, _) = run(translate_12_to_13, 13, V12, &Policy::default());
        match r {
            Err(StepFailure::PolicyRequired { field, .. }) => {
                assert_eq!(field, PolicyField::MAX_DENS_CORRECTION)
            }
            other => panic!("expected policy failure, got {other:?}"),
        }
    }

    #[test]
    fn twelve_to_thirteen_decodes_bitfields() {
        let policy = Policy {
            max_dens_correction: BugCorrection::DontCorrect,
            ..Policy::default()
        };
        let (doc, r, _) = run(translate_12_to_13, 13, V12, &policy);
        r.unwrap();
        let root = doc.root();
        assert!(!doc.has_attr(root, "modelVersion"));
        let mo = doc.child_elements(root)[0];
        assert_eq!(doc.name(mo), "ModelOptions");
        let opts: Vec<_> = doc
            .children_named(mo, "option")
            .iter()
            .map(|o| (doc.attr(*o, "name").unwrap().to_string(), doc.attr(*o, "value").unwrap().to_string()))
            .collect();
        assert_eq!(
            opts,
            [
                ("PENALISATION_EPISODES".to_string(), "true".to_string()),
                ("NEGATIVE_BINOMIAL_MASS_ACTION".to_string(), "true".to_string()),
                ("MAX_DENS_CORRECTION".to_string(), "false".to_string()),
                ("GARKI_DENSITY_BIAS".to_string(), "true".to_string()),
            ]
        );
        let monitoring = doc.require_child(root, "monitoring").unwrap();
        let kids: Vec<_> = doc.child_elements(monitoring).iter().map(|c| doc.name(*c).to_string()).collect();
        assert_eq!(kids, ["continuous", "SurveyOptions", "surveys"]);
        let so = doc.require_child(monitoring, "SurveyOptions").unwrap();
        assert_eq!(doc.children_named(so, "option").len(), 2);
    }

    #[test]
    fn twelve_to_thirteen_explicit_max_dens_needs_no_policy() {
        let xml = V12.replace("modelVersion=\"6\"", "modelVersion=\"64\"");
        let (doc, r, _) = run(translate_12_to_13, 13, &xml, &Policy::default());
        r.unwrap();
        let mo = doc.first_descendant(doc.root(), "ModelOptions").unwrap();
        assert_eq!(doc.children_named(mo, "option").len(), 2);
    }

    #[test]
    fn fifteen_to_sixteen_immediate_outcomes() {
        let xml = r#"<scenario>
            <ModelOptions/>
            <healthSystem name="hs" healthSystemMemory="6"><drugRegimen/><CFR><group cfr="0.1" lowerbound="0"/></CFR></healthSystem>
            <entoData/>
            <interventions><timed><intervention time="2"><changeHS name="c" healthSystemMemory="6"><CFR/></changeHS></intervention></timed></interventions>
            <parameters/>
        </scenario>"#;
        let (doc, _) = run_ok(translate_15_to_16, 16, xml);
        let root = doc.root();
        let kids: Vec<_> = doc.child_elements(root).iter().map(|c| doc.name(*c).to_string()).collect();
        assert_eq!(kids, ["healthSystem", "entoData", "interventions", "model"]);
        let hs = doc.require_child(root, "healthSystem").unwrap();
        let hs_kids: Vec<_> = doc.child_elements(hs).iter().map(|c| doc.name(*c).to_string()).collect();
        assert_eq!(hs_kids, ["ImmediateOutcomes", "CFR"]);
        let clinical = doc.require_path(root, &["model", "clinical"]).unwrap();
        assert_eq!(doc.attr(clinical, "healthSystemMemory"), Some("6"));
        let chs = doc.first_descendant(root, "changeHS").unwrap();
        let chs_kids: Vec<_> = doc.child_elements(chs).iter().map(|c| doc.name(*c).to_string()).collect();
        assert_eq!(chs_kids, ["ImmediateOutcomes", "CFR"]);
    }

    #[test]
    fn fifteen_to_sixteen_event_scheduler_gets_default_cfr() {
        let xml = r#"<scenario><ModelOptions/><EventScheduler healthSystemMemory="12"/><entoData/><parameters/></scenario>"#;
        let (doc, _) = run_ok(translate_15_to_16, 16, xml);
        let hs = doc.require_child(doc.root(), "healthSystem").unwrap();
        let group = doc.require_path(hs, &["CFR", "group"]).unwrap();
        assert_eq!(doc.attr(group, "cfr"), Some("0"));
        let es = doc.require_child(hs, "EventScheduler").unwrap();
        assert!(!doc.has_attr(es, "healthSystemMemory"));
    }

    #[test]
    fn sixteen_to_seventeen_species_defaults() {
        let xml = r#"<scenario><entoData><vector>
            <anopheles mosquito="funestus"><mosq mosqEntoAvailability="1" mosqSeekingDeathRate="2"/><nonHumanHosts name="cow" mosqEntoAvailability="3"/></anopheles>
        </vector></entoData></scenario>"#;
        let (doc, _) = run_ok(translate_16_to_17, 17, xml);
        let root = doc.root();
        let mosq = doc.first_descendant(root, "mosq").unwrap();
        assert_eq!(doc.attr(mosq, "mosqHumanBloodIndex"), Some("0.98"));
        assert_eq!(doc.attr(mosq, "mosqLaidEggsSameDayProportion"), Some("0.616"));
        assert!(!doc.has_attr(mosq, "mosqSeekingDeathRate"));
        let vector = doc.first_descendant(root, "vector").unwrap();
        let nhh = doc.require_child(vector, "nonHumanHosts").unwrap();
        assert_eq!(doc.attr(nhh, "number"), Some("1.0"));
        assert_eq!(doc.attr(nhh, "name"), Some("cow"));
    }

    #[test]
    fn sixteen_to_seventeen_unknown_species_is_fatal() {
        let xml = r#"<scenario><entoData><vector><anopheles mosquito="stephensi"><mosq/></anopheles></vector></entoData></scenario>"#;
        let (_, r, _) = run(translate_16_to_17, 17, xml, &Policy::default());
        assert!(matches!(r, Err(StepFailure::Precondition(_))));
    }

    #[test]
    fn eighteen_to_nineteen_mode_three() {
        let ok = r#"<scenario><entoData mode="3"/><interventions><timed><intervention time="0"><changeEIR/></intervention></timed></interventions></scenario>"#;
        let (doc, _) = run_ok(translate_18_to_19, 19, ok);
        let ento = doc.require_child(doc.root(), "entoData").unwrap();
        assert_eq!(doc.attr(ento, "mode"), Some("4"));

        let bad = r#"<scenario><entoData mode="3"/><interventions><timed><intervention time="5"><changeEIR/></intervention></timed></interventions></scenario>"#;
        let (_, r, _) = run(translate_18_to_19, 19, bad, &Policy::default());
        assert!(r.is_err());
    }

    const V19: &str = r#"<scenario>
        <monitoring><continuous period="5"/><SurveyOptions><option name="imr_summary" value="true"/></SurveyOptions></monitoring>
        <healthSystem><ImmediateOutcomes><pSequelaeInpatient><item maxAgeYrs="5" value="0.02"/><item maxAgeYrs="99" value="0.01"/></pSequelaeInpatient></ImmediateOutcomes><CFR><group cfr="0.1" lowerbound="0"/></CFR></healthSystem>
        <entoData/>
        <interventions><iptiDescription/></interventions>
        <model><ModelOptions/></model>
    </scenario>"#;

    #[test]
    fn nineteen_to_twenty_ipti_policy() {
        let (_, r, _) = run(translate_19_to_20, 20, V19, &Policy::default());
        assert!(matches!(r, Err(StepFailure::PolicyRequired { .. })));

        let policy = Policy {
            ipti_sp_without_interventions: IptiSpOption::AssumeUnintended,
            ..Policy::default()
        };
        let (doc, r, _) = run(translate_19_to_20, 20, V19, &policy);
        r.unwrap();
        let root = doc.root();
        let opt = doc.first_descendant(doc.require_path(root, &["model", "ModelOptions"]).unwrap(), "option").unwrap();
        assert_eq!(doc.attr(opt, "value"), Some("false"));
        let survey_opt = doc.first_descendant(root, "SurveyOptions").unwrap();
        let o = doc.child_elements(survey_opt)[0];
        assert_eq!(doc.attr(o, "name"), Some("allCauseIMR"));
        let cont = doc.first_descendant(root, "continuous").unwrap();
        assert_eq!(doc.attr(cont, "period"), Some("1"));

        let hs = doc.require_child(root, "healthSystem").unwrap();
        let groups = doc.descendants_named(doc.require_child(hs, "pSequelaeInpatient").unwrap(), "group");
        assert_eq!(doc.attr(groups[0], "value"), Some("0.02"));
        assert_eq!(doc.attr(groups[1], "lowerbound"), Some("5.0"));
        let cfr_group = doc.require_path(hs, &["CFR", "group"]).unwrap();
        assert_eq!(doc.attr(cfr_group, "value"), Some("0.1"));
        assert!(!doc.has_attr(cfr_group, "cfr"));
    }

    #[test]
    fn nineteen_to_twenty_strict_sequelae_groups() {
        let xml = V19
            .replace("maxAgeYrs=\"99\"", "maxAgeYrs=\"90\"")
            .replace("<iptiDescription/>", "");
        let (_, r, _) = run(translate_19_to_20, 20, &xml, &Policy::default());
        assert!(matches!(r, Err(StepFailure::Precondition(_))));
    }
}
