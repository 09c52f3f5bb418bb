//! # Step Registry
//!
//! A static table mapping each version increment to its step. Entry `i`
//! migrates from version `i` to version `i + 1`. The table's length and
//! ordering are checked at compile time, so a gap in the catalogue is a
//! build failure rather than a runtime surprise.

use omst_core::{SchemaVersion, LATEST_VERSION};

use crate::error::MigrationError;
use crate::step::{StepFn, Transition};
use crate::steps::{self as s, v00_v10 as a, v10_v20 as b, v20_v31 as c};

/// One registered step.
#[derive(Clone, Copy)]
pub struct StepEntry {
    /// Version the step migrates to.
    pub to: u32,
    /// One-line description, shown by `omst steps`.
    pub summary: &'static str,
    pub apply: StepFn,
}

impl StepEntry {
    pub fn transition(&self) -> Transition {
        Transition::into_version(SchemaVersion(self.to))
    }
}

impl std::fmt::Debug for StepEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepEntry")
            .field("to", &self.to)
            .field("summary", &self.summary)
            .finish()
    }
}

const fn entry(to: u32, summary: &'static str, apply: StepFn) -> StepEntry {
    StepEntry { to, summary, apply }
}

const TABLE_LEN: usize = LATEST_VERSION.0 as usize;

const TABLE: [StepEntry; TABLE_LEN] = [
    entry(1, "no changes (version 1 is merged into 2)", s::no_changes),
    entry(2, "schema namespace, defaults, eipDuration from nspore, best → value", a::translate_1_to_2),
    entry(3, "no changes", s::no_changes),
    entry(4, "entoData split into nonVector / vector", a::translate_3_to_4),
    entry(5, "infection incidence model flag check", a::translate_4_to_5),
    entry(6, "drop wuID; caseManagement nmf split into nmfP / nmfNP", a::translate_5_to_6),
    entry(7, "no changes (ITN and IRS descriptions added)", s::no_changes),
    entry(8, "emergence rate filename removed", a::translate_7_to_8),
    entry(9, "no changes (non-human hosts, vector availability)", s::no_changes),
    entry(10, "no changes (PKPD descriptions added)", s::no_changes),
    entry(11, "cached emergence rates removed", b::translate_10_to_11),
    entry(12, "simulationDuration removed", b::translate_11_to_12),
    entry(13, "modelVersion / summaryOption bitfields → named options", b::translate_12_to_13),
    entry(14, "drugDescription changed", b::translate_13_to_14),
    entry(15, "no changes (MDA drug information)", s::no_changes),
    entry(16, "model / healthSystem regrouping", b::translate_15_to_16),
    entry(17, "per-species mosquito parameters", b::translate_16_to_17),
    entry(18, "popSize, maximumAgeYrs → demography; mode → entoData", b::translate_17_to_18),
    entry(19, "forced EIR mode check; delta removed", b::translate_18_to_19),
    entry(20, "IMR, CFR and sequelae restructuring; IPTi model option", b::translate_19_to_20),
    entry(21, "intervention descriptions grouped", c::translate_20_to_21),
    entry(22, "no changes", s::no_changes),
    entry(23, "REPORT_ONLY_AT_RISK option", c::translate_22_to_23),
    entry(24, "assimMode removed; human availability tables", c::translate_23_to_24),
    entry(25, "vaccine types, decay functions, MDA decision tree", c::translate_24_to_25),
    entry(26, "daily uncomplicated-case probabilities; vector decay", c::translate_25_to_26),
    entry(27, "no changes", s::no_changes),
    entry(28, "entomology rename; interventions grouped by type", c::translate_27_to_28),
    entry(29, "ITN description", c::translate_28_to_29),
    entry(30, "seasonality, deployments and survey option renames", c::translate_29_to_30),
    entry(31, "INNATE_MAX_DENS default; larviciding as vector intervention", c::translate_30_to_31),
];

const _: () = {
    let mut i = 0;
    while i < TABLE_LEN {
        assert!(TABLE[i].to as usize == i + 1, "step table out of order");
        i += 1;
    }
};

static STEPS: [StepEntry; TABLE_LEN] = TABLE;

/// All registered steps in application order.
pub fn steps() -> &'static [StepEntry] {
    &STEPS
}

/// Find the step for `from → to`.
///
/// Refuses any pair that is not a single increment inside the catalogue.
pub fn lookup(from: SchemaVersion, to: SchemaVersion) -> Result<&'static StepEntry, MigrationError> {
    let t = Transition { from, to };
    if to.get() != from.get() + 1 || to > LATEST_VERSION {
        return Err(MigrationError::MissingStep(t));
    }
    STEPS
        .get(from.get() as usize)
        .ok_or(MigrationError::MissingStep(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_increment() {
        assert_eq!(steps().len(), LATEST_VERSION.get() as usize);
        for (i, s) in steps().iter().enumerate() {
            assert_eq!(s.transition().from, SchemaVersion(i as u32));
        }
    }

    #[test]
    fn lookup_finds_single_increment() {
        let s = lookup(SchemaVersion(12), SchemaVersion(13)).unwrap();
        assert_eq!(s.to, 13);
    }

    #[test]
    fn lookup_refuses_skips_and_repeats() {
        assert!(lookup(SchemaVersion(3), SchemaVersion(5)).is_err());
        assert!(lookup(SchemaVersion(5), SchemaVersion(5)).is_err());
        assert!(lookup(SchemaVersion(6), SchemaVersion(5)).is_err());
    }

    #[test]
    fn lookup_refuses_beyond_latest() {
        let err = lookup(LATEST_VERSION, LATEST_VERSION.next()).unwrap_err();
        assert!(matches!(err, MigrationError::MissingStep(_)));
    }
}
