//! # Policy: Operator-Supplied Disambiguation
//!
//! Some historical upgrades cannot be decided from the document alone. For
//! each of them the operator supplies a choice up front. Every choice
//! defaults to `Unspecified`; a step that reaches an ambiguity while its
//! field is unspecified fails instead of guessing.
//!
//! A [`Policy`] is immutable for the duration of a run and is shared
//! read-only by every document in a batch.

use serde::{Deserialize, Serialize};

/// Whether to keep the maximum-density correction for scenarios that never
/// declared it (consulted by 12→13).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BugCorrection {
    #[default]
    Unspecified,
    /// Use the corrected behaviour (the option's default).
    Correct,
    /// Keep the historical behaviour; emits `MAX_DENS_CORRECTION=false`.
    DontCorrect,
}

/// How to treat an IPTi description in a scenario without IPT
/// interventions (consulted by 19→20).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IptiSpOption {
    #[default]
    Unspecified,
    /// The IPTi SP model was meant to be active.
    AssumeIntended,
    /// The description is a leftover; the model stays off.
    AssumeUnintended,
}

/// Whether IPTi SP users report only at-risk hosts (consulted by 22→23).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportOnlyAtRisk {
    #[default]
    Unspecified,
    On,
    Off,
}

/// How to translate the pre-29 ITN description (consulted by 28→29).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItnDescription {
    #[default]
    Unspecified,
    /// Replace with the default parameterisation of the new model.
    Replace,
    /// Leave the old description in place for hand editing; the result will
    /// not validate until it is rewritten.
    Manual,
}

impl BugCorrection {
    pub fn from_bool(correct: bool) -> Self {
        if correct {
            Self::Correct
        } else {
            Self::DontCorrect
        }
    }
}

impl IptiSpOption {
    pub fn from_bool(intended: bool) -> Self {
        if intended {
            Self::AssumeIntended
        } else {
            Self::AssumeUnintended
        }
    }
}

impl ReportOnlyAtRisk {
    pub fn from_bool(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// The full set of disambiguation choices for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
    pub max_dens_correction: BugCorrection,
    pub ipti_sp_without_interventions: IptiSpOption,
    pub ipti_report_only_at_risk: ReportOnlyAtRisk,
    pub itn_description: ItnDescription,
    /// Apply the one-day timestep pipeline after reaching version 18.
    pub one_day_timesteps: bool,
}

/// Identifies a policy field in diagnostics, with the command-line flag that
/// supplies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyField {
    pub key: &'static str,
    pub flag: &'static str,
}

impl PolicyField {
    pub const MAX_DENS_CORRECTION: PolicyField = PolicyField {
        key: "max_dens_correction",
        flag: "--max-dens-correction BOOL",
    };
    pub const IPTI_SP_WITHOUT_INTERVENTIONS: PolicyField = PolicyField {
        key: "ipti_sp_without_interventions",
        flag: "--ipti-sp-option-without-interventions BOOL",
    };
    pub const IPTI_REPORT_ONLY_AT_RISK: PolicyField = PolicyField {
        key: "ipti_report_only_at_risk",
        flag: "--ipti-report-only-at-risk BOOL",
    };
    pub const ITN_DESCRIPTION: PolicyField = PolicyField {
        key: "itn_description",
        flag: "--itn-description replace|manual",
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_fully_unspecified() {
        let p = Policy::default();
        assert_eq!(p.max_dens_correction, BugCorrection::Unspecified);
        assert_eq!(p.ipti_sp_without_interventions, IptiSpOption::Unspecified);
        assert_eq!(p.ipti_report_only_at_risk, ReportOnlyAtRisk::Unspecified);
        assert_eq!(p.itn_description, ItnDescription::Unspecified);
        assert!(!p.one_day_timesteps);
    }

    #[test]
    fn from_bool_maps_both_states() {
        assert_eq!(BugCorrection::from_bool(true), BugCorrection::Correct);
        assert_eq!(BugCorrection::from_bool(false), BugCorrection::DontCorrect);
        assert_eq!(IptiSpOption::from_bool(false), IptiSpOption::AssumeUnintended);
        assert_eq!(ReportOnlyAtRisk::from_bool(true), ReportOnlyAtRisk::On);
    }

    #[test]
    fn policy_deserializes_kebab_case() {
        let p: Policy = serde_json::from_str(
            r#"{"max_dens_correction":"dont-correct","itn_description":"replace"}"#,
        )
        .unwrap();
        assert_eq!(p.max_dens_correction, BugCorrection::DontCorrect);
        assert_eq!(p.itn_description, ItnDescription::Replace);
        assert_eq!(p.ipti_report_only_at_risk, ReportOnlyAtRisk::Unspecified);
    }

    #[test]
    fn policy_rejects_unknown_keys() {
        assert!(serde_json::from_str::<Policy>(r#"{"maxDens":"correct"}"#).is_err());
    }
}
