//! # Step Contract
//!
//! A step migrates a document across exactly one version increment. It
//! receives the document (already stamped with the version it migrates
//! to), the read-only [`Policy`], and a [`StepLog`] for non-fatal warnings.
//! It returns `Ok(())` or a fatal [`StepFailure`].
//!
//! Steps are not idempotent. Each assumes the exact shape guaranteed by its
//! source version, so the dispatcher never runs a step twice on the same
//! document.

use omst_core::{Document, DocumentError, SchemaVersion};
use serde::Serialize;
use thiserror::Error;

use crate::policy::{Policy, PolicyField};

/// Signature shared by every registered step.
pub type StepFn = fn(&mut Document, &Policy, &mut StepLog) -> StepResult;

pub type StepResult = Result<(), StepFailure>;

/// A version increment `from → to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Transition {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
}

impl Transition {
    pub fn into_version(to: SchemaVersion) -> Self {
        Self {
            from: SchemaVersion(to.get().saturating_sub(1)),
            to,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} → {}", self.from, self.to)
    }
}

/// Why a step could not proceed.
#[derive(Error, Debug)]
pub enum StepFailure {
    /// An ambiguity that only the operator can resolve.
    #[error("{reason}; please specify {} (config key `{}`)", .field.flag, .field.key)]
    PolicyRequired {
        field: PolicyField,
        reason: String,
    },

    /// The document lacks an element or attribute the step depends on, or
    /// holds an unreadable value.
    #[error(transparent)]
    Structure(#[from] DocumentError),

    /// The document is well-formed but its content cannot be translated
    /// without manual intervention.
    #[error("{0}")]
    Precondition(String),

    /// A value that selects between known variants matched none of them.
    #[error("unrecognized {what} \"{value}\"")]
    UnrecognizedVariant { what: &'static str, value: String },
}

impl StepFailure {
    pub fn policy(field: PolicyField, reason: impl Into<String>) -> Self {
        Self::PolicyRequired {
            field,
            reason: reason.into(),
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn unrecognized(what: &'static str, value: impl Into<String>) -> Self {
        Self::UnrecognizedVariant {
            what,
            value: value.into(),
        }
    }
}

/// A non-fatal diagnostic raised by a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepWarning {
    pub transition: Transition,
    pub message: String,
}

/// Collects warnings for one document; each warning is also logged as it is
/// raised.
#[derive(Debug, Clone)]
pub struct StepLog {
    transition: Transition,
    warnings: Vec<StepWarning>,
}

impl StepLog {
    pub fn new(transition: Transition) -> Self {
        Self {
            transition,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, transition: Transition) {
        self.transition = transition;
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(step = %self.transition, "{message}");
        self.warnings.push(StepWarning {
            transition: self.transition,
            message,
        });
    }

    pub fn warnings(&self) -> &[StepWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<StepWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_failure_names_field_and_flag() {
        let f = StepFailure::policy(
            PolicyField::MAX_DENS_CORRECTION,
            "scenario doesn't include MAX_DENS_CORRECTION",
        );
        let msg = f.to_string();
        assert!(msg.contains("--max-dens-correction BOOL"));
        assert!(msg.contains("max_dens_correction"));
    }

    #[test]
    fn warnings_record_transition() {
        let mut log = StepLog::new(Transition::into_version(SchemaVersion(8)));
        log.warn("first");
        log.enter(Transition::into_version(SchemaVersion(9)));
        log.warn("second");
        let w = log.into_warnings();
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].transition.from, SchemaVersion(7));
        assert_eq!(w[1].transition.to, SchemaVersion(9));
    }

    #[test]
    fn transition_display() {
        assert_eq!(Transition::into_version(SchemaVersion(13)).to_string(), "12 → 13");
    }
}
