//! # Dispatcher
//!
//! Walks a document from its declared version to a target version, one
//! registered step at a time.
//!
//! ## Versioning
//!
//! Before each step runs, the root `schemaVersion` attribute and the schema
//! location hint are advanced to the version the step migrates *to*. After
//! a successful step the attribute therefore names the version the document
//! now conforms to. On failure the document is left partially mutated and
//! must be discarded.
//!
//! The dispatcher holds no per-document state; one instance can serve any
//! number of documents concurrently.

use omst_core::{names, Document, SchemaId, SchemaNaming, SchemaVersion, LATEST_VERSION};
use serde::Serialize;

use crate::error::MigrationError;
use crate::one_day::{self, ONE_DAY_BASELINE};
use crate::policy::Policy;
use crate::registry;
use crate::step::{StepLog, StepWarning, Transition};

/// Result of a successful migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    /// Schema the migrated document conforms to.
    pub schema: SchemaId,
    /// Version declared by the input.
    pub declared: SchemaVersion,
    pub steps_applied: Vec<Transition>,
    pub one_day_timesteps: bool,
    pub warnings: Vec<StepWarning>,
}

impl MigrationOutcome {
    pub fn final_version(&self) -> SchemaVersion {
        self.schema.version
    }
}

/// Drives documents through the step registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    naming: SchemaNaming,
}

impl Dispatcher {
    pub fn new(naming: SchemaNaming) -> Self {
        Self { naming }
    }

    pub fn naming(&self) -> SchemaNaming {
        self.naming
    }

    /// Migrate `doc` in place to `target`.
    pub fn migrate(
        &self,
        doc: &mut Document,
        target: SchemaVersion,
        policy: &Policy,
    ) -> Result<MigrationOutcome, MigrationError> {
        if target > LATEST_VERSION {
            return Err(MigrationError::TargetOutOfRange {
                target,
                latest: LATEST_VERSION,
            });
        }
        let declared = doc.version()?;
        if declared > target {
            return Err(MigrationError::UnsupportedDowngrade { declared, target });
        }

        let mut version = declared;
        let mut log = StepLog::new(Transition::into_version(version.next()));
        let mut applied = Vec::new();

        while version < target {
            let from = version;
            version = version.next();
            let step = registry::lookup(from, version)?;
            let transition = step.transition();

            self.stamp(doc, version);
            log.enter(transition);
            tracing::debug!(step = %transition, "{}", step.summary);

            (step.apply)(doc, policy, &mut log)
                .map_err(|source| MigrationError::StepFailed { transition, source })?;
            applied.push(transition);
        }

        if policy.one_day_timesteps {
            if version != ONE_DAY_BASELINE {
                return Err(MigrationError::SecondaryPipelineVersion {
                    baseline: ONE_DAY_BASELINE,
                    actual: version,
                });
            }
            tracing::debug!("applying one-day timestep translation");
            one_day::apply(doc, &mut log).map_err(MigrationError::SecondaryPipeline)?;
        }

        Ok(MigrationOutcome {
            schema: self.naming.schema_id(version),
            declared,
            steps_applied: applied,
            one_day_timesteps: policy.one_day_timesteps,
            warnings: log.into_warnings(),
        })
    }

    fn stamp(&self, doc: &mut Document, version: SchemaVersion) {
        let root = doc.root();
        doc.set_version(version);
        doc.set_attr(
            root,
            names::SCHEMA_LOCATION,
            self.naming.schema_id(version).file_name,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omst_core::parse_document;

    #[test]
    fn fixed_point_applies_nothing() {
        let xml = r#"<scenario schemaVersion="31" name="x"/>"#;
        let mut doc = parse_document(xml).unwrap();
        let out = Dispatcher::default()
            .migrate(&mut doc, SchemaVersion(31), &Policy::default())
            .unwrap();
        assert!(out.steps_applied.is_empty());
        assert_eq!(out.final_version(), SchemaVersion(31));
        assert!(!doc.has_attr(doc.root(), names::SCHEMA_LOCATION));
    }

    #[test]
    fn downgrade_is_refused() {
        let mut doc = parse_document(r#"<scenario schemaVersion="20"/>"#).unwrap();
        let err = Dispatcher::default()
            .migrate(&mut doc, SchemaVersion(19), &Policy::default())
            .unwrap_err();
        assert!(matches!(err, MigrationError::UnsupportedDowngrade { .. }));
    }

    #[test]
    fn target_beyond_latest_is_refused() {
        let mut doc = parse_document(r#"<scenario schemaVersion="20"/>"#).unwrap();
        let err = Dispatcher::default()
            .migrate(&mut doc, SchemaVersion(32), &Policy::default())
            .unwrap_err();
        assert!(matches!(err, MigrationError::TargetOutOfRange { .. }));
    }

    #[test]
    fn no_op_steps_still_stamp_version_and_location() {
        let mut doc = parse_document(r#"<scenario schemaVersion="6"/>"#).unwrap();
        let out = Dispatcher::new(SchemaNaming::Versioned)
            .migrate(&mut doc, SchemaVersion(7), &Policy::default())
            .unwrap();
        assert_eq!(out.steps_applied, vec![Transition::into_version(SchemaVersion(7))]);
        assert_eq!(doc.attr(doc.root(), names::SCHEMA_VERSION), Some("7"));
        assert_eq!(doc.attr(doc.root(), names::SCHEMA_LOCATION), Some("scenario_7.xsd"));
    }

    #[test]
    fn failing_step_is_attributed_to_its_transition() {
        // 11 → 12 refuses caseManagements.
        let xml = r#"<scenario schemaVersion="11"><caseManagements/></scenario>"#;
        let mut doc = parse_document(xml).unwrap();
        let err = Dispatcher::default()
            .migrate(&mut doc, SchemaVersion(13), &Policy::default())
            .unwrap_err();
        assert_eq!(err.transition(), Some(Transition::into_version(SchemaVersion(12))));
        assert!(err.to_string().contains("11 → 12"));
    }

    #[test]
    fn one_day_pipeline_requires_baseline() {
        let mut doc = parse_document(r#"<scenario schemaVersion="20"/>"#).unwrap();
        let policy = Policy {
            one_day_timesteps: true,
            ..Policy::default()
        };
        let err = Dispatcher::default()
            .migrate(&mut doc, SchemaVersion(20), &policy)
            .unwrap_err();
        assert!(matches!(err, MigrationError::SecondaryPipelineVersion { .. }));
    }
}
