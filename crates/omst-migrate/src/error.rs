//! Errors raised by the dispatcher.

use omst_core::{DocumentError, SchemaVersion};
use thiserror::Error;

use crate::step::{StepFailure, Transition};

/// Why a document could not be migrated. Every variant means the document
/// must be discarded.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The document is newer than the requested target.
    #[error(
        "document declares schema version {declared}, newer than the target {target}; \
         backward migration is not supported"
    )]
    UnsupportedDowngrade {
        declared: SchemaVersion,
        target: SchemaVersion,
    },

    /// The requested target is beyond the newest known version.
    #[error("target version {target} is beyond the latest supported version {latest}")]
    TargetOutOfRange {
        target: SchemaVersion,
        latest: SchemaVersion,
    },

    /// No step is registered for a version pair. Indicates a gap in the
    /// catalogue, not bad input.
    #[error("no translation step registered for {0}")]
    MissingStep(Transition),

    /// A step reported a fatal failure.
    #[error("translation {transition} failed: {source}")]
    StepFailed {
        transition: Transition,
        #[source]
        source: StepFailure,
    },

    /// The one-day timestep pipeline was requested for a document whose
    /// final version is not the pipeline's baseline.
    #[error("one-day timestep translation applies only at version {baseline}, not {actual}")]
    SecondaryPipelineVersion {
        baseline: SchemaVersion,
        actual: SchemaVersion,
    },

    /// The one-day timestep pipeline failed.
    #[error("one-day timestep translation failed: {0}")]
    SecondaryPipeline(#[source] StepFailure),

    /// The declared version could not be read.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl MigrationError {
    /// The transition a failure is attributed to, if any.
    pub fn transition(&self) -> Option<Transition> {
        match self {
            MigrationError::StepFailed { transition, .. } => Some(*transition),
            MigrationError::MissingStep(t) => Some(*t),
            _ => None,
        }
    }
}
