//! # Batch Driver
//!
//! Discovers scenario files under the input folder, translates each one
//! independently and collects a [`BatchReport`].
//!
//! A failing document is logged and recorded; it never stops the batch.
//! With `jobs > 1` documents are translated on a dedicated rayon pool. No
//! document is shared between workers and the policy and validation gate
//! are read-only, so workers need no coordination.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use omst_core::SchemaVersion;
use omst_migrate::{StepWarning, Transition};
use omst_schema::ValidationGate;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::RunConfig;
use crate::translate::{translate_document, TranslateError};

const SCENARIO_EXTENSION: &str = "xml";

/// One input file and where its translation goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Recursively find `*.xml` files under `input_root`, sorted by path.
///
/// Each output path mirrors the input's path relative to `input_root`
/// under `output_root`. Only an unreadable `input_root` is an error;
/// unreadable subdirectories are logged and skipped.
pub fn discover(input_root: &Path, output_root: &Path) -> Result<Vec<BatchJob>> {
    let entries = std::fs::read_dir(input_root)
        .with_context(|| format!("cannot read directory {}", input_root.display()))?;
    let mut inputs = Vec::new();
    walk(input_root, entries, &mut inputs);
    inputs.sort();
    inputs
        .into_iter()
        .map(|input| {
            let relative = input
                .strip_prefix(input_root)
                .with_context(|| format!("{} is outside the input folder", input.display()))?;
            Ok(BatchJob {
                output: output_root.join(relative),
                input,
            })
        })
        .collect()
}

fn walk(dir: &Path, entries: std::fs::ReadDir, acc: &mut Vec<PathBuf>) {
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to read directory entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            match std::fs::read_dir(&path) {
                Ok(sub) => walk(&path, sub, acc),
                Err(e) => {
                    tracing::warn!(dir = %path.display(), error = %e, "skipping unreadable directory");
                }
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some(SCENARIO_EXTENSION) {
            acc.push(path);
        }
    }
}

/// Per-document result in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub input: PathBuf,
    /// Written file, if any.
    pub output: Option<PathBuf>,
    pub declared_version: Option<SchemaVersion>,
    pub final_version: Option<SchemaVersion>,
    pub steps_applied: usize,
    pub warnings: Vec<StepWarning>,
    pub error: Option<String>,
    /// Transition a migration failure is attributed to.
    pub failed_transition: Option<Transition>,
}

impl DocumentReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a whole `translate` run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub target: SchemaVersion,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    fn new(target: SchemaVersion, documents: Vec<DocumentReport>) -> Self {
        let succeeded = documents.iter().filter(|d| d.succeeded()).count();
        Self {
            generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            target,
            total: documents.len(),
            succeeded,
            failed: documents.len() - succeeded,
            documents,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write run report {}", path.display()))
    }
}

/// Translate every scenario under `config.input_folder`.
///
/// Errors only for problems with the batch as a whole (unreadable input
/// folder, thread pool creation); per-document failures are recorded in
/// the report.
pub fn run_batch(config: &RunConfig, gate: Option<&dyn ValidationGate>) -> Result<BatchReport> {
    let jobs = discover(&config.input_folder, &config.output_folder)?;
    tracing::info!(count = jobs.len(), workers = config.jobs, "discovered scenarios");

    let documents: Vec<DocumentReport> = if config.jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs)
            .build()
            .context("failed to start worker pool")?;
        pool.install(|| jobs.par_iter().map(|job| process(job, config, gate)).collect())
    } else {
        jobs.iter().map(|job| process(job, config, gate)).collect()
    };

    Ok(BatchReport::new(config.target, documents))
}

fn process(job: &BatchJob, config: &RunConfig, gate: Option<&dyn ValidationGate>) -> DocumentReport {
    let _span = tracing::info_span!("scenario", path = %job.input.display()).entered();
    let mut report = DocumentReport {
        input: job.input.clone(),
        output: None,
        declared_version: None,
        final_version: None,
        steps_applied: 0,
        warnings: Vec::new(),
        error: None,
        failed_transition: None,
    };

    match translate_file(job, config, gate, &mut report) {
        Ok(()) => {
            tracing::info!(
                version = %config.target,
                steps = report.steps_applied,
                warnings = report.warnings.len(),
                "translated"
            );
        }
        Err(e) => {
            tracing::error!("update of {} failed: {e:#}", job.input.display());
            report.failed_transition = e
                .downcast_ref::<TranslateError>()
                .and_then(TranslateError::transition);
            report.error = Some(format!("{e:#}"));
        }
    }
    report
}

fn translate_file(
    job: &BatchJob,
    config: &RunConfig,
    gate: Option<&dyn ValidationGate>,
    report: &mut DocumentReport,
) -> Result<()> {
    let xml = std::fs::read_to_string(&job.input)
        .with_context(|| format!("cannot read {}", job.input.display()))?;
    let translated = translate_document(&xml, config, gate)?;

    let outcome = translated.outcome;
    report.declared_version = Some(outcome.declared);
    report.final_version = Some(outcome.final_version());
    report.steps_applied = outcome.steps_applied.len();
    report.warnings = outcome.warnings;

    if let Some(xml) = translated.xml {
        if let Some(parent) = job.output.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create directory {}", parent.display()))?;
        }
        std::fs::write(&job.output, xml)
            .with_context(|| format!("cannot write {}", job.output.display()))?;
        report.output = Some(job.output.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_mirrors_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(input.join("sub/deeper")).unwrap();
        std::fs::write(input.join("b.xml"), "").unwrap();
        std::fs::write(input.join("sub/a.xml"), "").unwrap();
        std::fs::write(input.join("sub/deeper/c.xml"), "").unwrap();
        std::fs::write(input.join("sub/notes.txt"), "").unwrap();

        let out = dir.path().join("out");
        let jobs = discover(&input, &out).unwrap();
        let outputs: Vec<_> = jobs
            .iter()
            .map(|j| j.output.strip_prefix(&out).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            outputs,
            [
                PathBuf::from("b.xml"),
                PathBuf::from("sub/a.xml"),
                PathBuf::from("sub/deeper/c.xml"),
            ]
        );
    }

    #[test]
    fn discover_fails_on_missing_input_folder() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("absent"), &dir.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("cannot read directory"));
    }

    #[cfg(unix)]
    #[test]
    fn discover_skips_unreadable_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let locked = input.join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(input.join("a.xml"), "").unwrap();
        std::fs::write(locked.join("hidden.xml"), "").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list the directory.
        let bypassed = std::fs::read_dir(&locked).is_ok();
        let jobs = discover(&input, &dir.path().join("out"));
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let inputs: Vec<_> = jobs.unwrap().into_iter().map(|j| j.input).collect();
        if bypassed {
            assert_eq!(inputs, [input.join("a.xml"), locked.join("hidden.xml")]);
        } else {
            assert_eq!(inputs, [input.join("a.xml")]);
        }
    }

    #[test]
    fn report_counts_failures() {
        let ok = DocumentReport {
            input: "a.xml".into(),
            output: Some("out/a.xml".into()),
            declared_version: Some(SchemaVersion(20)),
            final_version: Some(SchemaVersion(31)),
            steps_applied: 11,
            warnings: Vec::new(),
            error: None,
            failed_transition: None,
        };
        let failed = DocumentReport {
            error: Some("bad".into()),
            output: None,
            ..ok.clone()
        };
        let report = BatchReport::new(SchemaVersion(31), vec![ok, failed]);
        assert_eq!((report.total, report.succeeded, report.failed), (2, 1, 1));
        assert!(report.generated_at.ends_with('Z'));
    }
}
