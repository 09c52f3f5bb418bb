//! # Translate Subcommand
//!
//! Translates every scenario under the input folder to the target schema
//! version. Each document is parsed, migrated, validated (unless disabled)
//! and written to the mirrored path under the output folder.
//!
//! A document that fails any stage produces no output. The remaining
//! documents are still processed; the exit code is 1 if any failed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use omst_core::{parse_document, serialize_document, DocumentError};
use omst_migrate::{Dispatcher, MigrationError, MigrationOutcome, Transition};
use omst_schema::{SchemaValidationError, SchemaValidator, ValidationGate};
use thiserror::Error;

use crate::batch::{run_batch, BatchReport};
use crate::config::{FileConfig, RunConfig};

/// Choices for `--itn-description`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ItnChoice {
    /// Replace the old parameters with the new default parameterisation.
    Replace,
    /// Keep the old description for hand editing (use with --no-validation).
    Manual,
}

/// Arguments for the `omst translate` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct TranslateArgs {
    /// Schema version to translate documents to [default: latest].
    #[arg(long, value_name = "VERSION")]
    pub required_version: Option<u32>,

    /// Use schema scenario.xsd instead of scenario_<N>.xsd.
    #[arg(long, conflicts_with = "current_schema")]
    pub latest_schema: bool,

    /// Use schema scenario_current.xsd instead of scenario_<N>.xsd.
    #[arg(long)]
    pub current_schema: bool,

    /// Don't validate the result.
    #[arg(long)]
    pub no_validation: bool,

    /// Don't write out the translated result (still translated and validated).
    #[arg(long)]
    pub no_translation: bool,

    /// Convert 5-day fitting scenarios to 1-day timesteps (target 18 only).
    #[arg(long)]
    pub one_day_timesteps: bool,

    /// 12→13: true keeps the max-density bug fix, false explicitly excludes it.
    #[arg(long, value_name = "BOOL")]
    pub max_dens_correction: Option<bool>,

    /// 19→20: for scenarios with an IPTi description but no IPT
    /// interventions, whether use of the IPTi model was intended.
    #[arg(long, value_name = "BOOL")]
    pub ipti_sp_option_without_interventions: Option<bool>,

    /// 22→23: add REPORT_ONLY_AT_RISK to scenarios using IPTI_SP_MODEL.
    #[arg(long, value_name = "BOOL")]
    pub ipti_report_only_at_risk: Option<bool>,

    /// 28→29: how to translate the old ITN description.
    #[arg(long, value_enum, value_name = "ARG")]
    pub itn_description: Option<ItnChoice>,

    /// Folder holding the scenario_<N>.xsd files [default: ../../schema].
    #[arg(long, value_name = "DIR")]
    pub schema_folder: Option<PathBuf>,

    /// Folder scanned recursively for *.xml scenarios [default: scenarios].
    #[arg(long, value_name = "DIR")]
    pub input_folder: Option<PathBuf>,

    /// Folder translated scenarios are written to [default: translatedScenarios].
    #[arg(long, value_name = "DIR")]
    pub output_folder: Option<PathBuf>,

    /// Number of documents translated in parallel [default: 1].
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(usize))]
    pub jobs: Option<usize>,

    /// Write a JSON run report to FILE.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Why one document could not be translated.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("cannot parse scenario: {0}")]
    Parse(#[source] DocumentError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Validation(#[from] SchemaValidationError),
}

impl TranslateError {
    /// The version transition a migration failure is attributed to.
    pub fn transition(&self) -> Option<Transition> {
        match self {
            TranslateError::Migration(e) => e.transition(),
            _ => None,
        }
    }
}

/// A successfully translated document.
#[derive(Debug)]
pub struct Translated {
    pub outcome: MigrationOutcome,
    /// Serialized result; `None` when output is not written.
    pub xml: Option<String>,
}

/// Parse, migrate and validate one scenario.
///
/// `gate` is consulted only when `config.validate` is set.
pub fn translate_document(
    xml: &str,
    config: &RunConfig,
    gate: Option<&dyn ValidationGate>,
) -> Result<Translated, TranslateError> {
    let mut doc = parse_document(xml).map_err(TranslateError::Parse)?;
    let outcome =
        Dispatcher::new(config.naming).migrate(&mut doc, config.target, &config.policy)?;
    if config.validate {
        if let Some(gate) = gate {
            gate.validate(&doc, &outcome.schema)?;
        }
    }
    let xml = config.writes_output().then(|| serialize_document(&doc));
    Ok(Translated { outcome, xml })
}

/// Execute the translate subcommand.
///
/// Returns exit code: 0 if every document was translated, 1 otherwise.
pub fn run_translate(args: &TranslateArgs, config_file: Option<&Path>) -> Result<u8> {
    let file = match config_file {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = RunConfig::resolve(args, file)?;
    config.prepare_folders()?;

    let validator = if config.validate {
        let validator = SchemaValidator::new(&config.schema_folder)
            .context("failed to index schema folder")?;
        tracing::info!(
            schema_dir = %validator.schema_dir().display(),
            schema_count = validator.schema_count(),
            "loaded schema folder"
        );
        Some(validator)
    } else {
        None
    };

    println!(
        "Translating scenarios in \"{}\" to version {}",
        config.input_folder.display(),
        config.target
    );
    let report = run_batch(
        &config,
        validator.as_ref().map(|v| v as &dyn ValidationGate),
    )?;
    print_summary(&report);

    if let Some(path) = &config.report {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "wrote run report");
    }

    Ok(if report.failed == 0 { 0 } else { 1 })
}

fn print_summary(report: &BatchReport) {
    println!("Scenarios: {}/{} translated", report.succeeded, report.total);
    for doc in report.documents.iter().filter(|d| d.error.is_some()) {
        let error = doc.error.as_deref().unwrap_or_default();
        println!("  FAIL: {}: {}", doc.input.display(), error);
    }
    if report.failed > 0 {
        println!(
            "\n{} scenario(s) failed out of {} total.",
            report.failed, report.total
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use omst_core::{Document, SchemaId, SchemaVersion};
    use omst_migrate::Policy;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        args: TranslateArgs,
    }

    fn parse(argv: &[&str]) -> TranslateArgs {
        let mut full = vec!["omst"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args
    }

    #[test]
    fn parses_policy_flags() {
        let a = parse(&[
            "--required-version",
            "29",
            "--max-dens-correction",
            "false",
            "--itn-description",
            "replace",
            "--jobs",
            "4",
        ]);
        assert_eq!(a.required_version, Some(29));
        assert_eq!(a.max_dens_correction, Some(false));
        assert_eq!(a.itn_description, Some(ItnChoice::Replace));
        assert_eq!(a.jobs, Some(4));
        assert!(a.ipti_report_only_at_risk.is_none());
    }

    #[test]
    fn schema_name_flags_conflict() {
        let err = Harness::try_parse_from(["omst", "--latest-schema", "--current-schema"]);
        assert!(err.is_err());
    }

    #[test]
    fn bool_flags_require_a_value() {
        assert!(Harness::try_parse_from(["omst", "--ipti-report-only-at-risk", "maybe"]).is_err());
    }

    struct RejectAll;

    impl ValidationGate for RejectAll {
        fn validate(&self, _: &Document, schema: &SchemaId) -> Result<(), SchemaValidationError> {
            Err(SchemaValidationError::ValidatorFailed {
                schema_name: schema.file_name.clone(),
                status: Some(1),
                stderr: "rejected".into(),
            })
        }
    }

    fn config(target: u32) -> RunConfig {
        RunConfig {
            target: SchemaVersion(target),
            naming: Default::default(),
            validate: true,
            write_output: true,
            schema_folder: PathBuf::new(),
            input_folder: PathBuf::new(),
            output_folder: PathBuf::new(),
            jobs: 1,
            report: None,
            policy: Policy::default(),
        }
    }

    const V10: &str = r#"<scenario schemaVersion="10"><entoData><nonVector/></entoData></scenario>"#;

    #[test]
    fn translates_and_serializes() {
        let out = translate_document(V10, &config(11), None).unwrap();
        assert_eq!(out.outcome.steps_applied.len(), 1);
        let xml = out.xml.unwrap();
        assert!(xml.contains(r#"schemaVersion="11""#));
    }

    #[test]
    fn validation_failure_discards_output() {
        let err = translate_document(V10, &config(11), Some(&RejectAll)).unwrap_err();
        assert!(matches!(err, TranslateError::Validation(_)));

        let mut no_validation = config(11);
        no_validation.validate = false;
        assert!(translate_document(V10, &no_validation, Some(&RejectAll)).is_ok());
    }

    #[test]
    fn no_translation_skips_serialization() {
        let mut cfg = config(11);
        cfg.write_output = false;
        let out = translate_document(V10, &cfg, None).unwrap();
        assert!(out.xml.is_none());
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = translate_document("<scenario>", &config(11), None).unwrap_err();
        assert!(matches!(err, TranslateError::Parse(_)));
        assert!(err.transition().is_none());
    }
}
