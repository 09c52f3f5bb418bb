//! # Schema Validation
//!
//! XSD validation of translated scenarios through an external validator
//! process.
//!
//! ## Schema Resolution
//!
//! A [`SchemaId`] names a file such as `scenario_31.xsd`. The file is looked
//! up in the schema folder indexed at construction time; XSD imports are
//! resolved by the validator relative to that folder.
//!
//! ## Diagnostics
//!
//! `xmllint --noout --schema` reports one line per violation on stderr:
//!
//! ```text
//! /tmp/.tmpA1b2.xml:12: element deploy: Schemas validity error : Element 'deploy': ...
//! ```
//!
//! [`parse_diagnostics`] turns these into [`Violation`]s. A non-zero exit
//! with no parseable diagnostics is reported verbatim.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use omst_core::{serialize_document, Document, DocumentError, SchemaId};
use serde::Serialize;
use thiserror::Error;

use crate::prepare::prepare_for_validation;

/// Validator program used when none is configured.
pub const DEFAULT_PROGRAM: &str = "xmllint";

/// Extension of schema files indexed from the schema folder.
const SCHEMA_EXTENSION: &str = "xsd";

/// Checks a document against the schema it claims to conform to.
///
/// Implementations must not modify `doc`.
pub trait ValidationGate: Send + Sync {
    fn validate(&self, doc: &Document, schema: &SchemaId) -> Result<(), SchemaValidationError>;
}

/// Error during schema validation.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The document did not conform to the schema.
    #[error("validation failed against schema '{schema_name}':\n{violations}")]
    ValidationFailed {
        schema_name: String,
        violations: ValidationViolations,
    },

    /// No file for the requested schema exists in the schema folder.
    #[error("schema '{schema_name}' not found in {}", .schema_dir.display())]
    SchemaNotFound {
        schema_name: String,
        schema_dir: PathBuf,
    },

    /// The schema folder could not be read.
    #[error("schema load error for '{schema_name}': {reason}")]
    SchemaLoadError { schema_name: String, reason: String },

    /// The validator program could not be started.
    #[error("cannot run validator '{program}': {reason}")]
    ValidatorUnavailable { program: String, reason: String },

    /// The validator exited unsuccessfully without reporting violations.
    #[error("validator failed on schema '{schema_name}' (exit status {}): {stderr}", exit_status(.status))]
    ValidatorFailed {
        schema_name: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The prepared copy could not be built.
    #[error("cannot prepare document for validation: {0}")]
    Document(#[from] DocumentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

/// A single validation violation reported by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Line in the serialized document, when the validator gave one.
    pub line: Option<u64>,
    /// Element the violation was reported on.
    pub element: Option<String>,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "  line {line}: {}", self.message),
            None => write!(f, "  (unknown): {}", self.message),
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// An XSD validator backed by an external program.
///
/// Indexes every `*.xsd` file of the schema folder at construction time.
/// The folder is not watched; schemas added later are not seen.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema_dir: PathBuf,
    /// Map from schema file name (e.g. `scenario_31.xsd`) to its path.
    schemas: BTreeMap<String, PathBuf>,
    program: PathBuf,
}

impl SchemaValidator {
    /// Index the schemas of `schema_dir`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::SchemaLoadError` if the directory
    /// cannot be read.
    pub fn new(schema_dir: impl AsRef<Path>) -> Result<Self, SchemaValidationError> {
        let schema_dir = schema_dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&schema_dir).map_err(|e| {
            SchemaValidationError::SchemaLoadError {
                schema_name: schema_dir.display().to_string(),
                reason: format!("cannot read schema directory: {e}"),
            }
        })?;

        let mut schemas = BTreeMap::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SCHEMA_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                schemas.insert(name.to_string(), path.clone());
            }
        }
        tracing::debug!(dir = %schema_dir.display(), count = schemas.len(), "indexed schema folder");

        Ok(Self {
            schema_dir,
            schemas,
            program: PathBuf::from(DEFAULT_PROGRAM),
        })
    }

    /// Use `program` instead of `xmllint`. It must accept the same
    /// command line.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Returns the number of indexed schemas.
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Returns the names of all indexed schemas, sorted alphabetically.
    pub fn schema_names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    /// Path of the schema file for `schema`.
    pub fn schema_path(&self, schema: &SchemaId) -> Result<&Path, SchemaValidationError> {
        self.schemas
            .get(&schema.file_name)
            .map(PathBuf::as_path)
            .ok_or_else(|| SchemaValidationError::SchemaNotFound {
                schema_name: schema.file_name.clone(),
                schema_dir: self.schema_dir.clone(),
            })
    }
}

impl ValidationGate for SchemaValidator {
    fn validate(&self, doc: &Document, schema: &SchemaId) -> Result<(), SchemaValidationError> {
        let xsd = self.schema_path(schema)?;
        let prepared = prepare_for_validation(doc, schema.version)?;

        let mut file = tempfile::Builder::new()
            .prefix("omst-")
            .suffix(".xml")
            .tempfile()?;
        file.write_all(serialize_document(&prepared).as_bytes())?;
        file.flush()?;
        let document_path = file.path().display().to_string();

        let output = Command::new(&self.program)
            .arg("--noout")
            .arg("--schema")
            .arg(xsd)
            .arg(file.path())
            .output()
            .map_err(|e| SchemaValidationError::ValidatorUnavailable {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            tracing::debug!(schema = %schema, "document is valid");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let violations = parse_diagnostics(&stderr, &document_path);
        if violations.is_empty() {
            return Err(SchemaValidationError::ValidatorFailed {
                schema_name: schema.file_name.clone(),
                status: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        Err(SchemaValidationError::ValidationFailed {
            schema_name: schema.file_name.clone(),
            violations: ValidationViolations { violations },
        })
    }
}

/// Extract violations from validator stderr.
///
/// Only lines reported against `document_path` are considered; the
/// summary line (`<path> fails to validate`) and schema parser noise are
/// skipped.
pub fn parse_diagnostics(stderr: &str, document_path: &str) -> Vec<Violation> {
    stderr
        .lines()
        .filter_map(|line| line.strip_prefix(document_path)?.strip_prefix(':'))
        .filter_map(parse_diagnostic_line)
        .collect()
}

/// Parse `LINE: element NAME: <kind> error : MESSAGE`.
fn parse_diagnostic_line(rest: &str) -> Option<Violation> {
    let (line, rest) = rest.split_once(':')?;
    let line = line.trim().parse().ok();
    let rest = rest.trim_start();

    let (element, rest) = match rest.strip_prefix("element ") {
        Some(after) => {
            let (name, tail) = after.split_once(':')?;
            (Some(name.trim().to_string()), tail.trim_start())
        }
        None => (None, rest),
    };
    let message = match rest.split_once(" error : ") {
        Some((_, message)) => message,
        None => rest,
    };
    let message = message.trim();
    if message.is_empty() {
        return None;
    }
    Some(Violation {
        line,
        element,
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use omst_core::{parse_document, SchemaNaming, SchemaVersion};

    const DOC_PATH: &str = "/tmp/omst-abc.xml";

    fn schema_folder(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for f in files {
            std::fs::write(dir.path().join(f), "<xs:schema/>").unwrap();
        }
        dir
    }

    #[test]
    fn parses_xmllint_diagnostics() {
        let stderr = "\
/tmp/omst-abc.xml:12: element deploy: Schemas validity error : Element 'deploy': The attribute 'time' is required but missing.
/tmp/omst-abc.xml:40: element ITN: Schemas validity error : Element 'ITN': This element is not expected.
/tmp/omst-abc.xml fails to validate
";
        let violations = parse_diagnostics(stderr, DOC_PATH);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].line, Some(12));
        assert_eq!(violations[0].element.as_deref(), Some("deploy"));
        assert_eq!(
            violations[0].message,
            "Element 'deploy': The attribute 'time' is required but missing."
        );
        assert_eq!(violations[1].element.as_deref(), Some("ITN"));
    }

    #[test]
    fn ignores_lines_for_other_files() {
        let stderr = "scenario_31.xsd:5: element import: Schemas parser warning : Skipping import.\n";
        assert!(parse_diagnostics(stderr, DOC_PATH).is_empty());
    }

    #[test]
    fn parses_parser_errors_without_element() {
        let stderr = "/tmp/omst-abc.xml:3: parser error : Opening and ending tag mismatch: a and b\n";
        let violations = parse_diagnostics(stderr, DOC_PATH);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].element, None);
        assert_eq!(violations[0].message, "Opening and ending tag mismatch: a and b");
    }

    #[test]
    fn violation_display() {
        let with_line = Violation {
            line: Some(7),
            element: None,
            message: "bad".into(),
        };
        let without = Violation {
            line: None,
            element: None,
            message: "worse".into(),
        };
        assert_eq!(with_line.to_string(), "  line 7: bad");
        assert_eq!(without.to_string(), "  (unknown): worse");

        let all = ValidationViolations {
            violations: vec![with_line, without],
        };
        assert_eq!(all.to_string(), "  line 7: bad\n  (unknown): worse");
        let json = serde_json::to_value(&all).unwrap();
        assert_eq!(json["violations"][0]["line"], 7);
    }

    #[test]
    fn indexes_only_xsd_files() {
        let dir = schema_folder(&["scenario_30.xsd", "scenario_31.xsd", "README.txt"]);
        let validator = SchemaValidator::new(dir.path()).unwrap();
        assert_eq!(validator.schema_count(), 2);
        assert_eq!(validator.schema_names(), ["scenario_30.xsd", "scenario_31.xsd"]);
        let id = SchemaNaming::Versioned.schema_id(SchemaVersion(31));
        assert_eq!(
            validator.schema_path(&id).unwrap(),
            dir.path().join("scenario_31.xsd")
        );
    }

    #[test]
    fn missing_schema_is_reported() {
        let dir = schema_folder(&["scenario_30.xsd"]);
        let validator = SchemaValidator::new(dir.path()).unwrap();
        let doc = parse_document(r#"<scenario schemaVersion="31"/>"#).unwrap();
        let id = SchemaNaming::Versioned.schema_id(SchemaVersion(31));
        let err = validator.validate(&doc, &id).unwrap_err();
        assert!(
            matches!(err, SchemaValidationError::SchemaNotFound { ref schema_name, .. } if schema_name == "scenario_31.xsd"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn unreadable_folder_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaValidator::new(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, SchemaValidationError::SchemaLoadError { .. }));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let dir = schema_folder(&["scenario_31.xsd"]);
        let validator = SchemaValidator::new(dir.path())
            .unwrap()
            .with_program("/nonexistent/omst-validator");
        let doc = parse_document(r#"<scenario schemaVersion="31"/>"#).unwrap();
        let id = SchemaNaming::Versioned.schema_id(SchemaVersion(31));
        let err = validator.validate(&doc, &id).unwrap_err();
        assert!(matches!(err, SchemaValidationError::ValidatorUnavailable { .. }));
    }

    fn xmllint_available() -> bool {
        Command::new(DEFAULT_PROGRAM).arg("--version").output().is_ok()
    }

    #[test]
    fn xmllint_accepts_and_rejects() {
        if !xmllint_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("scenario_31.xsd"),
            r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="scenario">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="demography" minOccurs="0"/>
      </xs:sequence>
      <xs:attribute name="schemaVersion" type="xs:int" use="required"/>
      <xs:attribute name="wuID" type="xs:int" use="required"/>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#,
        )
        .unwrap();
        let validator = SchemaValidator::new(dir.path()).unwrap();
        let id = SchemaNaming::Versioned.schema_id(SchemaVersion(31));

        // wuID is filled in by preparation.
        let good = parse_document(r#"<scenario schemaVersion="31"><demography/></scenario>"#).unwrap();
        validator.validate(&good, &id).unwrap();

        let bad = parse_document(r#"<scenario schemaVersion="31"><monitoring/></scenario>"#).unwrap();
        match validator.validate(&bad, &id).unwrap_err() {
            SchemaValidationError::ValidationFailed { violations, .. } => {
                assert!(violations
                    .violations()
                    .iter()
                    .any(|v| v.element.as_deref() == Some("monitoring")));
            }
            other => panic!("Expected ValidationFailed, got: {other}"),
        }
    }
}
