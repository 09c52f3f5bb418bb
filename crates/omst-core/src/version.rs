//! # Schema Versions
//!
//! A scenario document declares the schema revision it conforms to in the
//! root `schemaVersion` attribute. Version 0 means "before versioning began"
//! and is assumed when the attribute is absent.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The newest schema revision any document can be migrated to.
pub const LATEST_VERSION: SchemaVersion = SchemaVersion(31);

/// Integer tag identifying a structural contract of the scenario format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    /// The implicit version of documents without a `schemaVersion` attribute.
    pub const UNVERSIONED: SchemaVersion = SchemaVersion(0);

    /// Access the raw integer.
    pub fn get(self) -> u32 {
        self.0
    }

    /// The version immediately after this one.
    pub fn next(self) -> SchemaVersion {
        SchemaVersion(self.0 + 1)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SchemaVersion {
    fn from(v: u32) -> Self {
        SchemaVersion(v)
    }
}

/// How schema file names are derived from a version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaNaming {
    /// `scenario_<N>.xsd`.
    #[default]
    Versioned,
    /// `scenario.xsd`, for the latest schema in a source tree.
    NoSuffix,
    /// `scenario_current.xsd`, for the schema under development.
    Current,
}

impl SchemaNaming {
    pub fn schema_id(self, version: SchemaVersion) -> SchemaId {
        let file_name = match self {
            SchemaNaming::Versioned => format!("scenario_{version}.xsd"),
            SchemaNaming::NoSuffix => "scenario.xsd".to_string(),
            SchemaNaming::Current => "scenario_current.xsd".to_string(),
        };
        SchemaId { version, file_name }
    }
}

/// The schema a document conforms to: its version and the file name
/// embedded in the document's schema location hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaId {
    pub version: SchemaVersion,
    pub file_name: String,
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}
