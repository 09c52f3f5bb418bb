//! # Run Configuration
//!
//! Settings for a `translate` run come from three layers, later layers
//! winning: built-in defaults, an optional YAML file (`--config`), and
//! explicit command-line flags.
//!
//! ```yaml
//! required_version: 31
//! schema_folder: ../../schema
//! input_folder: scenarios
//! output_folder: translatedScenarios
//! jobs: 4
//! policy:
//!   max_dens_correction: correct
//!   itn_description: replace
//! ```
//!
//! Setup is validated before any document is read: a bad target or a
//! missing folder fails the whole run up front.

use std::path::{Path, PathBuf};

use omst_core::{SchemaNaming, SchemaVersion, LATEST_VERSION};
use omst_migrate::{
    BugCorrection, IptiSpOption, ItnDescription, Policy, ReportOnlyAtRisk, ONE_DAY_BASELINE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::translate::{ItnChoice, TranslateArgs};

pub const DEFAULT_SCHEMA_FOLDER: &str = "../../schema";
pub const DEFAULT_INPUT_FOLDER: &str = "scenarios";
pub const DEFAULT_OUTPUT_FOLDER: &str = "translatedScenarios";

/// Version 1 only ever existed as an intermediate form of version 2.
const MERGED_VERSION: SchemaVersion = SchemaVersion(1);

/// Configuration errors. All of them are raised before any document is
/// touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("target version 1 is not supported: version 1 is merged into version 2")]
    MergedTarget,

    #[error("target version {target} is beyond the latest supported version {latest}")]
    TargetOutOfRange {
        target: SchemaVersion,
        latest: SchemaVersion,
    },

    #[error("one-day timestep translation requires target version {baseline}, not {target}")]
    OneDayTarget {
        baseline: SchemaVersion,
        target: SchemaVersion,
    },

    #[error("no such directory: {}", .0.display())]
    MissingFolder(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotAFolder(PathBuf),

    #[error("unable to create directory {}: {source}", .path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Contents of a `--config` YAML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub required_version: Option<u32>,
    pub schema_naming: Option<SchemaNaming>,
    pub validation: Option<bool>,
    pub translation: Option<bool>,
    pub schema_folder: Option<PathBuf>,
    pub input_folder: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub report: Option<PathBuf>,
    pub policy: Policy,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved settings for one `translate` run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub target: SchemaVersion,
    pub naming: SchemaNaming,
    /// Run the validation gate on every migrated document.
    pub validate: bool,
    /// Write migrated documents to the output folder.
    pub write_output: bool,
    pub schema_folder: PathBuf,
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub jobs: usize,
    pub report: Option<PathBuf>,
    pub policy: Policy,
}

impl RunConfig {
    /// Merge command-line flags over `file` and check the result.
    pub fn resolve(args: &TranslateArgs, file: FileConfig) -> Result<Self, ConfigError> {
        let mut policy = file.policy;
        if let Some(v) = args.max_dens_correction {
            policy.max_dens_correction = BugCorrection::from_bool(v);
        }
        if let Some(v) = args.ipti_sp_option_without_interventions {
            policy.ipti_sp_without_interventions = IptiSpOption::from_bool(v);
        }
        if let Some(v) = args.ipti_report_only_at_risk {
            policy.ipti_report_only_at_risk = ReportOnlyAtRisk::from_bool(v);
        }
        if let Some(choice) = args.itn_description {
            policy.itn_description = match choice {
                ItnChoice::Replace => ItnDescription::Replace,
                ItnChoice::Manual => ItnDescription::Manual,
            };
        }
        policy.one_day_timesteps |= args.one_day_timesteps;

        let naming = if args.latest_schema {
            SchemaNaming::NoSuffix
        } else if args.current_schema {
            SchemaNaming::Current
        } else {
            file.schema_naming.unwrap_or_default()
        };

        let target = args
            .required_version
            .or(file.required_version)
            .map_or(LATEST_VERSION, SchemaVersion);
        if target == MERGED_VERSION {
            return Err(ConfigError::MergedTarget);
        }
        if target > LATEST_VERSION {
            return Err(ConfigError::TargetOutOfRange {
                target,
                latest: LATEST_VERSION,
            });
        }

        let mut validate = !args.no_validation && file.validation.unwrap_or(true);
        let write_output = !args.no_translation && file.translation.unwrap_or(true);
        if policy.one_day_timesteps {
            if target != ONE_DAY_BASELINE {
                return Err(ConfigError::OneDayTarget {
                    baseline: ONE_DAY_BASELINE,
                    target,
                });
            }
            if validate {
                tracing::warn!(
                    "one-day timestep translation is intended for fitting scenarios and \
                     scenarios without interventions; validation disabled"
                );
                validate = false;
            }
        }

        Ok(Self {
            target,
            naming,
            validate,
            write_output,
            schema_folder: pick(&args.schema_folder, file.schema_folder, DEFAULT_SCHEMA_FOLDER),
            input_folder: pick(&args.input_folder, file.input_folder, DEFAULT_INPUT_FOLDER),
            output_folder: pick(&args.output_folder, file.output_folder, DEFAULT_OUTPUT_FOLDER),
            jobs: args.jobs.or(file.jobs).unwrap_or(1).max(1),
            report: args.report.clone().or(file.report),
            policy,
        })
    }

    /// Whether migrated documents are written out. One-day timestep output
    /// is always written.
    pub fn writes_output(&self) -> bool {
        self.write_output || self.policy.one_day_timesteps
    }

    /// Check the input folder, create the output folder, and check the
    /// schema folder when validating.
    pub fn prepare_folders(&self) -> Result<(), ConfigError> {
        check_folder(&self.input_folder)?;
        if !self.output_folder.exists() {
            std::fs::create_dir_all(&self.output_folder).map_err(|source| {
                ConfigError::CreateFolder {
                    path: self.output_folder.clone(),
                    source,
                }
            })?;
        }
        check_folder(&self.output_folder)?;
        if self.validate {
            check_folder(&self.schema_folder)?;
        }
        Ok(())
    }
}

fn pick(flag: &Option<PathBuf>, file: Option<PathBuf>, default: &str) -> PathBuf {
    flag.clone()
        .or(file)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn check_folder(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingFolder(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ConfigError::NotAFolder(path.to_path_buf()));
    }
    Ok(())
}
