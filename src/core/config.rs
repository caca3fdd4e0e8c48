//! Job configuration from YAML

use crate::adaptors::bigquery::{load, LoadOptions};
use crate::adaptors::csv::{parse_csv, CsvOptions, CsvSource};
use crate::adaptors::dhis2::fetch_metadata;
use crate::core::common::{fields, merge, set_data};
use crate::core::operation::{boxed, BoxedOperation};
use crate::core::reference::{Input, StatePath};
use crate::core::{Job, State};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Top-level job configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Steps, run in the order listed
    pub steps: Vec<StepConfig>,
}

/// One configured step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Optional step description
    #[serde(default)]
    pub description: Option<String>,

    /// Which operation to run and its parameters
    #[serde(flatten)]
    pub operation: OperationConfig,
}

/// The operations a job file can name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationConfig {
    /// Parse CSV into `data`
    ParseCsv {
        source: CsvSource,
        #[serde(default)]
        options: CsvOptions,
    },

    /// Load a directory of files into a BigQuery table
    BigqueryLoad {
        dir: PathBuf,
        project_id: String,
        dataset_id: String,
        table_id: String,
        #[serde(default)]
        options: LoadOptions,
    },

    /// Fetch the DHIS2 metadata model into `data`
    Dhis2Metadata,

    /// Install a literal or referenced value as `data`
    SetData { value: Input },

    /// Merge fields into every object of an array
    Merge {
        path: StatePath,
        fields: BTreeMap<String, Input>,
    },
}

impl OperationConfig {
    /// Short name of the operation kind
    pub fn kind(&self) -> &'static str {
        match self {
            OperationConfig::ParseCsv { .. } => "parse_csv",
            OperationConfig::BigqueryLoad { .. } => "bigquery_load",
            OperationConfig::Dhis2Metadata => "dhis2_metadata",
            OperationConfig::SetData { .. } => "set_data",
            OperationConfig::Merge { .. } => "merge",
        }
    }

    /// Build the runnable operation
    pub fn to_operation(&self) -> BoxedOperation {
        match self {
            OperationConfig::ParseCsv { source, options } => {
                boxed(parse_csv(source.clone(), options.clone()))
            }
            OperationConfig::BigqueryLoad {
                dir,
                project_id,
                dataset_id,
                table_id,
                options,
            } => boxed(load(
                dir.clone(),
                project_id.clone(),
                dataset_id.clone(),
                table_id.clone(),
                options.clone(),
            )),
            OperationConfig::Dhis2Metadata => boxed(fetch_metadata()),
            OperationConfig::SetData { value } => boxed(set_data(value.clone())),
            OperationConfig::Merge { path, fields: pairs } => boxed(merge(
                path.clone(),
                fields(pairs.iter().map(|(k, v)| (k.clone(), v.clone()))),
            )),
        }
    }
}

impl JobConfig {
    /// Load job configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse job configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: JobConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the job configuration
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            anyhow::bail!("Job '{}' has no steps", self.name);
        }

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                anyhow::bail!("Step ids must not be empty");
            }
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }

            match &step.operation {
                OperationConfig::ParseCsv { options, .. } => {
                    options
                        .validate()
                        .with_context(|| format!("Step '{}' has invalid CSV options", step.id))?;
                }
                OperationConfig::BigqueryLoad {
                    project_id,
                    dataset_id,
                    table_id,
                    options,
                    ..
                } => {
                    for (label, value) in [
                        ("project_id", project_id),
                        ("dataset_id", dataset_id),
                        ("table_id", table_id),
                    ] {
                        if value.trim().is_empty() {
                            anyhow::bail!("Step '{}' has an empty {}", step.id, label);
                        }
                    }
                    options
                        .to_load_config()
                        .with_context(|| format!("Step '{}' has invalid load options", step.id))?;
                }
                OperationConfig::Merge { fields, .. } if fields.is_empty() => {
                    anyhow::bail!("Step '{}' merges no fields", step.id);
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Build the runnable job
    pub fn to_job(&self) -> Job {
        Job::from_config(self)
    }
}

/// Read an initial state from a JSON file, seeding missing defaults
pub fn load_state<P: AsRef<Path>>(path: P) -> Result<State> {
    let value = read_json(path.as_ref())?;
    Ok(State::from_value(value)?)
}

/// Read a credentials file
pub fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Value> {
    read_json(path.as_ref())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}
