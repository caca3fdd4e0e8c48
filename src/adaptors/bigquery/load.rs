//! Load local files into a BigQuery table

use crate::adaptors::bigquery::client::{BigQueryClient, BigQueryCredentials, WarehouseClient};
use crate::core::{Operation, State};
use crate::error::{AdaptorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Options forwarded to the load job configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Column list written as `NAME:TYPE,NAME:TYPE`
    pub schema: Option<String>,

    #[serde(alias = "writeDisposition")]
    pub write_disposition: Option<String>,

    #[serde(alias = "createDisposition")]
    pub create_disposition: Option<String>,

    #[serde(alias = "skipLeadingRows")]
    pub skip_leading_rows: Option<u32>,

    #[serde(alias = "schemaUpdateOptions")]
    pub schema_update_options: Vec<String>,

    /// Defaults to `CSV`
    #[serde(alias = "sourceFormat")]
    pub source_format: Option<String>,

    #[serde(alias = "fieldDelimiter")]
    pub field_delimiter: Option<String>,

    pub autodetect: Option<bool>,

    /// Anything else, passed to the API untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Expand a `NAME:TYPE,...` schema string into a table schema
pub fn parse_schema(schema: &str) -> Result<Value> {
    let mut fields = Vec::new();
    for column in schema.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let (name, kind) = match column.split_once(':') {
            Some((name, kind)) => (name.trim(), kind.trim()),
            None => (column, "STRING"),
        };
        if name.is_empty() {
            return Err(AdaptorError::Configuration(format!(
                "schema column '{}' has no name",
                column
            )));
        }
        let kind = if kind.is_empty() { "STRING" } else { kind };
        fields.push(json!({ "name": name, "type": kind.to_uppercase() }));
    }
    Ok(json!({ "fields": fields }))
}

impl LoadOptions {
    /// Build the `configuration.load` object sent to the API
    pub fn to_load_config(&self) -> Result<Value> {
        let mut config = self.extra.clone();

        config.insert(
            "sourceFormat".to_string(),
            json!(self.source_format.as_deref().unwrap_or("CSV")),
        );
        if let Some(schema) = &self.schema {
            config.insert("schema".to_string(), parse_schema(schema)?);
        }
        if let Some(v) = &self.write_disposition {
            config.insert("writeDisposition".to_string(), json!(v));
        }
        if let Some(v) = &self.create_disposition {
            config.insert("createDisposition".to_string(), json!(v));
        }
        if let Some(v) = self.skip_leading_rows {
            config.insert("skipLeadingRows".to_string(), json!(v));
        }
        if !self.schema_update_options.is_empty() {
            config.insert(
                "schemaUpdateOptions".to_string(),
                json!(self.schema_update_options),
            );
        }
        if let Some(v) = &self.field_delimiter {
            config.insert("fieldDelimiter".to_string(), json!(v));
        }
        if let Some(v) = self.autodetect {
            config.insert("autodetect".to_string(), json!(v));
        }

        Ok(Value::Object(config))
    }
}

/// Load every file in `dir` into `project_id.dataset_id.table_id`
///
/// The state is returned unchanged; the first failing job stops the load.
pub fn load(
    dir: impl Into<PathBuf>,
    project_id: impl Into<String>,
    dataset_id: impl Into<String>,
    table_id: impl Into<String>,
    options: LoadOptions,
) -> Load {
    Load {
        dir: dir.into(),
        project_id: project_id.into(),
        dataset_id: dataset_id.into(),
        table_id: table_id.into(),
        options,
        client: None,
    }
}

pub struct Load {
    dir: PathBuf,
    project_id: String,
    dataset_id: String,
    table_id: String,
    options: LoadOptions,
    client: Option<Arc<dyn WarehouseClient>>,
}

impl Load {
    /// Use this client instead of building one from the state's configuration
    pub fn with_client(mut self, client: Arc<dyn WarehouseClient>) -> Self {
        self.client = Some(client);
        self
    }

    fn client_for(&self, state: &State) -> Result<Arc<dyn WarehouseClient>> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => {
                let credentials: BigQueryCredentials = state.configuration_as()?;
                Ok(Arc::new(BigQueryClient::new(credentials, &self.project_id)?))
            }
        }
    }

    async fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            error!("Unable to scan directory {}: {}", self.dir.display(), e);
            AdaptorError::io(&self.dir, e)
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AdaptorError::io(&self.dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| AdaptorError::io(entry.path(), e))?;
            if file_type.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl Operation for Load {
    fn name(&self) -> &str {
        "bigquery_load"
    }

    async fn run(&self, state: State) -> Result<State> {
        info!("Google Big Query: loading files from {}", self.dir.display());

        let client = self.client_for(&state)?;
        let files = self.list_files().await?;
        let load_config = self.options.to_load_config()?;

        let table = client.get_table(&self.dataset_id, &self.table_id).await?;

        for file in &files {
            let job = client.load_file(&table, file, &load_config).await?;
            info!("Job {} completed.", job.id());
            if let Some(fields) = job.schema_fields() {
                debug!("New schema: {}", fields);
            }

            let errors = job.errors();
            if !errors.is_empty() {
                return Err(AdaptorError::remote("bigquery", errors));
            }
        }

        info!(
            "Loaded {} file(s) into {}.{}.{}",
            files.len(),
            table.project_id,
            table.dataset_id,
            table.table_id
        );
        Ok(state)
    }
}
