//! BigQuery REST client used by the load operation

use crate::error::{AdaptorError, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const SYSTEM: &str = "bigquery";

fn default_api_url() -> String {
    "https://bigquery.googleapis.com".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Credentials read from `state.configuration`
#[derive(Debug, Clone, Deserialize)]
pub struct BigQueryCredentials {
    /// OAuth2 bearer token with BigQuery scope
    #[serde(alias = "accessToken")]
    pub access_token: String,

    /// API root, overridable for emulators and tests
    #[serde(default = "default_api_url", alias = "apiUrl")]
    pub api_url: String,

    /// Dataset location passed along when polling jobs
    #[serde(default)]
    pub location: Option<String>,

    /// Delay between job status polls
    #[serde(default = "default_poll_interval_ms", alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,
}

/// Fully-qualified table identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub error_result: Option<Value>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// A load job as reported by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadJob {
    #[serde(default)]
    pub id: Option<String>,
    pub job_reference: JobReference,
    #[serde(default)]
    pub configuration: Value,
    #[serde(default)]
    pub status: JobStatus,
}

impl LoadJob {
    pub fn id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| self.job_reference.job_id.clone())
    }

    pub fn is_done(&self) -> bool {
        self.status.state == "DONE"
    }

    /// Errors attached to the job; falls back to `errorResult` when the
    /// detailed list is empty
    pub fn errors(&self) -> Vec<Value> {
        if !self.status.errors.is_empty() {
            return self.status.errors.clone();
        }
        self.status.error_result.iter().cloned().collect()
    }

    /// Schema of the destination table after the load
    pub fn schema_fields(&self) -> Option<&Value> {
        self.configuration.pointer("/load/schema/fields")
    }
}

/// The warehouse calls the load operation depends on
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Look up the destination table
    async fn get_table(&self, dataset_id: &str, table_id: &str) -> Result<TableReference>;

    /// Load one file into the table and wait for the job to finish
    async fn load_file(
        &self,
        destination: &TableReference,
        file: &Path,
        load_config: &Value,
    ) -> Result<LoadJob>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResource {
    table_reference: TableReference,
}

/// `reqwest`-backed BigQuery client
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    http: reqwest::Client,
    credentials: BigQueryCredentials,
    project_id: String,
}

impl BigQueryClient {
    pub fn new(credentials: BigQueryCredentials, project_id: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AdaptorError::http(SYSTEM, e))?;
        Ok(Self {
            http,
            credentials,
            project_id: project_id.into(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn api(&self) -> &str {
        self.credentials.api_url.trim_end_matches('/')
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.credentials.access_token)
            .send()
            .await
            .map_err(|e| AdaptorError::http(SYSTEM, e))?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AdaptorError::http(SYSTEM, e))
    }

    async fn get_job(&self, reference: &JobReference) -> Result<LoadJob> {
        let url = format!(
            "{}/bigquery/v2/projects/{}/jobs/{}",
            self.api(),
            reference.project_id,
            reference.job_id
        );
        let mut request = self.http.get(url);
        if let Some(location) = reference.location.as_ref().or(self.credentials.location.as_ref()) {
            request = request.query(&[("location", location)]);
        }
        self.send_json(request).await
    }

    async fn wait_for_job(&self, mut job: LoadJob) -> Result<LoadJob> {
        let interval = Duration::from_millis(self.credentials.poll_interval_ms);
        while !job.is_done() {
            debug!("Job {} is {}, polling again", job.id(), job.status.state);
            tokio::time::sleep(interval).await;
            job = self.get_job(&job.job_reference).await?;
        }
        Ok(job)
    }
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    async fn get_table(&self, dataset_id: &str, table_id: &str) -> Result<TableReference> {
        let url = format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables/{}",
            self.api(),
            self.project_id,
            dataset_id,
            table_id
        );
        let table: TableResource = self.send_json(self.http.get(url)).await?;
        Ok(table.table_reference)
    }

    async fn load_file(
        &self,
        destination: &TableReference,
        file: &Path,
        load_config: &Value,
    ) -> Result<LoadJob> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| AdaptorError::io(file, e))?;

        let mut load = load_config.clone();
        if let Value::Object(map) = &mut load {
            map.insert("destinationTable".to_string(), json!(destination));
        }
        let mut job_reference = json!({ "projectId": self.project_id });
        if let Some(location) = &self.credentials.location {
            job_reference["location"] = json!(location);
        }
        let body = json!({
            "configuration": { "load": load },
            "jobReference": job_reference,
        });

        // Resumable upload: the first request registers the job and returns
        // the session URL the file bytes are sent to.
        let url = format!(
            "{}/upload/bigquery/v2/projects/{}/jobs",
            self.api(),
            self.project_id
        );
        let response = self
            .http
            .post(url)
            .query(&[("uploadType", "resumable")])
            .header("X-Upload-Content-Type", "application/octet-stream")
            .bearer_auth(&self.credentials.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdaptorError::http(SYSTEM, e))?;
        let response = check_status(response).await?;

        let session_url = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AdaptorError::remote(
                    SYSTEM,
                    vec![json!({"message": "upload session did not return a Location header"})],
                )
            })?;

        debug!("Uploading {} ({} bytes)", file.display(), bytes.len());
        let job: LoadJob = self
            .send_json(
                self.http
                    .put(session_url)
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(bytes),
            )
            .await?;

        self.wait_for_job(job).await
    }
}

/// Turn a non-2xx response into a remote error carrying the API's error list
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let errors = match serde_json::from_str::<Value>(&body) {
        Ok(parsed) => match parsed.pointer("/error/errors").and_then(Value::as_array) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => vec![parsed.get("error").cloned().unwrap_or(parsed)],
        },
        Err(_) => vec![json!({ "status": status.as_u16(), "message": body })],
    };
    Err(AdaptorError::remote(SYSTEM, errors))
}
