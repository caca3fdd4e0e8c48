//! DHIS2 Web API client

use crate::error::{AdaptorError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const SYSTEM: &str = "dhis2";

/// Connection settings read from `state.configuration`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dhis2Config {
    /// Instance root, e.g. `https://play.dhis2.org/2.39`
    #[serde(alias = "host_url")]
    pub host_url: String,
    pub username: String,
    pub password: String,
    /// Pins requests to `/api/{version}/...` when set
    #[serde(default, alias = "api_version")]
    pub api_version: Option<String>,
}

/// Collections the metadata model is built from
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Response carrying `organisationUnits`
    async fn org_units(&self) -> Result<Value>;

    /// List of API resource types
    async fn resource_types(&self) -> Result<Value>;

    /// Response carrying `trackedEntityTypes`
    async fn tracked_entity_types(&self) -> Result<Value>;

    /// Response carrying `attributes`
    async fn attributes(&self) -> Result<Value>;
}

/// `reqwest`-backed client using basic authentication
#[derive(Debug, Clone)]
pub struct Dhis2Client {
    http: reqwest::Client,
    config: Dhis2Config,
}

impl Dhis2Client {
    pub fn new(config: Dhis2Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AdaptorError::http(SYSTEM, e))?;
        Ok(Self { http, config })
    }

    fn url(&self, resource: &str) -> String {
        let host = self.config.host_url.trim_end_matches('/');
        match &self.config.api_version {
            Some(version) => format!("{}/api/{}/{}.json", host, version, resource),
            None => format!("{}/api/{}.json", host, resource),
        }
    }

    /// GET a collection and return the decoded body
    pub async fn get(&self, resource: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(resource);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .query(query)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| AdaptorError::http(SYSTEM, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdaptorError::http(SYSTEM, e))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&body)
                .unwrap_or_else(|_| json!({ "httpStatusCode": status.as_u16(), "message": body }));
            return Err(AdaptorError::remote(SYSTEM, vec![detail]));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| AdaptorError::parse(format!("DHIS2 response from {}", url), e))?;

        if let Some(reports) = value.get("errorReports").and_then(Value::as_array) {
            if !reports.is_empty() {
                return Err(AdaptorError::remote(SYSTEM, reports.clone()));
            }
        }

        Ok(value)
    }
}

const ID_AND_NAME: [(&str, &str); 2] = [("fields", "id,displayName"), ("paging", "false")];

#[async_trait]
impl MetadataSource for Dhis2Client {
    async fn org_units(&self) -> Result<Value> {
        self.get("organisationUnits", &ID_AND_NAME).await
    }

    async fn resource_types(&self) -> Result<Value> {
        let body = self.get("resources", &[]).await?;
        Ok(body
            .get("resources")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    async fn tracked_entity_types(&self) -> Result<Value> {
        self.get("trackedEntityTypes", &ID_AND_NAME).await
    }

    async fn attributes(&self) -> Result<Value> {
        self.get("attributes", &ID_AND_NAME).await
    }
}
