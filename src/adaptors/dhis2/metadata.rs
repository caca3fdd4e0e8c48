//! Metadata model describing a DHIS2 instance

use crate::adaptors::dhis2::client::{Dhis2Client, Dhis2Config, MetadataSource};
use crate::core::state::compose_next_state;
use crate::core::{Operation, State};
use crate::error::{AdaptorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// A named, typed node of the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub datatype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

pub fn create_entity(name: impl Into<String>, kind: impl Into<String>, label: Option<String>) -> Entity {
    Entity {
        name: name.into(),
        kind: kind.into(),
        datatype: "string".to_string(),
        label,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataChildren {
    pub org_units: Vec<Entity>,
    pub resource_types: Value,
    pub tracked_entity_types: Vec<Entity>,
    pub attributes: Vec<Entity>,
}

/// Root of the metadata tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub children: MetadataChildren,
}

fn entities(body: &Value, collection: &str, kind: &str) -> Result<Vec<Entity>> {
    let items = match body.get(collection) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(AdaptorError::parse(
                format!("DHIS2 {}", collection),
                format!("'{}' is not a list", collection),
            ))
        }
        None => return Ok(Vec::new()),
    };

    items
        .iter()
        .map(|item| -> Result<Entity> {
            let id = item.get("id").and_then(Value::as_str).ok_or_else(|| {
                AdaptorError::parse(format!("DHIS2 {}", collection), format!("entry without id: {}", item))
            })?;
            let label = item
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(create_entity(id, kind, label))
        })
        .collect()
}

/// Build the model from any metadata source
///
/// Organisation units are required; tracked entity types and attributes
/// default to empty lists when the instance does not report them.
pub async fn metadata(source: &dyn MetadataSource) -> Result<Model> {
    let units = source.org_units().await?;
    if units.get("organisationUnits").is_none() {
        return Err(AdaptorError::parse(
            "DHIS2 organisationUnits",
            "response has no 'organisationUnits' collection",
        ));
    }
    let org_units = entities(&units, "organisationUnits", "orgUnit")?;

    let resource_types = source.resource_types().await?;

    let types = source.tracked_entity_types().await?;
    let tracked_entity_types = entities(&types, "trackedEntityTypes", "trackedEntityType")?;

    let attrs = source.attributes().await?;
    let attributes = entities(&attrs, "attributes", "attribute")?;

    info!(
        "DHIS2 metadata: {} org unit(s), {} tracked entity type(s), {} attribute(s)",
        org_units.len(),
        tracked_entity_types.len(),
        attributes.len()
    );

    Ok(Model {
        kind: "model".to_string(),
        name: "dhis2".to_string(),
        children: MetadataChildren {
            org_units,
            resource_types,
            tracked_entity_types,
            attributes,
        },
    })
}

/// Connect with the given settings and build the model
pub async fn metadata_for(config: &Dhis2Config) -> Result<Model> {
    let client = Dhis2Client::new(config.clone())?;
    metadata(&client).await
}

/// Fetch the metadata model into `data`
pub fn fetch_metadata() -> FetchMetadata {
    FetchMetadata { source: None }
}

pub struct FetchMetadata {
    source: Option<Arc<dyn MetadataSource>>,
}

impl FetchMetadata {
    /// Use this source instead of connecting with the state's configuration
    pub fn with_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.source = Some(source);
        self
    }
}

#[async_trait]
impl Operation for FetchMetadata {
    fn name(&self) -> &str {
        "dhis2_metadata"
    }

    async fn run(&self, state: State) -> Result<State> {
        let model = match &self.source {
            Some(source) => metadata(source.as_ref()).await?,
            None => {
                let config: Dhis2Config = state.configuration_as()?;
                metadata_for(&config).await?
            }
        };

        let value = serde_json::to_value(&model).map_err(|e| AdaptorError::parse("DHIS2 model", e))?;
        Ok(compose_next_state(&state, value))
    }
}
