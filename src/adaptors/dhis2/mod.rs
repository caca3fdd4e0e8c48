//! DHIS2 health information system adaptor

pub mod client;
pub mod metadata;

pub use client::{Dhis2Client, Dhis2Config, MetadataSource};
pub use metadata::{create_entity, fetch_metadata, metadata, metadata_for, Entity, FetchMetadata, Model};
