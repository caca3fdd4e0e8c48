//! Google BigQuery adaptor

pub mod client;
pub mod load;

pub use client::{BigQueryClient, BigQueryCredentials, LoadJob, TableReference, WarehouseClient};
pub use load::{load, parse_schema, Load, LoadOptions};
