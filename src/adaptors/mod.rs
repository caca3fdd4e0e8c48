//! Adaptors for external systems
//!
//! Every constructor here captures its parameters and returns an
//! [`Operation`](crate::core::Operation); nothing touches the network or
//! the filesystem until the pipeline runs it.

pub mod bigquery;
pub mod csv;
pub mod dhis2;

pub use self::bigquery::{load, LoadOptions};
pub use self::csv::{parse_csv, CsvOptions, CsvSource};
pub use self::dhis2::{fetch_metadata, metadata};
