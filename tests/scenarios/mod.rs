//! Scenario-based tests for adaptors

mod csv_parsing;
mod dhis2_metadata;
mod sequencing;
