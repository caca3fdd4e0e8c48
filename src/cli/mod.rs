//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{MetadataCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Run data-integration jobs built from adaptor operations
#[derive(Debug, Parser, Clone)]
#[command(name = "adaptors")]
#[command(version = "0.1.0")]
#[command(about = "Run CSV, BigQuery and DHIS2 adaptor jobs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a job
    Run(RunCommand),

    /// Validate a job file
    Validate(ValidateCommand),

    /// Fetch the DHIS2 metadata model
    Metadata(MetadataCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
