//! CLI command definitions

use clap::Args;

/// Run a job
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to job YAML file
    #[arg(short, long)]
    pub file: String,

    /// Initial state as JSON
    #[arg(long)]
    pub state: Option<String>,

    /// Credentials JSON, installed as the state's configuration
    #[arg(long)]
    pub config: Option<String>,

    /// Configuration overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Write the final state here instead of printing its data
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Validate a job file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to job YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Fetch the DHIS2 metadata model
#[derive(Debug, Args, Clone)]
pub struct MetadataCommand {
    /// DHIS2 connection settings as JSON
    #[arg(long)]
    pub config: String,

    /// Write the model here instead of printing it
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
