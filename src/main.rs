use adaptors::adaptors::dhis2::{metadata_for, Dhis2Config};
use adaptors::cli::commands::{MetadataCommand, RunCommand, ValidateCommand};
use adaptors::cli::output::*;
use adaptors::cli::{Cli, Command};
use adaptors::core::config::{load_configuration, load_state, JobConfig};
use adaptors::{ExecutionEngine, ExecutionEvent, State};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_job(cmd).await?,
        Command::Validate(cmd) => validate_job(cmd)?,
        Command::Metadata(cmd) => show_metadata(cmd).await?,
    }

    Ok(())
}

async fn run_job(cmd: &RunCommand) -> Result<()> {
    let config = JobConfig::from_file(&cmd.file).context("Failed to load job config")?;

    eprintln!("{} Loaded job: {}", INFO, style(&config.name).bold());

    let mut state = match &cmd.state {
        Some(path) => load_state(path).context("Failed to load initial state")?,
        None => State::default(),
    };
    if let Some(path) = &cmd.config {
        state.configuration = load_configuration(path).context("Failed to load credentials")?;
    }

    // Apply configuration overrides
    if !cmd.set.is_empty() {
        if !state.configuration.is_object() {
            state.configuration = Value::Object(Default::default());
        }
        if let Value::Object(map) = &mut state.configuration {
            for (key, value) in &cmd.set {
                map.insert(key.clone(), Value::String(value.clone()));
                eprintln!(
                    "{} Configuration override: {} = {}",
                    INFO,
                    style(key).cyan(),
                    style(value).dim()
                );
            }
        }
    }

    let job = config.to_job();
    let engine = ExecutionEngine::new();

    // Set up event handler for console output
    let progress = create_progress_bar(job.len());
    let bar = progress.clone();
    engine
        .add_event_handler(move |event| {
            bar.println(format_execution_event(&event));
            match &event {
                ExecutionEvent::OperationStarted { step_id, .. } => bar.set_message(step_id.clone()),
                ExecutionEvent::OperationCompleted { .. } => bar.inc(1),
                _ => {}
            }
        })
        .await;

    let (summary, result) = engine.execute(&job, state).await;
    progress.finish_and_clear();
    eprintln!("\n{}", format_run_summary(&summary));

    match result {
        Ok(state) => {
            match &cmd.output {
                Some(path) => {
                    write_json(path, &state.to_value()?)?;
                    eprintln!("{} Final state written to {}", INFO, style(path).cyan());
                }
                None => {
                    let data = serde_json::to_string_pretty(&state.data)?;
                    println!("{}", format_output(&data, 40));
                }
            }
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            eprintln!(
                "{} {} {}",
                CROSS,
                style(&job.name).bold(),
                style("failed").red()
            );
            std::process::exit(1);
        }
    }
}

fn validate_job(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating job...", INFO);

    match JobConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Job configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            for step in &config.steps {
                println!(
                    "    {} {}",
                    style(&step.id).cyan(),
                    style(step.operation.kind()).dim()
                );
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {:#}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn show_metadata(cmd: &MetadataCommand) -> Result<()> {
    let settings = load_configuration(&cmd.config).context("Failed to load DHIS2 settings")?;
    let config: Dhis2Config =
        serde_json::from_value(settings).context("Invalid DHIS2 connection settings")?;

    let model = match metadata_for(&config).await {
        Ok(model) => model,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} Could not fetch metadata from {}", CROSS, style(&config.host_url).bold());
            std::process::exit(1);
        }
    };

    let value = serde_json::to_value(&model)?;
    match &cmd.output {
        Some(path) => {
            write_json(path, &value)?;
            eprintln!("{} Metadata written to {}", CHECK, style(path).cyan());
        }
        None => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(())
}

fn write_json(path: impl AsRef<Path>, value: &Value) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
