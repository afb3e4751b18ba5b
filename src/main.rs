use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use actloop::artifact::list_artifacts;
use actloop::executor::ShellExecutor;
use actloop::oracle::AssistantsClient;
use actloop::prompt::PromptRenderer;
use actloop::runner::FeedbackLoop;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, RunOverrides};
use config::Config;

fn setup_logging(log_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("actloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("actloop.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let env = env_logger::Env::default().default_filter_or(log_level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, mut config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run { objective, overrides } => handle_run_command(objective, overrides, &mut config, cli.is_verbose()),
        Commands::Artifacts { artifact_dir } => {
            let dir = artifact_dir.as_deref().unwrap_or(config.executor.artifact_dir.as_path());
            handle_artifacts_command(dir)
        }
        Commands::Config => handle_config_command(&config),
    }
}

fn handle_run_command(objective: &str, overrides: &RunOverrides, config: &mut Config, verbose: bool) -> Result<()> {
    config.apply_overrides(overrides);
    config.validate().context("Invalid configuration")?;
    info!("Running objective: {}", objective);

    let renderer = PromptRenderer::new();
    let instructions = renderer
        .render_instructions(&config.oracle.instructions, &config.oracle.completion_sentinel)
        .context("Failed to render assistant instructions")?;

    let oracle = AssistantsClient::from_env(&config.oracle.api_key_env, config.assistants_config(instructions))
        .context("Failed to create oracle client")?;
    let executor = ShellExecutor::new(&config.executor.artifact_dir)
        .with_shell(config.executor.shell.clone())
        .with_timeout(config.executor_timeout())
        .with_echo(config.executor.echo);

    let feedback = FeedbackLoop::with_config(Arc::new(oracle), Arc::new(executor), config.loop_config());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let outcome = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                trigger.cancel();
            }
        });

        println!("{} {}", "Objective:".cyan(), objective);
        feedback.run(objective, &cancel).await
    });

    match outcome {
        Ok(report) => {
            println!(
                "{} {} actions executed on task {}",
                "Done:".green(),
                report.actions_executed,
                report.task_id
            );
            if verbose {
                for artifact in &report.artifacts {
                    println!("  {}", artifact.display());
                }
            }
            Ok(())
        }
        Err(e) => {
            error!("Loop failed: {}", e);
            eprintln!("{} {}", "Error:".red(), e.to_string().red());
            std::process::exit(1);
        }
    }
}

fn handle_artifacts_command(dir: &Path) -> Result<()> {
    info!("Listing artifacts in {}", dir.display());
    let artifacts = list_artifacts(dir).context(format!("Failed to list artifacts in {}", dir.display()))?;

    if artifacts.is_empty() {
        println!("{} {}", "No artifacts in".yellow(), dir.display());
        return Ok(());
    }
    for path in artifacts {
        println!("{}", path.display());
    }
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, config).context("Application failed")?;

    Ok(())
}
