//! autodev - repository automation scheduler
//!
//! CLI entry point for running the service and watching it live.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use autodev::activity::{JsonlActivityLog, read_activity};
use autodev::cli::{Cli, Command};
use autodev::config::Config;
use autodev::domain::RepoId;
use autodev::hub::socket::{ObserverClient, bind_observer_socket, cleanup_socket, serve_observers};
use autodev::hub::{HubMessage, MessageType};
use autodev::periodic::StaticRepositoryLister;
use autodev::processor::{DryRunProcessor, ProcessorRegistry};
use autodev::service::AutomationService;

fn parse_level(level: &str) -> tracing::Level {
    match level.to_uppercase().as_str() {
        "TRACE" => tracing::Level::TRACE,
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" | "WARNING" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", level);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autodev")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = cli_log_level
        .or(config_log_level)
        .map(parse_level)
        .unwrap_or(tracing::Level::INFO);

    let log_file = fs::File::create(log_dir.join("autodev.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run { socket } => cmd_run(config, socket).await,
        Command::Watch { repo, socket } => {
            let socket = socket.unwrap_or_else(|| config.hub.socket_path());
            cmd_watch(socket, repo).await
        }
        Command::Activity { lines } => cmd_activity(&config, lines),
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_run(config: Config, socket: Option<PathBuf>) -> Result<()> {
    let socket_path = socket.unwrap_or_else(|| config.hub.socket_path());
    let (activity, writer) = JsonlActivityLog::spawn(config.activity.log_dir())?;
    info!(path = %activity.path().display(), "Activity log opened");

    let registry = ProcessorRegistry::new().with(Arc::new(DryRunProcessor));
    let lister = Arc::new(StaticRepositoryLister::new(config.repositories.clone()));

    let service = AutomationService::new(config, registry, Arc::new(activity), lister)?;
    let listener = bind_observer_socket(&socket_path)?;
    if let Err(e) = service.start().await {
        cleanup_socket(&socket_path);
        return Err(e.into());
    }

    let server = tokio::spawn(serve_observers(
        listener,
        service.hub().clone(),
        service.shutdown_token(),
    ));

    println!(
        "{} autodev running; observers on {}",
        "●".green(),
        socket_path.display().to_string().cyan()
    );
    println!("Press {} to stop", "Ctrl-C".yellow());

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, stopping");
    }
    println!("{}", "Shutting down...".dimmed());

    service.stop().await?;
    let _ = server.await;
    cleanup_socket(&socket_path);

    // Dropping the service closes the activity channel so the writer can drain
    drop(service);
    if tokio::time::timeout(Duration::from_secs(5), writer).await.is_err() {
        warn!("Activity writer did not drain in time");
    }

    info!("autodev exited cleanly");
    Ok(())
}

async fn cmd_watch(socket_path: PathBuf, repo: Option<RepoId>) -> Result<()> {
    let mut client = ObserverClient::connect(&socket_path).await?;
    if repo.is_some() {
        client.set_filter(repo).await?;
    }

    println!("Watching {} (Ctrl-C to stop)", socket_path.display().to_string().cyan());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            message = client.next_message() => match message? {
                Some(message) => print_message(&message),
                None => {
                    println!("{}", "Service closed the connection".dimmed());
                    break;
                }
            }
        }
    }
    Ok(())
}

fn print_message(message: &HubMessage) {
    let time = message.timestamp.format("%H:%M:%S").to_string().dimmed();
    let data = &message.data;
    match message.kind {
        MessageType::Activity => {
            let kind = data["kind"].as_str().unwrap_or("?");
            let kind = if data["success"].as_bool().unwrap_or(false) {
                kind.green()
            } else {
                kind.red()
            };
            println!(
                "{} {:10} {} {}",
                time,
                kind,
                data["task_type"].as_str().unwrap_or("?").bold(),
                data["description"].as_str().unwrap_or("")
            );
        }
        MessageType::TaskUpdate => {
            println!(
                "{} {:10} {} {}",
                time,
                data["status"].as_str().unwrap_or("?").blue(),
                data["task_id"].as_str().unwrap_or("?"),
                data["description"].as_str().unwrap_or("")
            );
        }
        MessageType::QueueStats => {
            println!(
                "{} {:10} pending={} in_flight={} retrying={} processed={} failed={}",
                time,
                "stats".cyan(),
                data["pending"],
                data["in_flight"],
                data["retrying"],
                data["total_processed"],
                data["total_failed"]
            );
        }
        MessageType::Heartbeat => {
            println!("{} {}", time, "heartbeat".dimmed());
        }
    }
}

fn cmd_activity(config: &Config, lines: usize) -> Result<()> {
    let records = read_activity(config.activity.log_dir())?;
    let start = records.len().saturating_sub(lines);
    for record in &records[start..] {
        let kind = if record.success {
            record.kind.to_string().green()
        } else {
            record.kind.to_string().red()
        };
        let error = record.error.as_deref().unwrap_or_default();
        println!(
            "{} {:10} {:18} {} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            kind,
            record.task_type.as_str(),
            record.description,
            error.red()
        );
    }
    if records.is_empty() {
        println!("{}", "No activity recorded yet".dimmed());
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
