use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

use warwatch::cli::Cli;
use warwatch::cli::commands::{Commands, DaemonCommands, KeyCommands};
use warwatch::config::Config;
use warwatch::domain::{Settings, Target, TargetStatus, WarSession, WarStatus};
use warwatch::ipc::{IpcClient, Request, Response};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warwatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("warwatch.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn connect(config: &Config) -> Result<IpcClient> {
    IpcClient::connect_to(config.socket_path())
        .await
        .context("Could not reach the daemon. Start it with 'warwatch daemon start'")
}

fn status_label(status: &WarStatus) -> ColoredString {
    match status {
        WarStatus::ActiveWar => "ACTIVE WAR".red().bold(),
        WarStatus::NoActiveWar => "no active war".green(),
        WarStatus::NoFaction => "no faction".yellow(),
        WarStatus::MissingKey => "no API key set".yellow(),
        WarStatus::Error => "error".red(),
        WarStatus::Idle => "idle".dimmed(),
    }
}

fn target_status_label(target: &Target) -> ColoredString {
    match target.status {
        TargetStatus::Okay => "Okay".green(),
        TargetStatus::Hospital => "Hospital".red(),
        TargetStatus::Traveling => "Traveling".blue(),
        TargetStatus::Abroad => "Abroad".blue(),
        TargetStatus::Jail => "Jail".yellow(),
        TargetStatus::Federal => "Federal".yellow(),
        TargetStatus::Unknown => "Unknown".dimmed(),
    }
}

fn render_state(settings: &Settings, war: &WarSession, has_api_key: bool, all: bool) {
    println!("{} {}", "Status:".bold(), status_label(&war.status));
    if !has_api_key {
        println!("  {}", "Set a key with 'warwatch key set <KEY>'".dimmed());
    }
    if let Some(message) = &war.error_message {
        println!("  {} {}", "Last error:".red(), message);
    }
    if let (Some(own), Some(enemy)) = (&war.own_faction_name, &war.enemy_faction_name) {
        println!("  {} vs {}", own.cyan(), enemy.magenta());
    }
    if war.rate_limited {
        println!("  {}", "rate limited, requests are queued".yellow());
    }
    if war.last_updated > 0 {
        let when = chrono::DateTime::from_timestamp(war.last_updated as i64, 0)
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| war.last_updated.to_string());
        println!("  {} {}", "Updated:".bold(), when);
    }

    if war.targets.is_empty() {
        return;
    }
    let mut targets: Vec<&Target> = war.targets.values().collect();
    // Attackable first, then by name.
    targets.sort_by_key(|t| (t.status != TargetStatus::Okay, t.name.clone()));
    let limit = if all { targets.len() } else { settings.max_visible_targets as usize };

    println!();
    println!("  {:<20} {:<10} {:>9} {}", "Name".bold(), "Status".bold(), "Life".bold(), "Last action".bold());
    for target in targets.iter().take(limit) {
        let life = if target.life_max > 0 {
            format!("{}/{}", target.life_current, target.life_max)
        } else {
            "-".to_string()
        };
        println!(
            "  {:<20} {:<10} {:>9} {}",
            target.name,
            target_status_label(target),
            life,
            target.last_action
        );
    }
    if targets.len() > limit {
        println!("  {}", format!("... and {} more (use --all)", targets.len() - limit).dimmed());
    }
}

async fn handle_daemon_status(config: &Config) -> Result<()> {
    match IpcClient::connect_to(config.socket_path()).await {
        Ok(mut client) => {
            let response = client.request(Request::GetState).await?;
            match response {
                Response::State { war, .. } => {
                    println!("{} ({})", "Daemon is running".green(), status_label(&war.status));
                }
                other => println!("{} {:?}", "Unexpected response:".red(), other),
            }
        }
        Err(_) => println!("{}", "Daemon is not running".red()),
    }
    Ok(())
}

async fn handle_status(config: &Config, all: bool) -> Result<()> {
    let mut client = connect(config).await?;
    match client.request(Request::GetState).await? {
        Response::State { settings, war, has_api_key } => {
            render_state(&settings, &war, has_api_key, all);
        }
        Response::Error { message } => println!("{} {}", "Error:".red(), message),
        other => println!("{} {:?}", "Unexpected response:".red(), other),
    }
    Ok(())
}

async fn handle_refresh(config: &Config) -> Result<()> {
    let mut client = connect(config).await?;
    match client.request(Request::ForceRefresh).await? {
        Response::Ok => println!("{}", "Refreshed".green()),
        Response::Error { message } => println!("{} {}", "Error:".red(), message),
        other => println!("{} {:?}", "Unexpected response:".red(), other),
    }
    Ok(())
}

async fn handle_key(config: &Config, key: &str, persist: bool) -> Result<()> {
    let mut client = connect(config).await?;
    let request = Request::ValidateApiKey {
        api_key: key.to_string(),
        persist,
    };
    match client.request(request).await? {
        Response::KeyValidation { result } => {
            if result.ok {
                let who = result.name.as_deref().unwrap_or("unknown player");
                println!("{} ({}, access level {})", "Key is valid".green(), who, result.access_level);
                if persist {
                    println!("{}", "Key stored".green());
                }
            } else {
                println!("{} {}", "Key rejected:".red(), result.message);
            }
            for check in &result.checks {
                let mark = if check.ok { "ok".green() } else { "failed".red() };
                match &check.message {
                    Some(message) => println!("  {:<16} {} ({})", check.name, mark, message),
                    None => println!("  {:<16} {}", check.name, mark),
                }
            }
        }
        Response::Error { message } => println!("{} {}", "Error:".red(), message),
        other => println!("{} {:?}", "Unexpected response:".red(), other),
    }
    Ok(())
}

async fn handle_settings(config: &Config, patch: &str) -> Result<()> {
    let patch: serde_json::Value = serde_json::from_str(patch).context("Patch must be a JSON object")?;
    let mut client = connect(config).await?;
    match client.request(Request::UpdateSettings { settings: patch }).await? {
        Response::Settings { settings } => {
            println!("{}", "Settings updated".green());
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Response::Error { message } => println!("{} {}", "Error:".red(), message),
        other => println!("{} {:?}", "Unexpected response:".red(), other),
    }
    Ok(())
}

async fn handle_reset(config: &Config) -> Result<()> {
    let mut client = connect(config).await?;
    match client.request(Request::ResetData).await? {
        Response::Ok => println!("{}", "All persisted state cleared".green()),
        Response::Error { message } => println!("{} {}", "Error:".red(), message),
        other => println!("{} {:?}", "Unexpected response:".red(), other),
    }
    Ok(())
}

async fn run_application(cli: Cli, config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command {
        Commands::Daemon { command } => match command {
            DaemonCommands::Start => {
                println!("{}", "Starting daemon...".cyan());
                warwatch::daemon::run(config).await?;
                Ok(())
            }
            DaemonCommands::Status => handle_daemon_status(&config).await,
        },
        Commands::Status { all } => handle_status(&config, all).await,
        Commands::Refresh => handle_refresh(&config).await,
        Commands::Key { command } => match command {
            KeyCommands::Set { key } => handle_key(&config, &key, true).await,
            KeyCommands::Validate { key } => handle_key(&config, &key, false).await,
        },
        Commands::Settings { patch } => handle_settings(&config, &patch).await,
        Commands::Reset => handle_reset(&config).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(cli, config).await.context("Application failed")?;

    Ok(())
}
