//! PerryOps - preoperative schedule review client
//!
//! CLI entry point for uploading reports, reviewing sessions and reading
//! patient schedules.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info};

use perryclient::{Corrections, DocumentPart, PerryClient, Role, SessionId, WorkflowApi};
use perryops::chat;
use perryops::cli::{Cli, Command, OutputFormat, generate_after_help, get_log_path};
use perryops::config::Config;
use perryops::render;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("po failed: {:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Log level from config file first, before full config load
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref())
        .context("Failed to load configuration")?
        .with_base_url(cli.base_url);
    info!(base_url = %config.api.base_url, "PerryOps loaded config");

    let client = Arc::new(PerryClient::from_config(&config.api).context("Failed to create API client")?);

    debug!(command = ?cli.command, "run: dispatching command");
    match cli.command {
        Command::Upload { report, guidelines } => cmd_upload(&client, &report, guidelines.as_deref()).await,
        Command::Chat {
            session,
            report,
            guidelines,
        } => cmd_chat(&config, client, session, report, guidelines).await,
        Command::Extract { session, model } => {
            let model = model.unwrap_or_else(|| config.api.extraction_model.clone());
            let response = client.extract_with_model(&SessionId::from(session), &model).await?;
            println!("{}", response.message_text());
            Ok(())
        }
        Command::Check { session, model } => {
            let model = model.unwrap_or_else(|| config.api.compliance_model.clone());
            let response = client
                .check_compliance_with_model(&SessionId::from(session), &model)
                .await?;
            println!("{}", response.message_text());
            Ok(())
        }
        Command::Merge { session, notes } => {
            let corrections = Corrections::from_input(notes.as_deref().unwrap_or(""));
            let response = client.merge(&SessionId::from(session), &corrections).await?;
            println!("{}", response.message_text());
            Ok(())
        }
        Command::Plan { session, model } => {
            let model = model.unwrap_or_else(|| config.api.plan_model.clone());
            let response = client
                .generate_action_plan_with_model(&SessionId::from(session), &model)
                .await?;
            println!("{}", response.message_text());
            Ok(())
        }
        Command::Login {
            role,
            email,
            password,
            format,
        } => cmd_login(&client, role, &email, &password, format).await,
        Command::Patients { format } => {
            let patients = client.patients().await?;
            output(format, &patients, || render::render_patients(&patients))
        }
        Command::Dashboard { format } => {
            let dashboard = client.dashboard().await?;
            output(format, &dashboard, || render::render_dashboard(&dashboard))
        }
        Command::Schedule { patient, format } => {
            let schedule = client.schedule(&patient).await?;
            output(format, &schedule, || render::render_schedule(&schedule))
        }
        Command::Upcoming { patient, hours, format } => {
            let upcoming = client.upcoming_reminders(&patient, hours).await?;
            output(format, &upcoming, || render::render_upcoming(&upcoming))
        }
        Command::Status { patient, format } => {
            let status = client.status(&patient).await?;
            output(format, &status, || render::render_status(&status))
        }
        Command::Complete { patient, reminder } => {
            let message = client.complete_reminder(&patient, &reminder).await?;
            println!("{}", message);
            Ok(())
        }
        Command::RegisterDevice { patient, token } => {
            let message = client.register_device_token(&patient, &token).await?;
            println!("{}", message);
            Ok(())
        }
        Command::Health { format } => {
            let health = client.health().await?;
            output(format, &health, || render::render_health(&health))
        }
    }
}

/// Print `value` as pretty JSON or through its text renderer
fn output<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print!("{}", text()),
    }
    Ok(())
}

/// Upload a report and print the new session id
async fn cmd_upload(client: &PerryClient, report: &Path, guidelines: Option<&Path>) -> Result<()> {
    debug!(?report, ?guidelines, "cmd_upload: called");
    let result = upload(client, report, guidelines).await?;
    print!("{}", render::render_upload(&result));
    Ok(())
}

async fn upload(
    client: &PerryClient,
    report: &Path,
    guidelines: Option<&Path>,
) -> Result<perryclient::UploadResult> {
    let report = DocumentPart::from_path(report)?;
    let guidelines = guidelines.map(DocumentPart::from_path).transpose()?;
    Ok(client.upload(&report, guidelines.as_ref()).await?)
}

/// Chat over an existing session, or upload a report first
async fn cmd_chat(
    config: &Config,
    client: Arc<PerryClient>,
    session: Option<String>,
    report: Option<PathBuf>,
    guidelines: Option<PathBuf>,
) -> Result<()> {
    debug!(?session, ?report, "cmd_chat: called");
    let session_id = match (session, report) {
        (Some(id), _) => SessionId::from(id),
        (None, Some(report)) => {
            let result = upload(&client, &report, guidelines.as_deref()).await?;
            if result.session_id.is_empty() {
                return Err(eyre::eyre!("Upload response did not include a session id: {}", result.message));
            }
            println!("Uploaded {} (session {})", report.display(), result.session_id);
            result.session_id
        }
        (None, None) => return Err(eyre::eyre!("Either --session or --report is required")),
    };
    chat::run_interactive(config, client, session_id).await
}

/// Log in and print the access token
async fn cmd_login(client: &PerryClient, role: Role, email: &str, password: &str, format: OutputFormat) -> Result<()> {
    debug!(%role, %email, "cmd_login: called");
    let login = client.login(role, email, password).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&login)?),
        OutputFormat::Text => {
            println!("Logged in as {} ({})", login.name.bold(), login.role);
            println!("Export the token to authenticate later requests:");
            println!("  export {}={}", client.config().token_env, login.access_token);
        }
    }
    Ok(())
}
