//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use perryclient::{DEFAULT_HOURS_AHEAD, Role};
use tracing::debug;

/// PerryOps - preoperative schedule review client
#[derive(Parser)]
#[command(
    name = "po",
    about = "Upload preoperative reports, review extracted schedules and read patient reminders",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Backend base URL, overrides config and PERRYOPS_BASE_URL
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a preoperative report and open a session
    Upload {
        /// Report PDF
        report: PathBuf,

        /// Guideline PDF (the backend default is used when omitted)
        #[arg(short, long)]
        guidelines: Option<PathBuf>,
    },

    /// Review a session interactively: extract, check compliance, then send corrections
    Chat {
        /// Existing session id
        #[arg(short, long, conflicts_with = "report", required_unless_present = "report")]
        session: Option<String>,

        /// Upload this report first and chat over the new session
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Guideline PDF for the upload
        #[arg(short, long, requires = "report")]
        guidelines: Option<PathBuf>,
    },

    /// Run extraction over an uploaded report
    Extract {
        /// Session id
        session: String,

        /// Extraction model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Check extracted data against the guidelines
    Check {
        /// Session id
        session: String,

        /// Compliance model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Merge free-text corrections into a session
    Merge {
        /// Session id
        session: String,

        /// Correction notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Generate the patient action plan for a session
    Plan {
        /// Session id
        session: String,

        /// Planning model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Log in and print an access token
    Login {
        /// Account role (cpc, patient)
        role: Role,

        /// Account email
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List patients (CPC staff)
    Patients {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show CPC dashboard counters
    Dashboard {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a patient's preoperative schedule
    Schedule {
        /// Patient id (a `patient_` prefix is accepted)
        patient: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show reminders due soon
    Upcoming {
        /// Patient id
        patient: String,

        /// Look-ahead window in hours
        #[arg(long, default_value_t = DEFAULT_HOURS_AHEAD)]
        hours: u32,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a patient's optimization status
    Status {
        /// Patient id
        patient: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a reminder as completed
    Complete {
        /// Patient id
        patient: String,

        /// Reminder id
        reminder: String,
    },

    /// Register a push notification device token
    RegisterDevice {
        /// Patient id
        patient: String,

        /// Device token
        token: String,
    },

    /// Check that the backend is reachable
    Health {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("perryops")
        .join("logs")
        .join("perryops.log")
}

/// Help footer naming the log file
pub fn generate_after_help() -> String {
    format!("Logs are written to: {}\n", get_log_path().display())
}

/// Output format for read commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
