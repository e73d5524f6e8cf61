//! PerryClient - typed client for the PerryOps preoperative workflow API
//!
//! Clinical staff upload a preoperative report (and optionally a guideline
//! PDF); the backend extracts a medication, fasting and bathing schedule,
//! checks it against the guidelines and merges staff corrections. Patients
//! then read their reminder schedule.
//!
//! # Modules
//!
//! - [`upload`] - multipart report upload, opens a session
//! - [`workflow`] - extract / check-compliance / merge / action plan steps
//! - [`display`] - heuristic reduction of untyped step replies to display text
//! - [`patient`] - schedule, upcoming reminders, device token, status
//! - [`account`] - login and CPC staff reads
//! - [`retry`] - opt-in retry policy wrapped around every request

pub mod account;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod patient;
pub mod retry;
pub mod upload;
pub mod workflow;

pub use account::{CpcDashboard, Health, LoginResponse, Patient, Role};
pub use client::PerryClient;
pub use config::{ApiConfig, RetryConfig};
pub use display::StepResponse;
pub use error::{ApiError, Operation, error_detail};
pub use patient::{
    DEFAULT_HOURS_AHEAD, PatientSchedule, PatientStatus, Reminder, ReminderStatus, ReminderType, UpcomingReminders,
    normalize_patient_id,
};
pub use retry::RetryPolicy;
pub use upload::{DocumentPart, UploadResult};
pub use workflow::{CORRECTION_KEY, Corrections, SessionId, WorkflowApi};
