//! Patient-facing schedule and reminder endpoints

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::{PerryClient, failure};
use crate::error::ApiError;

/// Default look-ahead window for upcoming reminders
pub const DEFAULT_HOURS_AHEAD: u32 = 24;

/// Map a user-facing patient id to the backend's canonical id by stripping `prefix`
pub fn normalize_patient_id<'a>(id: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return id;
    }
    id.strip_prefix(prefix).unwrap_or(id)
}

/// Kind of preoperative action a reminder covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    Medication,
    Fasting,
    Bathing,
    SubstanceUse,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Reminder lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    #[default]
    Pending,
    Sent,
    Completed,
    Missed,
    #[serde(other)]
    Unknown,
}

/// A scheduled patient action
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Reminder {
    pub id: String,
    pub patient_id: String,
    #[serde(rename = "type")]
    pub kind: ReminderType,
    pub medicine: Option<String>,
    pub action: String,
    pub reminder_datetime: Option<String>,
    pub notes: Option<String>,
    pub status: ReminderStatus,
    pub completed_at: Option<String>,
    pub created_at: Option<String>,
}

impl Reminder {
    /// Scheduled time, if the backend supplied a parseable one
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        self.reminder_datetime.as_deref().and_then(parse_timestamp)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ReminderStatus::Completed
    }

    /// Short human label: medicine and action for medications, otherwise the action
    pub fn label(&self) -> String {
        match self.medicine.as_deref().filter(|m| !m.is_empty()) {
            Some(medicine) => format!("{} ({})", medicine, self.action),
            None => self.action.replace('_', " "),
        }
    }
}

/// Parse the ISO-8601 timestamps the backend emits, with or without an offset
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Order reminders by scheduled time; undated reminders go last in their original order
pub fn sort_by_schedule(reminders: &mut [Reminder]) {
    reminders.sort_by_key(|r| (r.scheduled_at().is_none(), r.scheduled_at()));
}

/// A patient's preoperative schedule
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientSchedule {
    pub patient_id: String,
    pub surgery_date: Option<String>,
    pub reminders: Vec<Reminder>,
    pub total_reminders: u32,
    pub completed_reminders: u32,
    pub is_optimized: bool,
}

impl PatientSchedule {
    pub fn surgery_at(&self) -> Option<NaiveDateTime> {
        self.surgery_date.as_deref().and_then(parse_timestamp)
    }
}

/// Reminders due within a look-ahead window
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpcomingReminders {
    pub patient_id: String,
    pub hours_ahead: u32,
    pub reminders: Vec<Reminder>,
    pub count: Option<u32>,
}

impl UpcomingReminders {
    pub fn count(&self) -> usize {
        self.count.map(|c| c as usize).unwrap_or(self.reminders.len())
    }
}

/// A patient's optimization status
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientStatus {
    pub patient_id: String,
    pub total_reminders: u32,
    pub completed_reminders: u32,
    pub missed_reminders: u32,
    pub completion_rate: f64,
    pub is_optimized: bool,
    pub needs_reschedule: bool,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct DeviceTokenRequest<'a> {
    device_token: &'a str,
}

/// Success text from an action endpoint: its `message` field, else the raw body
fn success_text(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl PerryClient {
    /// Canonical backend id for a user-facing patient id
    pub fn patient_id<'a>(&self, id: &'a str) -> &'a str {
        normalize_patient_id(id, &self.config().patient_id_prefix)
    }

    /// Fetch the full preoperative schedule
    pub async fn schedule(&self, patient_id: &str) -> Result<PatientSchedule, ApiError> {
        let id = self.patient_id(patient_id);
        debug!(%patient_id, canonical = %id, "schedule: called");
        self.get_json(self.endpoint(&["patient", id, "schedule"])?, "schedule").await
    }

    /// Fetch reminders due within `hours_ahead` hours
    pub async fn upcoming_reminders(&self, patient_id: &str, hours_ahead: u32) -> Result<UpcomingReminders, ApiError> {
        let id = self.patient_id(patient_id);
        debug!(%patient_id, canonical = %id, hours_ahead, "upcoming_reminders: called");
        let mut url = self.endpoint(&["patient", id, "upcoming-reminders"])?;
        url.query_pairs_mut().append_pair("hours_ahead", &hours_ahead.to_string());
        let mut upcoming: UpcomingReminders = self.get_json(url, "upcoming reminders").await?;
        if upcoming.hours_ahead == 0 {
            upcoming.hours_ahead = hours_ahead;
        }
        Ok(upcoming)
    }

    /// Fetch the optimization status summary
    pub async fn status(&self, patient_id: &str) -> Result<PatientStatus, ApiError> {
        let id = self.patient_id(patient_id);
        debug!(%patient_id, canonical = %id, "status: called");
        self.get_json(self.endpoint(&["patient", id, "status"])?, "status").await
    }

    /// Register a push notification device token for the patient
    pub async fn register_device_token(&self, patient_id: &str, device_token: &str) -> Result<String, ApiError> {
        let id = self.patient_id(patient_id);
        debug!(%patient_id, canonical = %id, "register_device_token: called");
        let url = self.endpoint(&["patient", id, "register-device-token"])?;
        let body = DeviceTokenRequest { device_token };
        self.execute(
            "register device token",
            self.config().read_timeout(),
            || Ok(self.http().post(url.clone()).json(&body)),
            |status, body| {
                if (200..300).contains(&status) {
                    Ok(success_text(&body))
                } else {
                    Err(failure(status, &body, "device token registration"))
                }
            },
        )
        .await
    }

    /// Mark one of the patient's reminders as completed
    pub async fn complete_reminder(&self, patient_id: &str, reminder_id: &str) -> Result<String, ApiError> {
        let id = self.patient_id(patient_id);
        debug!(%patient_id, canonical = %id, %reminder_id, "complete_reminder: called");
        let url = self.endpoint(&["patient", id, "complete-reminder", reminder_id])?;
        self.execute(
            "complete reminder",
            self.config().read_timeout(),
            || Ok(self.http().post(url.clone())),
            |status, body| {
                if (200..300).contains(&status) {
                    Ok(success_text(&body))
                } else {
                    Err(failure(status, &body, "reminder completion"))
                }
            },
        )
        .await
    }
}
