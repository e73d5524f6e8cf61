//! Login and CPC staff endpoints

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{PerryClient, parse_json_reply};
use crate::error::ApiError;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    CpcStaff,
    Patient,
}

impl Role {
    fn login_path(&self) -> &'static str {
        match self {
            Self::CpcStaff => "/cpc/login",
            Self::Patient => "/patient/login",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpcStaff => write!(f, "cpc"),
            Self::Patient => write!(f, "patient"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpc" | "cpc_staff" | "staff" => Ok(Self::CpcStaff),
            "patient" => Ok(Self::Patient),
            _ => Err(format!("Unknown role: {}. Use: cpc or patient", s)),
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Patient record as listed for CPC staff
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Patient {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub condition: Option<String>,
    pub created_at: Option<String>,
}

/// CPC dashboard counters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CpcDashboard {
    pub total_patients: u32,
    pub pending_reports: u32,
    pub processed_reports: u32,
    pub total_reminders: u32,
}

/// Backend health probe reply
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Health {
    pub status: String,
}

impl PerryClient {
    /// Log in as CPC staff or patient
    pub async fn login(&self, role: Role, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        debug!(%role, %email, "login: called");
        let url = self.url(role.login_path());
        let body = LoginRequest { email, password };
        let response: LoginResponse = self
            .execute(
                "login",
                self.config().read_timeout(),
                || Ok(self.http().post(&url).json(&body)),
                |status, body| parse_json_reply(status, &body, "login"),
            )
            .await?;

        info!(user_id = %response.user_id, role = %response.role, "login: succeeded");
        Ok(response)
    }

    /// List all patients (CPC staff)
    pub async fn patients(&self) -> Result<Vec<Patient>, ApiError> {
        debug!("patients: called");
        self.get_json(self.endpoint(&["cpc", "patients"])?, "patients").await
    }

    /// CPC dashboard counters
    pub async fn dashboard(&self) -> Result<CpcDashboard, ApiError> {
        debug!("dashboard: called");
        self.get_json(self.endpoint(&["cpc", "dashboard"])?, "dashboard").await
    }

    /// Backend health probe
    pub async fn health(&self) -> Result<Health, ApiError> {
        debug!("health: called");
        self.get_json(self.endpoint(&["health"])?, "health").await
    }
}
