//! Client configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default model preset for extraction and action plan generation
pub const DEFAULT_EXTRACTION_MODEL: &str = "qwen32b";

/// Default model for compliance checking
pub const DEFAULT_COMPLIANCE_MODEL: &str = "amsaravi/medgemma-4b-it:q8";

/// Default marker stripped from user-facing patient ids
pub const DEFAULT_PATIENT_ID_PREFIX: &str = "patient_";

/// PerryOps backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL, without trailing slash
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable holding an optional bearer token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Model used by the extraction step
    #[serde(rename = "extraction-model")]
    pub extraction_model: String,

    /// Model used by the compliance step
    #[serde(rename = "compliance-model")]
    pub compliance_model: String,

    /// Model used for action plan generation
    #[serde(rename = "plan-model")]
    pub plan_model: String,

    #[serde(rename = "upload-timeout-ms")]
    pub upload_timeout_ms: u64,

    #[serde(rename = "extract-timeout-ms")]
    pub extract_timeout_ms: u64,

    #[serde(rename = "compliance-timeout-ms")]
    pub compliance_timeout_ms: u64,

    #[serde(rename = "merge-timeout-ms")]
    pub merge_timeout_ms: u64,

    #[serde(rename = "plan-timeout-ms")]
    pub plan_timeout_ms: u64,

    /// Timeout for schedule, reminder, login and other small requests
    #[serde(rename = "read-timeout-ms")]
    pub read_timeout_ms: u64,

    /// Prefix stripped from patient ids before they reach patient endpoints
    #[serde(rename = "patient-id-prefix")]
    pub patient_id_prefix: String,

    /// Retry policy applied to every request
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token_env: "PERRYOPS_TOKEN".to_string(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.to_string(),
            compliance_model: DEFAULT_COMPLIANCE_MODEL.to_string(),
            plan_model: DEFAULT_EXTRACTION_MODEL.to_string(),
            upload_timeout_ms: 30_000,
            extract_timeout_ms: 30_000,
            compliance_timeout_ms: 60_000,
            merge_timeout_ms: 30_000,
            plan_timeout_ms: 60_000,
            read_timeout_ms: 30_000,
            patient_id_prefix: DEFAULT_PATIENT_ID_PREFIX.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Read the bearer token from the configured environment variable, if set
    pub fn token(&self) -> Option<String> {
        debug!(token_env = %self.token_env, "token: called");
        std::env::var(&self.token_env).ok().filter(|t| !t.trim().is_empty())
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_millis(self.extract_timeout_ms)
    }

    pub fn compliance_timeout(&self) -> Duration {
        Duration::from_millis(self.compliance_timeout_ms)
    }

    pub fn merge_timeout(&self) -> Duration {
        Duration::from_millis(self.merge_timeout_ms)
    }

    pub fn plan_timeout(&self) -> Duration {
        Duration::from_millis(self.plan_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Retry settings; `max-attempts: 1` means single-shot requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 1000,
        }
    }
}
