//! Extract, compliance-check, merge and action plan steps

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::PerryClient;
use crate::display::{COMPLIANCE_KEYS, EXTRACT_KEYS, MERGE_KEYS, PLAN_KEYS, StepResponse};
use crate::error::{ApiError, Operation};

/// Key under which free-text corrections are sent to the merge step
pub const CORRECTION_KEY: &str = "notes";

/// Opaque backend session identifier returned by upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Corrections payload for the merge step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corrections(Map<String, Value>);

impl Corrections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a free-text input: non-blank text goes under [`CORRECTION_KEY`], blank gives `{}`
    pub fn from_input(input: &str) -> Self {
        let mut map = Map::new();
        let text = input.trim();
        if !text.is_empty() {
            map.insert(CORRECTION_KEY.to_string(), Value::String(text.to_string()));
        }
        Self(map)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// The backend's session workflow
///
/// Implemented by [`PerryClient`]; the chat orchestrator depends only on this
/// trait so it can run against a scripted backend in tests.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Run the extraction model over the uploaded report
    async fn extract(&self, session_id: &SessionId) -> Result<StepResponse, ApiError>;

    /// Check the extracted data against the guidelines
    async fn check_compliance(&self, session_id: &SessionId) -> Result<StepResponse, ApiError>;

    /// Reconcile user corrections into the session's structured data
    async fn merge(&self, session_id: &SessionId, corrections: &Corrections) -> Result<StepResponse, ApiError>;

    /// Build the final patient action plan
    async fn generate_action_plan(&self, session_id: &SessionId) -> Result<StepResponse, ApiError>;
}

impl PerryClient {
    /// Extraction with an explicit model name
    pub async fn extract_with_model(&self, session_id: &SessionId, model: &str) -> Result<StepResponse, ApiError> {
        debug!(%session_id, %model, "extract_with_model: called");
        let url = self.url("/api/extract");
        let form = [("session_id", session_id.as_str()), ("model", model)];
        self.step(Operation::Extraction, EXTRACT_KEYS, self.config().extract_timeout(), || {
            Ok(self.http().post(&url).form(&form))
        })
        .await
    }

    /// Compliance check with an explicit model name
    pub async fn check_compliance_with_model(
        &self,
        session_id: &SessionId,
        compliance_model: &str,
    ) -> Result<StepResponse, ApiError> {
        debug!(%session_id, %compliance_model, "check_compliance_with_model: called");
        let url = self.url("/api/check-compliance");
        let form = [("session_id", session_id.as_str()), ("compliance_model", compliance_model)];
        self.step(
            Operation::ComplianceCheck,
            COMPLIANCE_KEYS,
            self.config().compliance_timeout(),
            || Ok(self.http().post(&url).form(&form)),
        )
        .await
    }

    /// Action plan generation with an explicit model name
    pub async fn generate_action_plan_with_model(
        &self,
        session_id: &SessionId,
        model: &str,
    ) -> Result<StepResponse, ApiError> {
        debug!(%session_id, %model, "generate_action_plan_with_model: called");
        let url = self.url("/api/generate-action-plan");
        let form = [("session_id", session_id.as_str()), ("model", model)];
        self.step(Operation::ActionPlan, PLAN_KEYS, self.config().plan_timeout(), || {
            Ok(self.http().post(&url).form(&form))
        })
        .await
    }
}

#[async_trait]
impl WorkflowApi for PerryClient {
    async fn extract(&self, session_id: &SessionId) -> Result<StepResponse, ApiError> {
        let model = self.config().extraction_model.clone();
        self.extract_with_model(session_id, &model).await
    }

    async fn check_compliance(&self, session_id: &SessionId) -> Result<StepResponse, ApiError> {
        let model = self.config().compliance_model.clone();
        self.check_compliance_with_model(session_id, &model).await
    }

    async fn merge(&self, session_id: &SessionId, corrections: &Corrections) -> Result<StepResponse, ApiError> {
        debug!(%session_id, correction_count = corrections.as_map().len(), "merge: called");
        let url = self.url("/api/merge");
        let body = serde_json::json!({
            "session_id": session_id,
            "corrections": corrections,
        });
        self.step(Operation::Merge, MERGE_KEYS, self.config().merge_timeout(), || {
            Ok(self.http().post(&url).json(&body))
        })
        .await
    }

    async fn generate_action_plan(&self, session_id: &SessionId) -> Result<StepResponse, ApiError> {
        let model = self.config().plan_model.clone();
        self.generate_action_plan_with_model(session_id, &model).await
    }
}
