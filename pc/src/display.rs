//! Loosely-typed workflow step responses
//!
//! The extract, compliance, merge and action plan endpoints have no stable
//! schema. Each response is kept verbatim and reduced to a display string by
//! probing an ordered list of candidate keys; the first present, non-empty
//! key wins. This is a heuristic and should give way to typed responses once
//! the backend contract settles.

use serde_json::{Map, Value};
use tracing::debug;

/// Candidate keys probed for the extraction response
pub const EXTRACT_KEYS: &[&str] = &["result", "message", "text", "content", "summary", "data"];

/// Candidate keys probed for the compliance response
pub const COMPLIANCE_KEYS: &[&str] = &["result", "message", "text", "content", "summary", "compliance"];

/// Candidate keys probed for the merge response
pub const MERGE_KEYS: &[&str] = &["result", "message", "text", "content", "summary", "data"];

/// Candidate keys probed for the action plan response
pub const PLAN_KEYS: &[&str] = &["result", "message", "text", "content", "summary", "action_plan"];

/// A workflow step response: raw body, parsed object (if any) and display text
#[derive(Debug, Clone, PartialEq)]
pub struct StepResponse {
    pub raw_body: String,
    pub parsed_json: Option<Map<String, Value>>,
    pub display_text: String,
}

impl StepResponse {
    /// Parse a response body, probing `keys` in order for the display text
    pub fn parse(raw_body: impl Into<String>, keys: &[&str]) -> Self {
        let raw_body = raw_body.into();
        let parsed_json = match serde_json::from_str::<Value>(&raw_body) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) | Err(_) => None,
        };

        let display_text = match &parsed_json {
            Some(map) => probe_display_text(map, keys).unwrap_or_default(),
            None => {
                debug!("StepResponse::parse: body is not a JSON object, using raw body");
                raw_body.clone()
            }
        };

        Self {
            raw_body,
            parsed_json,
            display_text,
        }
    }

    /// Text shown to the user: display text, else the parsed JSON, else the raw body
    pub fn message_text(&self) -> String {
        if !self.display_text.trim().is_empty() {
            return self.display_text.clone();
        }
        if let Some(map) = self.parsed_json.as_ref().filter(|m| !m.is_empty()) {
            if let Ok(pretty) = serde_json::to_string_pretty(map) {
                return pretty;
            }
        }
        self.raw_body.clone()
    }
}

/// Return the rendering of the first present, non-empty candidate key
pub fn probe_display_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let rendered = map.get(*key).and_then(render_value);
        if rendered.is_some() {
            debug!(%key, "probe_display_text: matched");
        }
        rendered
    })
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(items.iter().map(stringify).collect::<Vec<_>>().join("\n")),
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
