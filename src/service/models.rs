//! Wire types for the generation service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /generate` and `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateRequest {
    pub prompt: String,
}

/// The STOK breakdown of an enhanced prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StructuredPrompt {
    pub situation: String,
    pub task: String,
    pub objective: String,
    pub knowledge: String,
}

/// Successful response of `POST /generate`.
///
/// The schema is owned by the service, so every modeled field is optional on
/// the wire and only a non-object body is rejected. Fields we do not model
/// are kept in `extra` so a result written to history comes back equivalent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationResult {
    pub original_prompt: String,
    pub enhanced_prompt: String,
    pub intent: String,
    pub suggestions: Vec<String>,
    pub structured_prompt: StructuredPrompt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_vague: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Failure body. FastAPI puts a human-readable message in `detail`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// The detail message, if it is a plain string.
    ///
    /// Validation errors carry a structured `detail` array; those are not
    /// useful verbatim, so they are ignored.
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

/// One finding from the prompt analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub details: String,
}

/// Quality scores for a prompt, 0-100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub overall_score: i64,
    pub clarity_score: i64,
    pub specificity_score: i64,
    pub structure_score: i64,
    pub completeness_score: i64,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, i64>,
}

/// Successful response of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzeResponse {
    pub analysis: Analysis,
    pub optimized_prompt: String,
}
