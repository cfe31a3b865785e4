pub mod schema;
pub mod llm;
pub mod prompt;

pub use schema::{PatientInfo, StructuredReport, TestResult};
pub use llm::{ChatCompletionClient, CompletionService};

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("No API key configured for the structuring service")]
    MissingApiKey,

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Structuring service returned error (status {status}): {body}")]
    ApiStatus { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}

impl StructuringError {
    /// Failures raised by the remote API itself rather than by its payload.
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            Self::ApiStatus { .. } | Self::HttpClient(_) | Self::MissingApiKey
        )
    }
}

/// Turns raw document text into structured reports through an injected
/// completion service.
#[derive(Clone)]
pub struct Extractor {
    service: Arc<dyn CompletionService>,
}

impl Extractor {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Structure one document's text. One document may yield several reports.
    pub async fn structure(&self, text: &str) -> Result<Vec<StructuredReport>, StructuringError> {
        let user_prompt = prompt::build_report_prompt(text);

        let content = self
            .service
            .complete(prompt::SYSTEM_PROMPT, &user_prompt)
            .await?;

        let reports = parse_report_payload(&content)?;
        debug!(reports = reports.len(), "Structured document");

        Ok(reports)
    }
}

/// Accepts either a single report object or an array of them.
pub fn parse_report_payload(content: &str) -> Result<Vec<StructuredReport>, StructuringError> {
    let value: Value = serde_json::from_str(content.trim())
        .map_err(|e| StructuringError::JsonParsing(e.to_string()))?;

    let items = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items,
        other => {
            return Err(StructuringError::JsonParsing(format!(
                "expected a report object or array, got {}",
                type_name(&other)
            )));
        }
    };

    items
        .into_iter()
        .map(|item| {
            if !item.is_object() {
                return Err(StructuringError::JsonParsing(format!(
                    "expected a report object, got {}",
                    type_name(&item)
                )));
            }
            StructuredReport::from_value(item)
                .map_err(|e| StructuringError::JsonParsing(e.to_string()))
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
