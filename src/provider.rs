//! Content Generation Service
//!
//! The external collaborator that turns one section definition into content. The
//! orchestrator only sees the `ContentService` trait; `HttpContentService` talks to an
//! OpenAI-compatible chat completions endpoint and `StaticContentService` produces
//! deterministic placeholder content for offline runs.

use crate::catalog::SectionDefinition;
use crate::config::ProviderSettings;
use crate::error::{ApiError, ServiceError};
use crate::types::RunContext;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Output of one successful generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub display_payload: String,
    /// Absent when the service only returned display content.
    pub structured_data: Option<Value>,
}

impl GeneratedContent {
    pub fn new(display_payload: impl Into<String>, structured_data: Value) -> Self {
        Self {
            display_payload: display_payload.into(),
            structured_data: Some(structured_data),
        }
    }

    pub fn display_only(display_payload: impl Into<String>) -> Self {
        Self {
            display_payload: display_payload.into(),
            structured_data: None,
        }
    }
}

/// Content generation collaborator. Implementations must tolerate repeated calls for
/// the same section.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn generate(
        &self,
        section: &SectionDefinition,
        context: &RunContext,
    ) -> Result<GeneratedContent, ServiceError>;

    fn name(&self) -> &str;
}

/// Parse raw model output.
///
/// Accepts `{"display": "...", "data": {...}}`, `{"display": "..."}`, or any other
/// non-empty text, which is kept whole as display-only content.
pub fn parse_generated_content(raw: &str) -> Result<GeneratedContent, ServiceError> {
    let trimmed = strip_code_fence(raw.trim());
    if trimmed.is_empty() {
        return Err(ServiceError::Parse("empty response body".to_string()));
    }

    if let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(trimmed) {
        if let Some(display) = object.remove("display") {
            let display = match display {
                Value::String(text) => text,
                other => other.to_string(),
            };
            if display.trim().is_empty() {
                return Err(ServiceError::Parse("display payload is empty".to_string()));
            }
            let structured = object
                .remove("data")
                .filter(|value| !value.is_null());
            return Ok(GeneratedContent {
                display_payload: display,
                structured_data: structured,
            });
        }
    }

    Ok(GeneratedContent::display_only(raw.trim()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim).unwrap_or(text)
}

/// Classify an HTTP status into the service error taxonomy.
pub fn classify_status(status: u16, body: &str) -> ServiceError {
    match status {
        408 | 429 | 500..=599 => {
            ServiceError::Transient(format!("status {}: {}", status, body))
        }
        _ => ServiceError::Permanent {
            status,
            message: body.to_string(),
        },
    }
}

fn map_http_error(error: reqwest::Error) -> ServiceError {
    if let Some(status) = error.status() {
        classify_status(status.as_u16(), &error.to_string())
    } else if error.is_timeout() {
        ServiceError::Transient(format!("request timeout: {}", error))
    } else if error.is_connect() {
        ServiceError::Transient(format!("connection error: {}", error))
    } else if error.is_decode() {
        ServiceError::Parse(format!("failed to decode response: {}", error))
    } else {
        ServiceError::Transient(format!("http error: {}", error))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// OpenAI-compatible chat completions client.
pub struct HttpContentService {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

impl HttpContentService {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.resolve_api_key(),
            temperature: settings.temperature,
        })
    }

    fn build_messages(section: &SectionDefinition, context: &RunContext) -> Vec<ChatMessage> {
        let system = format!(
            "You write one section of a {} document. Respond with a JSON object of the form \
             {{\"display\": <markdown body>, \"data\": <object with key facts or null>}}.",
            context.document_type.replace('-', " ")
        );
        let mut user = format!(
            "Section: {}\nCategory: {}\nPriority: {}\nTarget length: about {} words.",
            section.title,
            section.category,
            section.priority.as_str(),
            section.estimated_size
        );
        if let Some(prompt) = &section.prompt {
            user.push_str("\nInstructions: ");
            user.push_str(prompt);
        }
        if let Some(requester) = &context.requester {
            user.push_str("\nPrepared for: ");
            user.push_str(requester);
        }
        for (key, value) in &context.attributes {
            user.push_str(&format!("\n{}: {}", key, value));
        }
        vec![
            ChatMessage {
                role: "system".to_string(),
                content: system,
            },
            ChatMessage {
                role: "user".to_string(),
                content: user,
            },
        ]
    }
}

#[async_trait]
impl ContentService for HttpContentService {
    async fn generate(
        &self,
        section: &SectionDefinition,
        context: &RunContext,
    ) -> Result<GeneratedContent, ServiceError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: Self::build_messages(section, context),
            temperature: self.temperature,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.endpoint);
        debug!(section_id = %section.id, url = %url, model = %self.model, "Sending generation request");
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, &body));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            ServiceError::Parse(format!("failed to parse completion envelope: {}", e))
        })?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Parse("no choices in response".to_string()))?;

        parse_generated_content(&choice.message.content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Deterministic offline content: a placeholder body and a small structured record.
#[derive(Debug, Default, Clone)]
pub struct StaticContentService;

#[async_trait]
impl ContentService for StaticContentService {
    async fn generate(
        &self,
        section: &SectionDefinition,
        context: &RunContext,
    ) -> Result<GeneratedContent, ServiceError> {
        let body = format!(
            "{} for this {} will cover the {} topics in roughly {} words.",
            section.title,
            context.document_type.replace('-', " "),
            section.category,
            section.estimated_size
        );
        Ok(GeneratedContent::new(
            body,
            serde_json::json!({
                "section": section.id,
                "category": section.category,
                "priority": section.priority.as_str(),
            }),
        ))
    }

    fn name(&self) -> &str {
        "static"
    }
}
