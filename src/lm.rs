//! Chat-completion transport.
//!
//! Every model call in the pipeline goes through [`CompletionBackend`]: one
//! request, one response, no retry. [`OpenAiBackend`] speaks the
//! chat-completions wire format over a blocking HTTP agent.
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Failures of a single model call.
#[derive(Debug, Error)]
pub enum LmError {
    /// Missing or unusable credentials/configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Transport failure or non-success status from the endpoint.
    #[error("upstream error: {0}")]
    Upstream(String),
    /// The endpoint answered without usable content.
    #[error("model returned an empty response")]
    EmptyResponse,
    /// Source-to-intermediate output failed the JSON check.
    #[error("model output is not valid JSON: {0}")]
    InvalidJsonOutput(String),
}

impl LmError {
    /// Stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LmError::Configuration(_) => "configuration",
            LmError::Upstream(_) => "upstream",
            LmError::EmptyResponse => "empty-response",
            LmError::InvalidJsonOutput(_) => "invalid-json-output",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// `response_format` body field; `json_object` forces structured output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// Request body for one chat completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// System message plus one user message.
    pub fn new(model: &str, system: &str, user: String) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            response_format: None,
            temperature: None,
        }
    }

    pub fn json_mode(mut self) -> Self {
        self.response_format = Some(ResponseFormat::json_object());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn prompt_bytes(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

/// One request/response exchange with a completion endpoint.
pub trait CompletionBackend {
    /// Return the trimmed text of the first choice.
    fn complete(&self, request: &ChatRequest) -> Result<String, LmError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the first choice's content from a chat-completions response body.
pub fn parse_completion_body(body: &str) -> Result<String, LmError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|err| LmError::Upstream(format!("decode completion response: {err}")))?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        return Err(LmError::EmptyResponse);
    }
    Ok(content)
}

/// Blocking chat-completions client.
pub struct OpenAiBackend {
    agent: ureq::Agent,
    api_key: String,
    endpoint: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, base_url: &str) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }
}

impl CompletionBackend for OpenAiBackend {
    fn complete(&self, request: &ChatRequest) -> Result<String, LmError> {
        if self.api_key.trim().is_empty() {
            return Err(LmError::Configuration(
                "OpenAI API key is missing; set OPENAI_API_KEY or openai.api_key in config.yaml"
                    .to_string(),
            ));
        }

        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(request)
            .map_err(|err| LmError::Upstream(format!("request {}: {err}", self.endpoint)))?;
        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| LmError::Upstream(format!("read response body: {err}")))?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            model = %request.model,
            elapsed_ms,
            status = status.as_u16(),
            prompt_bytes = request.prompt_bytes(),
            response_bytes = body.len(),
            "lm invoke complete"
        );

        if !status.is_success() {
            return Err(LmError::Upstream(format!(
                "status {}: {}",
                status.as_u16(),
                excerpt(&body, 500)
            )));
        }
        parse_completion_body(&body)
    }
}

/// Remove one surrounding Markdown code fence, if present.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if let Some(first) = lines.first() {
        if first.trim_start().starts_with("```") {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if last.trim_start().starts_with("```") {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// First `max_chars` characters of `text`, marked when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
