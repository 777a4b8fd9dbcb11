use crate::error::{DdiError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// One text-completion call: role-tagged messages plus sampling limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Black-box text-completion service
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &str;

    async fn complete(&self, request: &NarrativeRequest) -> Result<String>;
}

/// Chat-completions client for OpenAI-compatible endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn request_body(&self, request: &NarrativeRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TextCompletion for OpenAiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &NarrativeRequest) -> Result<String> {
        let body = self.request_body(request);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DdiError::TransientProvider(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DdiError::TransientProvider(format!("Failed to read LLM response: {}", e)))?;

        if !status.is_success() {
            // Gateways in front of the provider may answer with non-JSON bodies
            let response_json = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
            return Err(classify_failure(status, &response_json));
        }

        let response_json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| DdiError::Llm(format!("Failed to parse LLM response: {}", e)))?;
        parse_completion(&response_json)
    }
}

/// Map an unsuccessful HTTP response onto the provider failure taxonomy.
pub(crate) fn classify_failure(status: StatusCode, body: &serde_json::Value) -> DdiError {
    let message = body["error"]["message"]
        .as_str()
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("HTTP {}", status));
    let code = body["error"]["code"].as_str().unwrap_or_default();

    warn!("LLM provider returned {}: {}", status, message);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DdiError::Auth(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            DdiError::TransientProvider(message)
        }
        s if s.is_server_error() => DdiError::TransientProvider(message),
        StatusCode::BAD_REQUEST
            if code == "content_policy_violation"
                || code == "content_filter"
                || message.to_lowercase().contains("content policy")
                || message.to_lowercase().contains("content management policy") =>
        {
            DdiError::ContentPolicy(message)
        }
        _ => DdiError::Llm(message),
    }
}

/// Extract the generated text from a successful chat-completions body.
pub(crate) fn parse_completion(body: &serde_json::Value) -> Result<String> {
    let choice = &body["choices"][0];

    if choice["finish_reason"].as_str() == Some("content_filter") {
        return Err(DdiError::ContentPolicy(
            "Completion was withheld by the provider content filter".to_string(),
        ));
    }

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| DdiError::Llm("No content in LLM response".to_string()))?;

    debug!("LLM returned {} characters", content.len());
    Ok(content.to_string())
}
