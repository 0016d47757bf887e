use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;

use super::client::GradeRequest;

const GRADING_SYSTEM_PROMPT: &str = r#"You are an experienced teacher grading a student's essay answer.
Score every rubric aspect with one of the integer scores listed for it, then write short,
constructive feedback addressed to the student.

Respond with strict JSON:
{
  "aspects": [{"aspect": "<aspect name exactly as given>", "score": <integer>}],
  "feedback": "<feedback for the student>"
}
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GradingPrompt {
    pub(crate) system: String,
    pub(crate) user: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TokenUsage {
    pub(crate) prompt_tokens: Option<i64>,
    pub(crate) completion_tokens: Option<i64>,
    pub(crate) total_tokens: Option<i64>,
}

#[derive(Debug, Clone)]
pub(crate) struct ProviderReply {
    pub(crate) content: String,
    pub(crate) usage: TokenUsage,
}

/// A failed provider call. The message is what error classification looks at.
#[derive(Debug, Error)]
#[error("{message}")]
pub(crate) struct ProviderError {
    message: String,
}

impl ProviderError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[async_trait]
pub(crate) trait GradingProvider: Send + Sync {
    fn model(&self) -> &str;

    /// One call, no retries.
    async fn complete(&self, prompt: &GradingPrompt) -> Result<ProviderReply, ProviderError>;
}

pub(crate) fn build_prompt(request: &GradeRequest) -> GradingPrompt {
    let mut rubric_lines = Vec::new();
    for aspect in request.rubric.aspects() {
        rubric_lines.push(format!("- {}", aspect.name));
        for (score, description) in &aspect.descriptors {
            rubric_lines.push(format!("    {score}: {description}"));
        }
    }

    let mut user = format!("Question:\n{}\n", request.question_text.trim());
    if let Some(ideal) = request.ideal_answer.as_deref().filter(|value| !value.trim().is_empty()) {
        user.push_str(&format!("\nIdeal answer:\n{}\n", ideal.trim()));
    }
    if let Some(keywords) = request.keywords.as_deref().filter(|value| !value.trim().is_empty()) {
        user.push_str(&format!("\nExpected keywords:\n{}\n", keywords.trim()));
    }
    user.push_str(&format!("\nRubric:\n{}\n", rubric_lines.join("\n")));
    user.push_str(&format!("\nStudent essay:\n{}\n", request.essay_text.trim()));

    GradingPrompt { system: GRADING_SYSTEM_PROMPT.to_string(), user }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiProvider {
    /// `None` when no API key is configured.
    pub(crate) fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let ai = settings.ai();
        if ai.openai_api_key.is_empty() {
            return Ok(None);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(ai.ai_request_timeout))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Some(Self {
            client,
            api_key: ai.openai_api_key.clone(),
            base_url: ai.openai_base_url.trim_end_matches('/').to_string(),
            model: ai.ai_model.clone(),
            max_tokens: ai.ai_max_tokens,
            temperature: ai.ai_temperature,
        }))
    }
}

#[async_trait]
impl GradingProvider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &GradingPrompt) -> Result<ProviderReply, ProviderError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(describe_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(describe_transport_error)?;
        if !status.is_success() {
            let excerpt: String = text.chars().take(500).collect();
            return Err(ProviderError::new(format!("HTTP {}: {excerpt}", status.as_u16())));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|err| ProviderError::new(format!("invalid response envelope: {err}")))?;

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        let usage = body.get("usage");
        let token = |field: &str| usage.and_then(|usage| usage.get(field)).and_then(Value::as_i64);

        Ok(ProviderReply {
            content,
            usage: TokenUsage {
                prompt_tokens: token("prompt_tokens"),
                completion_tokens: token("completion_tokens"),
                total_tokens: token("total_tokens"),
            },
        })
    }
}

fn describe_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::new(format!("request timed out: {err}"))
    } else if err.is_connect() {
        ProviderError::new(format!("connection failed: {err}"))
    } else {
        ProviderError::new(err.to_string())
    }
}
