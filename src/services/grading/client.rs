use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::core::time::primitive_now_utc;
use crate::db::models::{EssayQuestion, UsageLogEntry};
use crate::db::types::{AspectScore, ProviderErrorKind, UsageStatus};
use crate::repositories::store::GradingStore;

use super::error::GradingError;
use super::provider::{build_prompt, GradingProvider, TokenUsage};
use super::rate_limiter::RateLimiter;
use super::rubric::Rubric;

/// Delay before each attempt; its length is the attempt budget.
pub(crate) const DEFAULT_BACKOFF: [Duration; 3] =
    [Duration::ZERO, Duration::from_secs(2), Duration::from_secs(5)];

pub(crate) const USAGE_FEATURE: &str = "essay_grading";

#[derive(Debug, Clone)]
pub(crate) struct GradeRequest {
    pub(crate) question_text: String,
    pub(crate) ideal_answer: Option<String>,
    pub(crate) keywords: Option<String>,
    pub(crate) essay_text: String,
    pub(crate) rubric: Rubric,
}

impl GradeRequest {
    /// Fails with `InvalidRubric` before anything is sent anywhere.
    pub(crate) fn for_question(
        question: &EssayQuestion,
        essay_text: &str,
    ) -> Result<Self, GradingError> {
        Ok(Self {
            question_text: question.question_text.clone(),
            ideal_answer: question.ideal_answer.clone(),
            keywords: question.keywords.clone(),
            essay_text: essay_text.to_string(),
            rubric: Rubric::from_json(&question.rubric.0)?,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GradedEssay {
    pub(crate) aspect_scores: Vec<AspectScore>,
    pub(crate) feedback: String,
    pub(crate) model: String,
    pub(crate) attempts: u32,
}

#[derive(Clone)]
pub(crate) struct GradingClient {
    provider: Option<Arc<dyn GradingProvider>>,
    limiter: Arc<RateLimiter>,
    store: Arc<dyn GradingStore>,
    backoff: Vec<Duration>,
}

impl GradingClient {
    pub(crate) fn new(
        provider: Option<Arc<dyn GradingProvider>>,
        limiter: Arc<RateLimiter>,
        store: Arc<dyn GradingStore>,
    ) -> Self {
        Self { provider, limiter, store, backoff: DEFAULT_BACKOFF.to_vec() }
    }

    pub(crate) fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = backoff;
        self
    }

    pub(crate) fn model(&self) -> Option<&str> {
        self.provider.as_deref().map(|provider| provider.model())
    }

    pub(crate) async fn grade(&self, request: &GradeRequest) -> Result<GradedEssay, GradingError> {
        request.rubric.validate()?;
        let provider = self.provider.as_ref().ok_or(GradingError::ProviderUnavailable)?;
        let model = provider.model().to_string();
        let prompt = build_prompt(request);
        let timer = Instant::now();

        let mut attempts = 0u32;
        let mut last_error = None;

        for delay in &self.backoff {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            self.limiter.acquire().await;
            attempts += 1;

            let reply = match provider.complete(&prompt).await {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!(attempt = attempts, error = %err, "Grading provider call failed");
                    metrics::counter!("grading_provider_calls_total", "status" => "error")
                        .increment(1);
                    last_error = Some(err.to_string());
                    continue;
                }
            };
            metrics::counter!("grading_provider_calls_total", "status" => "success").increment(1);

            // Retrying does not fix malformed output.
            return match parse_grading_reply(&reply.content) {
                Ok((aspect_scores, feedback)) => {
                    self.record_usage(&model, UsageStatus::Success, None, reply.usage, attempts, timer)
                        .await;
                    Ok(GradedEssay { aspect_scores, feedback, model, attempts })
                }
                Err(detail) => {
                    tracing::warn!(attempt = attempts, error = %detail, "Malformed grading response");
                    self.record_usage(
                        &model,
                        UsageStatus::Error,
                        Some(ProviderErrorKind::Unknown),
                        reply.usage,
                        attempts,
                        timer,
                    )
                    .await;
                    Err(GradingError::MalformedResponse(detail))
                }
            };
        }

        let message = last_error.unwrap_or_else(|| "no attempts were made".to_string());
        let kind = ProviderErrorKind::classify(&message);
        self.record_usage(&model, UsageStatus::Error, Some(kind), TokenUsage::default(), attempts, timer)
            .await;

        Err(GradingError::CallFailed { attempts, kind, message })
    }

    async fn record_usage(
        &self,
        model: &str,
        status: UsageStatus,
        error_type: Option<ProviderErrorKind>,
        usage: TokenUsage,
        attempts: u32,
        timer: Instant,
    ) {
        let entry = UsageLogEntry {
            feature: USAGE_FEATURE,
            model: model.to_string(),
            status,
            error_type,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            latency_ms: i64::try_from(timer.elapsed().as_millis()).unwrap_or(i64::MAX),
            attempts: attempts as i32,
            created_at: primitive_now_utc(),
        };

        if let Err(err) = self.store.append_usage(&entry).await {
            tracing::warn!(error = %err, "Failed to record AI usage");
        }
    }
}

/// Extracts `(aspect scores, feedback)` from the provider's JSON reply.
pub(crate) fn parse_grading_reply(content: &str) -> Result<(Vec<AspectScore>, String), String> {
    let trimmed = strip_code_fence(content.trim());
    if trimmed.is_empty() {
        return Err("empty response".to_string());
    }

    let body: Value = serde_json::from_str(trimmed).map_err(|err| err.to_string())?;

    let items = ["aspects", "aspect_scores", "scores"]
        .iter()
        .find_map(|field| body.get(*field))
        .and_then(Value::as_array)
        .ok_or_else(|| "missing aspect score list".to_string())?;
    if items.is_empty() {
        return Err("aspect score list is empty".to_string());
    }

    let mut aspect_scores = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let name = item
            .get("aspect")
            .or_else(|| item.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| format!("aspect #{index} has no name"))?;
        let score = item
            .get("score")
            .and_then(parse_score)
            .ok_or_else(|| format!("aspect '{name}' has no integer score"))?;
        aspect_scores.push(AspectScore::new(name.trim(), score));
    }

    let feedback = body
        .get("feedback")
        .and_then(Value::as_str)
        .map(|value| value.trim().to_string())
        .unwrap_or_default();

    Ok((aspect_scores, feedback))
}

fn parse_score(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => {
            number.as_i64().or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v.round() as i64))
        }
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
