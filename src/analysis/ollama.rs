//! Ollama generate client
//!
//! Sends one non-streaming `POST /api/generate` per analysis and expects the
//! model to answer with a bare JSON object.

use crate::analysis::error::AnalysisError;
use crate::analysis::{AnalysisRequest, GeneratedAnalysis, Generator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Recent points included in the prompt
const PROMPT_POINTS: usize = 200;

/// Configuration for the Ollama client
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL (e.g., "http://localhost:11434")
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2:latest".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Generative analysis over a local Ollama server
pub struct OllamaGenerator {
    client: Client,
    config: OllamaConfig,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: OllamaConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("precedent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

/// Build the analysis prompt
pub fn build_prompt(request: &AnalysisRequest) -> String {
    let start = request.recent_points.len().saturating_sub(PROMPT_POINTS);
    let points: Vec<_> = request.recent_points[start..]
        .iter()
        .map(|p| json!({"ts": p.timestamp, "val": p.value}))
        .collect();

    let points = serde_json::to_string(&points).unwrap_or_else(|_| "[]".to_string());
    let context = serde_json::to_string(&request.context).unwrap_or_else(|_| "[]".to_string());

    format!(
        "You are an SRE alert analysis assistant. Detect anomalies, predict the trend \
         and infer the likely root cause from Prometheus metrics.\n\
         Metric: {metric}\n\
         Environment: {env}\n\
         Service: {service}\n\
         Recent points (JSON): {points}\n\
         Similar historical segments (JSON): {context}\n\
         Answer with a JSON object, concise and to the point:\n\
         \x20 - thought: string, brief reasoning.\n\
         \x20 - title: string, short alert title.\n\
         \x20 - current_status: string, the current value and state only.\n\
         \x20 - level: string, one of 'high', 'medium', 'low', 'normal'.\n\
         \x20 - prediction: string, the forecast conclusion.\n\
         \x20 - prediction_points: array, the next 5 points as [[ts, val], ...].\n\
         \x20 - analysis: string, the core cause analysis. Do not list raw data points.\n\
         \x20 - action: string, the key recommendation.\n\
         Do not wrap the answer in a Markdown code block; return the JSON directly.",
        metric = request.metric_name,
        env = request.env.env,
        service = request.env.service,
        points = points,
        context = context,
    )
}

/// Remove a surrounding ```json ... ``` fence if the model added one
pub fn strip_code_fences(text: &str) -> &str {
    let mut clean = text.trim();
    if let Some(rest) = clean.strip_prefix("```json") {
        clean = rest;
    } else if let Some(rest) = clean.strip_prefix("```") {
        clean = rest;
    }
    if let Some(rest) = clean.strip_suffix("```") {
        clean = rest;
    }
    clean.trim()
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.config.base_url
    }

    async fn generate(&self, request: &AnalysisRequest) -> Result<GeneratedAnalysis, AnalysisError> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let body = GenerateRequest {
            model: &self.config.model,
            prompt: build_prompt(request),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::from_transport(&self.config.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let generated: GenerateResponse = response.json().await?;
        let clean = strip_code_fences(&generated.response);

        serde_json::from_str(clean).map_err(|e| {
            tracing::debug!(
                model = %self.config.model,
                response = %generated.response,
                "Model answer is not valid JSON"
            );
            AnalysisError::InvalidResponse(e.to_string())
        })
    }
}
