//! Gemini `generateContent` judgment engine

use crate::config::JudgeConfig;
use crate::error::AssessError;
use crate::judge::engine::{JudgmentEngine, JudgmentRequest};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Gemini API client
pub struct GeminiJudge {
    api_key: String,
    base_url: String,
    model: String,
    http_client: Client,
}

impl GeminiJudge {
    pub fn new(api_key: String, model: impl Into<String>, timeout: Duration) -> Result<Self, AssessError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssessError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: model.into(),
            http_client,
        })
    }

    /// Build from configuration, reading the key from `api_key_env`
    pub fn from_config(config: &JudgeConfig) -> Result<Self, AssessError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| AssessError::Config(format!("{} not set", config.api_key_env)))?;
        Ok(Self::new(
            api_key,
            config.model.clone(),
            Duration::from_millis(config.timeout_ms),
        )?
        .with_base_url(config.base_url.clone()))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn request_body(request: &JudgmentRequest) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![RequestPart {
                text: &request.prompt,
            }],
        }],
        generation_config: GenerationConfig {
            temperature: request.policy.temperature,
            top_p: request.policy.top_p,
            max_output_tokens: request.policy.max_output_tokens,
        },
    }
}

fn response_text(response: GenerateResponse) -> Result<String, AssessError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AssessError::JudgmentEngine("No candidates in response".to_string()))?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(AssessError::JudgmentEngine("Empty candidate in response".to_string()));
    }
    Ok(text)
}

impl JudgmentEngine for GeminiJudge {
    fn judge(&self, request: &JudgmentRequest) -> Result<String, AssessError> {
        let start = Instant::now();
        let response = self
            .http_client
            .post(self.endpoint(&request.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(request))
            .send()
            .map_err(|e| AssessError::JudgmentEngine(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = match serde_json::from_str::<GeminiError>(&body) {
                Ok(error) => error.error.message,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };
            return Err(AssessError::JudgmentEngine(format!(
                "Gemini API error ({}): {}",
                status.as_u16(),
                message
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| AssessError::JudgmentEngine(format!("Invalid Gemini response: {e}")))?;
        tracing::debug!(
            model = %request.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "judgment received"
        );
        response_text(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_carries_policy() {
        let request = JudgmentRequest::new("rate this", "gemini-2.0-flash");
        let body = serde_json::to_value(request_body(&request)).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "rate this");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert!((body["generationConfig"]["topP"].as_f64().unwrap() - 0.95).abs() < 1e-6);
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"score\":"}, {"text": " 3}"}]}}]
        }))
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "{\"score\": 3}");
    }

    #[test]
    fn test_no_candidates_is_engine_error() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            response_text(response),
            Err(AssessError::JudgmentEngine(_))
        ));
    }

    #[test]
    fn test_endpoint_uses_model() {
        let judge = GeminiJudge::new("k".into(), "m", Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://localhost:9/");
        assert_eq!(
            judge.endpoint("gemini-2.0-flash"),
            "http://localhost:9/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
