use std::env;
use std::time::Duration;

use geolink_core::status::canned_status;
use geolink_core::{GeneratorConfig, StatusRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::annotator::{GenerateError, TextGenerator};

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(cfg: &GeneratorConfig, api_key: String) -> Result<Self, GenerateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint: generate_endpoint(&cfg.base_url, &cfg.model),
            api_key,
        })
    }
}

fn generate_endpoint(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<PromptPart<'a>>,
}

#[derive(Serialize)]
struct PromptPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &StatusRequest) -> Result<String, GenerateError> {
        let prompt = request.prompt();
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![PromptPart { text: &prompt }],
            }],
        };
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerateError::Status(status));
        }
        let parsed: GenerateResponse = response.json().await?;
        parsed.text().ok_or(GenerateError::EmptyResponse)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CannedGenerator;

impl TextGenerator for CannedGenerator {
    async fn generate(&self, request: &StatusRequest) -> Result<String, GenerateError> {
        Ok(canned_status(request))
    }
}

pub enum Generator {
    Gemini(GeminiClient),
    Canned(CannedGenerator),
}

impl Generator {
    pub fn from_config(cfg: &GeneratorConfig) -> Result<Self, GenerateError> {
        match env::var(&cfg.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                info!(model = %cfg.model, "status lines from Gemini");
                Ok(Generator::Gemini(GeminiClient::new(cfg, key)?))
            }
            _ => {
                info!(
                    "{} not set; status lines come from the offline generator",
                    cfg.api_key_env
                );
                Ok(Generator::Canned(CannedGenerator))
            }
        }
    }
}

impl TextGenerator for Generator {
    async fn generate(&self, request: &StatusRequest) -> Result<String, GenerateError> {
        match self {
            Generator::Gemini(client) => client.generate(request).await,
            Generator::Canned(canned) => canned.generate(request).await,
        }
    }
}
