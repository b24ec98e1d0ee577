use crate::ResponseClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::Prompt;
use std::env;
use std::sync::LazyLock;
use std::time::Duration;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

pub struct OllamaClient {
    http: Client,
    base: String,
    model: String,
}

impl OllamaClient {
    pub fn new(model: String) -> Self {
        let base =
            env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
        Self {
            http: SHARED_HTTP.clone(),
            base: base.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/api/generate", self.base);
        let req = build_request(&self.model, prompt);
        let resp = self.http.post(url).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("ollama error: {}", resp.status()));
        }
        let body: OllamaGenerateResponse = resp.json().await?;
        Ok(body.response)
    }
}

#[async_trait]
impl ResponseClient for OllamaClient {
    async fn send(&self, prompt: &Prompt) -> Result<String> {
        self.generate(prompt).await
    }
}

fn build_request<'a>(model: &'a str, prompt: &'a Prompt) -> OllamaGenerateRequest<'a> {
    OllamaGenerateRequest {
        model,
        prompt: &prompt.text,
        images: prompt
            .image
            .iter()
            .map(|img| base64::engine::general_purpose::STANDARD.encode(&img.bytes))
            .collect(),
        stream: false,
    }
}
