use crate::ResponseClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::Prompt;
use shared::settings::ProviderAuth;
use std::env;
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    Image { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

pub struct GeminiClient {
    http: Client,
    auth_token: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn from_auth(model: &str, auth: &ProviderAuth) -> Result<Self> {
        let auth_token = match &auth.api_key {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            // Try environment variable as fallback
            _ => env::var("GEMINI_API_KEY")
                .map_err(|_| anyhow!("No Gemini authentication configured (set GEMINI_API_KEY)"))?,
        };

        Ok(Self {
            http: Client::builder().timeout(Duration::from_secs(45)).build()?,
            auth_token,
            model: model.to_string(),
            base_url: API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let req = build_request(prompt);
        debug!(model = %self.model, with_image = prompt.image.is_some(), "Sending Gemini request");

        // The key travels in a header and transport errors drop the URL, so
        // neither can end up in an error message
        let resp = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.auth_token)
            .json(&req)
            .send()
            .await
            .map_err(|e| anyhow!("gemini request failed: {}", e.without_url()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let body = body.trim();
            if body.is_empty() {
                return Err(anyhow!("gemini error: {}", status));
            }
            let body = if body.len() > 800 {
                let cut = (0..=800).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
                format!("{}...", &body[..cut])
            } else {
                body.to_string()
            };
            return Err(anyhow!("gemini error: {}\n{}", status, body));
        }
        let body: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| anyhow!("gemini error: malformed response ({})", e.without_url()))?;
        extract_text(body)
    }
}

#[async_trait]
impl ResponseClient for GeminiClient {
    async fn send(&self, prompt: &Prompt) -> Result<String> {
        self.generate(prompt).await
    }
}

fn build_request(prompt: &Prompt) -> GeminiRequest {
    let mut parts = Vec::new();
    if !prompt.text.is_empty() {
        parts.push(GeminiPart::Text {
            text: prompt.text.clone(),
        });
    }
    if let Some(image) = &prompt.image {
        parts.push(GeminiPart::Image {
            inline_data: GeminiInlineData {
                mime_type: image.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            },
        });
    }
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts,
        }],
    }
}

fn extract_text(body: GeminiResponse) -> Result<String> {
    let text: String = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(anyhow!("gemini error: malformed response (no candidate text)"));
    }
    Ok(text)
}
