use crate::gemini::GeminiClient;
use crate::ollama::OllamaClient;
use crate::ResponseClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::agent_api::Prompt;
use shared::settings::ModelProvider;
use tracing::warn;

pub struct ProviderRouter {
    config: ModelProvider,
}

impl ProviderRouter {
    pub fn new(config: ModelProvider) -> Self {
        Self { config }
    }

    /// Returns the name of the first provider that will be tried.
    pub fn active_provider(&self) -> Option<&str> {
        self.config.provider_preference.first().map(|s| s.as_str())
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String> {
        try_in_order(&self.config.provider_preference, |name| self.client_for(name), prompt).await
    }

    fn client_for(&self, provider: &str) -> Result<Box<dyn ResponseClient>> {
        match provider {
            "local" => Ok(Box::new(OllamaClient::new(self.config.local_model.clone()))),
            "gemini" => Ok(Box::new(GeminiClient::from_auth(
                &self.config.gemini_model,
                &self.config.gemini_auth,
            )?)),
            _ => Err(anyhow!("Unknown provider: {}", provider)),
        }
    }
}

/// Try providers in order of preference, falling back on failure.
/// Returns the first success, else the last error.
async fn try_in_order<F>(providers: &[String], mut client_for: F, prompt: &Prompt) -> Result<String>
where
    F: FnMut(&str) -> Result<Box<dyn ResponseClient>>,
{
    let mut last_error = None;

    for provider in providers {
        let result = match client_for(provider) {
            Ok(client) => client.send(prompt).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => return Ok(response),
            Err(e) => {
                warn!(provider = %provider, error = %e, "Provider failed, trying next");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("No providers configured")))
}

#[async_trait]
impl ResponseClient for ProviderRouter {
    async fn send(&self, prompt: &Prompt) -> Result<String> {
        self.generate(prompt).await
    }
}
