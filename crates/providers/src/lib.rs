//! Response clients - the remote generative-language services a prompt is sent to.

pub mod gemini;
pub mod ollama;
pub mod router;

use anyhow::Result;
use async_trait::async_trait;
use shared::agent_api::Prompt;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use router::ProviderRouter;

/// Opaque request/response collaborator: one prompt in, one reply out.
///
/// Implementations are driven from a background thread and may block it for
/// as long as the remote service takes.
#[async_trait]
pub trait ResponseClient: Send + Sync {
    async fn send(&self, prompt: &Prompt) -> Result<String>;
}
