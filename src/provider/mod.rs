use async_trait::async_trait;

mod openai;

pub use openai::OpenAiImages;

/// Result of one successful provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    pub revised_prompt: Option<String>,
}

/// External image-generation service.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedImage>;
}
