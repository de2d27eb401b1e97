use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GeneratedImage, ImageProvider};
use crate::config::ProviderConfig;

/// OpenAI-compatible `/images/generations` client.
#[derive(Clone)]
pub struct OpenAiImages {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    size: String,
}

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
    revised_prompt: Option<String>,
}

impl OpenAiImages {
    pub fn new(cfg: &ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build provider http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/images/generations", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            size: cfg.size.clone(),
        })
    }
}

#[async_trait]
impl ImageProvider for OpenAiImages {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedImage> {
        let body = ImagesRequest {
            model: &self.model,
            prompt,
            size: &self.size,
            n: 1,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("images request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, body = %text, "provider returned error status");
            anyhow::bail!("provider returned {}", status);
        }

        let parsed: ImagesResponse = resp.json().await.context("decode images response")?;
        let first = parsed
            .data
            .into_iter()
            .next()
            .context("provider returned no images")?;
        let url = first.url.context("provider image has no url")?;
        debug!(model = %self.model, "image generated");
        Ok(GeneratedImage {
            url,
            revised_prompt: first.revised_prompt,
        })
    }
}
