use serde::{Deserialize, Serialize};

use super::repo::Design;

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: Option<String>,
}

/// A generated or regenerated design with the caller's remaining balance.
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    #[serde(flatten)]
    pub design: Design,
    pub credits_remaining: i64,
}
