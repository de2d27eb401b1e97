use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub credits: i64,
}
