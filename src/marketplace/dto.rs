use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedProductResponse {
    pub id: i64,
}
