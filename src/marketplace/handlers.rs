use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{CreateProductRequest, CreatedProductResponse};
use super::repo::{self, NewProduct, Product};
use crate::auth::extractors::Authorized;
use crate::auth::policy::Admin;
use crate::error::{parse_id, AppError, AppJson};
use crate::state::AppState;

pub fn marketplace_routes() -> Router<AppState> {
    Router::new()
        .route("/marketplace/products", get(list_products).post(create_product))
        .route("/marketplace/products/:id", get(get_product))
}

#[instrument(skip_all)]
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(repo::list(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let id = parse_id(&id, "Product not found")?;
    repo::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Product not found"))
}

#[instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    Authorized(auth, ..): Authorized<Admin>,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<CreatedProductResponse>), AppError> {
    let title = payload.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    let price = match payload.price {
        Some(p) if p.is_finite() && p >= 0.0 => p,
        Some(_) => return Err(AppError::validation("Price must be a non-negative number")),
        None => return Err(AppError::validation("Price is required")),
    };

    let product = repo::create(
        &state.db,
        NewProduct {
            title,
            description: payload.description.as_deref().unwrap_or_default(),
            price,
            image_url: payload.image_url.as_deref().unwrap_or_default(),
            author_id: auth.identity.id,
        },
    )
    .await?;

    info!(product_id = product.id, author_id = auth.identity.id, "product created");
    Ok((StatusCode::CREATED, Json(CreatedProductResponse { id: product.id })))
}
