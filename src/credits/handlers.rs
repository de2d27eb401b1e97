use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AddCreditsRequest, CreditsResponse};
use super::repo;
use crate::auth::extractors::CurrentUser;
use crate::error::{AppError, AppJson};
use crate::state::AppState;

/// Upper bound for a single top-up.
pub const MAX_TOP_UP: i64 = 10_000;

pub fn credits_routes() -> Router<AppState> {
    Router::new()
        .route("/credits", get(get_credits))
        .route("/credits/add", post(add_credits))
}

#[instrument(skip_all)]
pub async fn get_credits(CurrentUser(user): CurrentUser) -> Json<CreditsResponse> {
    Json(CreditsResponse {
        credits: user.credits,
    })
}

#[instrument(skip_all)]
pub async fn add_credits(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<AddCreditsRequest>,
) -> Result<Json<CreditsResponse>, AppError> {
    let amount = match payload.amount {
        Some(a) if a > 0 && a <= MAX_TOP_UP => a,
        _ => return Err(AppError::validation("Invalid amount")),
    };

    let credits = repo::credit(&state.db, user.id, amount)
        .await?
        .ok_or_else(|| AppError::unauthenticated("User not found"))?;
    info!(user_id = user.id, amount, credits, "credits added");
    Ok(Json(CreditsResponse { credits }))
}
