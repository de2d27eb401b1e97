use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{GenerationResponse, PromptRequest};
use super::repo::{self, Design};
use super::services::{self, Target};
use crate::auth::dto::SuccessResponse;
use crate::auth::extractors::{Authorized, CurrentUser};
use crate::auth::policy::PaidGeneration;
use crate::error::{parse_id, AppError, AppJson};
use crate::state::AppState;

pub fn designs_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/designs", get(list_designs))
        .route("/designs/:id", put(update_design).delete(delete_design))
}

#[instrument(skip_all)]
pub async fn generate(
    State(state): State<AppState>,
    Authorized(auth, ..): Authorized<PaidGeneration>,
    AppJson(payload): AppJson<PromptRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    let out = services::run(
        &state.db,
        state.provider.as_deref(),
        &auth,
        payload.prompt.as_deref(),
        Target::New,
    )
    .await?;
    Ok(Json(GenerationResponse {
        design: out.design,
        credits_remaining: out.credits_remaining,
    }))
}

#[instrument(skip_all)]
pub async fn list_designs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Design>>, AppError> {
    Ok(Json(repo::list_by_user(&state.db, user.id).await?))
}

#[instrument(skip_all)]
pub async fn update_design(
    State(state): State<AppState>,
    Authorized(auth, ..): Authorized<PaidGeneration>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<PromptRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    let id = parse_id(&id, "Design not found")?;
    let out = services::run(
        &state.db,
        state.provider.as_deref(),
        &auth,
        payload.prompt.as_deref(),
        Target::Existing(id),
    )
    .await?;
    Ok(Json(GenerationResponse {
        design: out.design,
        credits_remaining: out.credits_remaining,
    }))
}

#[instrument(skip_all)]
pub async fn delete_design(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = parse_id(&id, "Design not found")?;
    if !repo::delete_owned(&state.db, id, user.id).await? {
        return Err(AppError::not_found("Design not found"));
    }
    info!(user_id = user.id, design_id = id, "design deleted");
    Ok(Json(SuccessResponse { success: true }))
}
