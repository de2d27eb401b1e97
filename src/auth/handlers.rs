use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, instrument};

use super::dto::{LoginRequest, PublicUser, SignupRequest, SuccessResponse, UserEnvelope};
use super::extractors::CurrentUser;
use super::repo_types::User;
use super::services;
use crate::error::{AppError, AppJson};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

async fn start_session(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar, AppError> {
    let token = state.sessions.create(user.id).await?;
    Ok(jar.add(state.sessions.cookie(token)))
}

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = services::register(&state, payload).await?;
    let jar = start_session(&state, jar, &user).await?;
    Ok((
        StatusCode::CREATED,
        jar,
        Json(UserEnvelope {
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = services::authenticate(&state, payload).await?;
    let jar = start_session(&state, jar, &user).await?;
    Ok((
        jar,
        Json(UserEnvelope {
            user: PublicUser::from(&user),
        }),
    ))
}

/// Destroys the server-side session if there is one and clears the cookie.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = state.sessions.token_from_jar(&jar) {
        if let Err(e) = state.sessions.destroy(&token).await {
            error!(error = ?e, "logout failed");
            return Err(AppError::Internal(e.context("logout")));
        }
    }
    Ok((
        jar.add(state.sessions.clearing_cookie()),
        Json(SuccessResponse { success: true }),
    ))
}

#[instrument(skip_all)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        user: PublicUser::from(&user),
    })
}
