use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, warn};

use super::policy::{authorize, AuthorizedRequest, Policy};
use super::repo_types::User;
use super::session::SessionManager;
use crate::error::AppError;
use crate::state::AppState;

/// Resolves the session cookie to a live user record.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let sessions = SessionManager::from_ref(state);
        let token = sessions
            .token_from_jar(&CookieJar::from_headers(&parts.headers))
            .ok_or_else(|| AppError::unauthenticated("Authentication required"))?;

        let user_id = sessions
            .resolve(&token)
            .await?
            .ok_or_else(|| AppError::unauthenticated("Invalid or expired session"))?;

        match User::find_by_id(&state.db, user_id).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                warn!(user_id, "session refers to a missing user; destroying it");
                if let Err(e) = sessions.destroy(&token).await {
                    error!(error = ?e, user_id, "failed to destroy orphaned session");
                }
                Err(AppError::unauthenticated("User not found"))
            }
        }
    }
}

/// Authenticated user that also satisfies policy `P`.
pub struct Authorized<P: Policy>(pub AuthorizedRequest, pub PhantomData<fn() -> P>);

#[async_trait]
impl<P: Policy> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        let user_id = user.id;
        let auth = authorize(user, P::REQUIREMENTS).inspect_err(|e| {
            warn!(user_id, reason = %e, "authorization denied");
        })?;
        Ok(Authorized(auth, PhantomData))
    }
}
