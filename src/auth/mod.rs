use crate::state::AppState;
use axum::Router;

pub(crate) mod dto;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod policy;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod session;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
