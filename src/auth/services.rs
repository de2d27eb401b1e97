use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::dto::{LoginRequest, SignupRequest};
use super::password::{hash_password, verify_password};
use super::repo_types::{Role, User};
use crate::error::AppError;
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Validate a signup, hash the password off the async workers and store the user.
pub async fn register(state: &AppState, req: SignupRequest) -> Result<User, AppError> {
    let (Some(username), Some(email), Some(password)) = (
        non_empty(req.username),
        non_empty(req.email),
        non_empty(req.password),
    ) else {
        return Err(AppError::validation("All fields are required"));
    };

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let username = username.trim().to_string();
    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }

    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task")??;

    let role = if state.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };
    let user = User::create(&state.db, &username, &email, &hash, role).await?;
    info!(user_id = user.id, role = ?user.role, "user registered");
    Ok(user)
}

/// Check credentials. Unknown email and wrong password are indistinguishable.
pub async fn authenticate(state: &AppState, req: LoginRequest) -> Result<User, AppError> {
    let (Some(email), Some(password)) = (non_empty(req.email), non_empty(req.password)) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = normalize_email(&email);

    let Some(mut user) = User::find_by_email(&state.db, &email).await? else {
        warn!("login unknown email");
        return Err(AppError::unauthenticated("Invalid credentials"));
    };

    let stored = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .context("password verify task")?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::unauthenticated("Invalid credentials"));
    }

    if user.role != Role::Admin && state.config.is_admin_email(&user.email) {
        User::set_role(&state.db, user.id, Role::Admin).await?;
        user.role = Role::Admin;
        info!(user_id = user.id, "user promoted to admin");
    }

    info!(user_id = user.id, "user logged in");
    Ok(user)
}
