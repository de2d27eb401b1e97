use serde::Serialize;

use crate::auth::repo_types::{Role, User};
use crate::error::AppError;

/// Credits charged per generate/update call.
pub const GENERATION_COST: i64 = 1;

/// A precondition a route places on the resolved user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Role(Role),
    Credits(i64),
}

/// What a request was cleared to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Session,
    Role(Role),
    Spend(i64),
}

/// Requirements a route needs beyond a live session.
pub trait Policy: Send + Sync + 'static {
    const REQUIREMENTS: &'static [Requirement];
}

/// Any signed-in user.
pub struct Member;

/// Admin role required.
pub struct Admin;

/// Enough balance for one generation.
pub struct PaidGeneration;

impl Policy for Member {
    const REQUIREMENTS: &'static [Requirement] = &[];
}

impl Policy for Admin {
    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Role(Role::Admin)];
}

impl Policy for PaidGeneration {
    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Credits(GENERATION_COST)];
}

#[derive(Debug, Clone)]
pub struct AuthorizedRequest {
    pub identity: User,
    pub granted: Vec<Scope>,
}

impl AuthorizedRequest {
    pub fn may_spend(&self, amount: i64) -> bool {
        self.granted
            .iter()
            .any(|s| matches!(s, Scope::Spend(n) if *n >= amount))
    }
}

/// Check `requirements` against an authenticated user. Role requirements are
/// evaluated before credit requirements regardless of their listed order.
pub fn authorize(identity: User, requirements: &[Requirement]) -> Result<AuthorizedRequest, AppError> {
    let mut granted = vec![Scope::Session];

    for req in requirements {
        if let Requirement::Role(role) = *req {
            if !identity.role.satisfies(role) {
                return Err(AppError::Forbidden(match role {
                    Role::Admin => "Admin access required".into(),
                    Role::User => "Access denied".into(),
                }));
            }
            granted.push(Scope::Role(role));
        }
    }

    for req in requirements {
        if let Requirement::Credits(required) = *req {
            if identity.credits < required {
                return Err(AppError::InsufficientCredits {
                    credits: identity.credits,
                    required,
                });
            }
            granted.push(Scope::Spend(required));
        }
    }

    Ok(AuthorizedRequest { identity, granted })
}
