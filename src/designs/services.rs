use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use super::repo::{self, Design};
use crate::auth::policy::{AuthorizedRequest, GENERATION_COST};
use crate::credits;
use crate::error::AppError;
use crate::provider::ImageProvider;

pub const GENERATED_EXPLANATION: &str = "Generated design based on your prompt.";
pub const UPDATED_EXPLANATION: &str = "Design updated with new prompt.";

/// Progress of one generation. Failures can exit from any stage; only
/// `Complete` has touched the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authorized,
    CallingProvider,
    Persisting,
    DecrementingLedger,
    Complete,
}

/// What a generation writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    New,
    Existing(i64),
}

#[derive(Debug)]
pub struct Generation {
    pub design: Design,
    pub credits_remaining: i64,
}

pub fn validate_prompt(prompt: Option<&str>) -> Result<&str, AppError> {
    match prompt.map(str::trim) {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(AppError::validation("Prompt is required")),
    }
}

/// Run one paid generation: call the provider, then write the design and
/// charge `GENERATION_COST` in a single transaction. A provider failure
/// leaves both the design and the balance untouched.
pub async fn run(
    db: &SqlitePool,
    provider: Option<&dyn ImageProvider>,
    auth: &AuthorizedRequest,
    prompt: Option<&str>,
    target: Target,
) -> Result<Generation, AppError> {
    let user = &auth.identity;
    let mut stage = Stage::Authorized;

    if !auth.may_spend(GENERATION_COST) {
        return Err(AppError::InsufficientCredits {
            credits: user.credits,
            required: GENERATION_COST,
        });
    }
    let prompt = validate_prompt(prompt)?;

    if let Target::Existing(id) = target {
        if repo::find_owned(db, id, user.id).await?.is_none() {
            return Err(AppError::not_found("Design not found"));
        }
    }

    let Some(provider) = provider else {
        error!(user_id = user.id, "image provider not configured");
        return Err(AppError::Upstream("Image generation is not configured".into()));
    };

    advance(&mut stage, Stage::CallingProvider, user.id);
    let image = provider.generate(prompt).await.map_err(|e| {
        error!(error = ?e, user_id = user.id, ?stage, "provider call failed");
        AppError::Upstream("Failed to generate design".into())
    })?;

    debug!(user_id = user.id, revised_prompt = ?image.revised_prompt, "provider returned image");
    advance(&mut stage, Stage::Persisting, user.id);
    let mut tx = db.begin().await?;
    let design = match target {
        Target::New => {
            repo::insert_tx(&mut tx, user.id, prompt, &image.url, GENERATED_EXPLANATION).await?
        }
        Target::Existing(id) => {
            match repo::update_tx(&mut tx, id, user.id, prompt, &image.url, UPDATED_EXPLANATION)
                .await?
            {
                Some(d) => d,
                None => {
                    tx.rollback().await?;
                    return Err(AppError::not_found("Design not found"));
                }
            }
        }
    };

    advance(&mut stage, Stage::DecrementingLedger, user.id);
    let Some(credits_remaining) = credits::repo::debit_tx(&mut tx, user.id, GENERATION_COST).await?
    else {
        tx.rollback().await?;
        let credits = credits::repo::balance(db, user.id).await?.unwrap_or(0);
        warn!(user_id = user.id, credits, "balance spent by a concurrent request");
        return Err(AppError::InsufficientCredits {
            credits,
            required: GENERATION_COST,
        });
    };
    tx.commit().await?;

    advance(&mut stage, Stage::Complete, user.id);
    info!(user_id = user.id, design_id = design.id, credits_remaining, "design generated");
    Ok(Generation {
        design,
        credits_remaining,
    })
}

fn advance(stage: &mut Stage, next: Stage, user_id: i64) {
    debug!(user_id, from = ?stage, to = ?next, "generation stage");
    *stage = next;
}
