use serde::Deserialize;

use crate::auth::session::MIN_SECRET_LEN;

const DEV_SESSION_SECRET: &str = "gella-dev-secret-change-in-production";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_days: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub size: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub allowed_origin: String,
    pub session: SessionConfig,
    /// `None` when no API key is configured; generation then answers 500.
    pub provider: Option<ProviderConfig>,
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://gella.db".into());

        let secret = match std::env::var("SESSION_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ if cfg!(debug_assertions) => {
                tracing::warn!("SESSION_SECRET not set; using development secret");
                DEV_SESSION_SECRET.into()
            }
            _ => anyhow::bail!("SESSION_SECRET must be set"),
        };
        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("SESSION_SECRET must be at least {} bytes", MIN_SECRET_LEN);
        }
        let session = SessionConfig {
            secret,
            ttl_days: session_ttl_days(std::env::var("SESSION_TTL_DAYS").ok().as_deref())?,
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "gella.sid".into()),
            cookie_secure: env_parse("SESSION_COOKIE_SECURE").unwrap_or(false),
        };

        let provider = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(|api_key| ProviderConfig {
                api_key,
                base_url: std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
                model: std::env::var("OPENAI_IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".into()),
                size: std::env::var("OPENAI_IMAGE_SIZE").unwrap_or_else(|_| "1024x1024".into()),
                timeout_secs: env_parse("PROVIDER_TIMEOUT_SECS").unwrap_or(60),
            });

        let port = env_parse("APP_PORT")
            .or_else(|| env_parse("PORT"))
            .unwrap_or(3001);

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            allowed_origin: std::env::var("ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5174".into()),
            session,
            provider,
            admin_emails: parse_admin_emails(&std::env::var("ADMIN_EMAILS").unwrap_or_default()),
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e == email)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Session lifetime in days: 7 when unset, otherwise 1..=365.
fn session_ttl_days(raw: Option<&str>) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(7);
    };
    match raw.trim().parse::<i64>() {
        Ok(days) if (1..=365).contains(&days) => Ok(days),
        _ => anyhow::bail!("SESSION_TTL_DAYS must be a whole number between 1 and 365, got {:?}", raw),
    }
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
