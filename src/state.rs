use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::session::SessionManager;
use crate::config::AppConfig;
use crate::db;
use crate::provider::{ImageProvider, OpenAiImages};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub provider: Option<Arc<dyn ImageProvider>>,
    pub sessions: SessionManager,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config.database_url).await?;

        let provider = match &config.provider {
            Some(cfg) => Some(Arc::new(OpenAiImages::new(cfg)?) as Arc<dyn ImageProvider>),
            None => {
                tracing::warn!("OPENAI_API_KEY not set; generation endpoints are disabled");
                None
            }
        };

        Self::from_parts(db, config, provider)
    }

    pub fn from_parts(
        db: SqlitePool,
        config: Arc<AppConfig>,
        provider: Option<Arc<dyn ImageProvider>>,
    ) -> anyhow::Result<Self> {
        let sessions = SessionManager::new(db.clone(), &config.session)?;
        Ok(Self {
            db,
            config,
            provider,
            sessions,
        })
    }
}
