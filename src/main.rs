use std::time::Duration;

mod app;
mod auth;
mod config;
mod credits;
mod db;
mod designs;
mod error;
mod marketplace;
mod provider;
mod state;
#[cfg(test)]
mod test_support;

use crate::auth::session::spawn_purge_task;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "gella=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;
    db::migrate(&app_state.db).await?;

    let sessions = app_state.sessions.clone();
    match sessions.purge_expired().await {
        Ok(n) => tracing::info!(purged = n, "expired sessions removed at startup"),
        Err(e) => tracing::warn!(error = ?e, "startup session purge failed"),
    }
    spawn_purge_task(sessions, SESSION_PURGE_INTERVAL);

    let host = app_state.config.host.clone();
    let port = app_state.config.port;
    let app = app::build_app(app_state);
    app::serve(app, &host, port).await
}
