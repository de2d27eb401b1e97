use std::time::Duration as StdDuration;

use anyhow::Context;
use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, CookieJar, Key, SameSite};
use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::state::AppState;

/// Minimum secret length accepted for deriving the cookie signing key.
pub const MIN_SECRET_LEN: usize = 32;

/// Issues, resolves and destroys server-side sessions.
///
/// The cookie carries only a random session id plus an HMAC tag. The
/// `sessions` row behind it is the sole authority on owner and expiry.
#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
    key: Key,
    ttl: Duration,
    cookie_name: String,
    cookie_secure: bool,
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl SessionManager {
    pub fn new(db: SqlitePool, cfg: &SessionConfig) -> anyhow::Result<Self> {
        if cfg.secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("session secret must be at least {} bytes", MIN_SECRET_LEN);
        }
        if !(1..=365).contains(&cfg.ttl_days) {
            anyhow::bail!("session ttl must be between 1 and 365 days");
        }
        let ttl = Duration::days(cfg.ttl_days);
        Ok(Self {
            db,
            key: Key::derive_from(cfg.secret.as_bytes()),
            ttl,
            cookie_name: cfg.cookie_name.clone(),
            cookie_secure: cfg.cookie_secure,
        })
    }

    /// Persist a new session for `user_id` and return its signed token.
    pub async fn create(&self, user_id: i64) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.ttl;
        let sid = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
            .bind(&sid)
            .bind(user_id)
            .bind(expires_at.unix_timestamp())
            .bind(now)
            .execute(&self.db)
            .await
            .context("insert session")?;

        debug!(user_id, "session created");
        self.sign(sid)
    }

    /// Resolve a token to its user id. Forged, expired and destroyed tokens
    /// resolve to `None`; an expired row is removed on the way out.
    pub async fn resolve(&self, token: &str) -> anyhow::Result<Option<i64>> {
        let Some(sid) = self.verify(token) else {
            debug!("session token rejected");
            return Ok(None);
        };

        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE id = ?")
                .bind(&sid)
                .fetch_optional(&self.db)
                .await
                .context("load session")?;
        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= OffsetDateTime::now_utc().unix_timestamp() {
            self.delete_row(&sid).await?;
            return Ok(None);
        }
        Ok(Some(user_id))
    }

    /// Delete the session behind `token`. Idempotent; an unverifiable token
    /// has nothing to destroy.
    pub async fn destroy(&self, token: &str) -> anyhow::Result<()> {
        if let Some(sid) = self.verify(token) {
            self.delete_row(&sid).await?;
            debug!("session destroyed");
        }
        Ok(())
    }

    pub async fn purge_expired(&self) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .execute(&self.db)
            .await
            .context("purge sessions")?;
        Ok(res.rows_affected())
    }

    async fn delete_row(&self, sid: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(sid)
            .execute(&self.db)
            .await
            .context("delete session")?;
        Ok(())
    }

    fn sign(&self, sid: String) -> anyhow::Result<String> {
        let mut jar = cookie::CookieJar::new();
        jar.signed_mut(&self.key)
            .add(Cookie::new(self.cookie_name.clone(), sid));
        jar.get(&self.cookie_name)
            .map(|c| c.value().to_string())
            .context("sign session id")
    }

    fn verify(&self, token: &str) -> Option<String> {
        cookie::CookieJar::new()
            .signed(&self.key)
            .verify(Cookie::new(self.cookie_name.clone(), token.to_string()))
            .map(|c| c.value().to_string())
    }

    /// This manager's cookie from the request jar, with RFC 6265 quotes removed.
    pub fn token_from_jar(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.cookie_name)
            .map(|c| c.value_trimmed().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Cookie delivering `token`: HttpOnly, SameSite=Lax, fixed Max-Age.
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        self.build_cookie(token, self.ttl)
    }

    /// Cookie that makes the browser drop the session.
    pub fn clearing_cookie(&self) -> Cookie<'static> {
        self.build_cookie(String::new(), Duration::ZERO)
    }

    fn build_cookie(&self, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .max_age(max_age)
            .build()
    }
}

/// Periodically delete expired session rows.
pub fn spawn_purge_task(sessions: SessionManager, every: StdDuration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(n) => info!(purged = n, "expired sessions removed"),
                Err(e) => warn!(error = ?e, "session purge failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{Role, User};
    use crate::db;
    use crate::test_support::test_config;
    use axum::http::{header, HeaderMap, HeaderValue};

    fn manager(db: &SqlitePool) -> SessionManager {
        SessionManager::new(db.clone(), &test_config().session).unwrap()
    }

    async fn user(db: &SqlitePool) -> i64 {
        User::create(db, "alice", "a@x.com", "h", Role::User)
            .await
            .unwrap()
            .id
    }

    async fn session_ids(db: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT id FROM sessions")
            .fetch_all(db)
            .await
            .unwrap()
    }

    fn jar_with(cookie: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        CookieJar::from_headers(&headers)
    }

    #[tokio::test]
    async fn create_resolve_destroy() {
        let db = db::memory().await;
        let uid = user(&db).await;
        let sessions = manager(&db);

        let token = sessions.create(uid).await.unwrap();
        assert_eq!(sessions.resolve(&token).await.unwrap(), Some(uid));

        sessions.destroy(&token).await.unwrap();
        assert_eq!(sessions.resolve(&token).await.unwrap(), None);
        // destroying twice is fine
        sessions.destroy(&token).await.unwrap();
    }

    #[tokio::test]
    async fn token_is_only_a_signed_random_id() {
        let db = db::memory().await;
        let uid = user(&db).await;
        let sessions = manager(&db);
        let token = sessions.create(uid).await.unwrap();

        let ids = session_ids(&db).await;
        assert_eq!(ids.len(), 1);
        assert!(token.ends_with(&ids[0]));
        assert!(Uuid::parse_str(&ids[0]).is_ok());
        // nothing but the MAC precedes the id
        assert_eq!(token.len(), 44 + ids[0].len());
        assert!(!token.contains('.'));
    }

    #[tokio::test]
    async fn expired_row_is_removed_on_lookup() {
        let db = db::memory().await;
        let uid = user(&db).await;
        let sessions = manager(&db);
        let token = sessions.create(uid).await.unwrap();

        sqlx::query("UPDATE sessions SET expires_at = 0")
            .execute(&db)
            .await
            .unwrap();
        assert_eq!(sessions.resolve(&token).await.unwrap(), None);
        assert!(session_ids(&db).await.is_empty());
    }

    #[tokio::test]
    async fn tampered_or_foreign_tokens_are_rejected() {
        let db = db::memory().await;
        let uid = user(&db).await;
        let sessions = manager(&db);
        let token = sessions.create(uid).await.unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('a') { 'b' } else { 'a' });
        assert_eq!(sessions.resolve(&tampered).await.unwrap(), None);

        // a bare session id without its MAC is not a token
        let sid = session_ids(&db).await.remove(0);
        assert_eq!(sessions.resolve(&sid).await.unwrap(), None);

        let mut cfg = test_config().session;
        cfg.secret = "another-secret-of-at-least-thirty-two-bytes".into();
        let other = SessionManager::new(db.clone(), &cfg).unwrap();
        assert_eq!(other.resolve(&token).await.unwrap(), None);
        assert_eq!(sessions.resolve("garbage").await.unwrap(), None);
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let db = db::memory().await;
        let uid = user(&db).await;
        let sessions = manager(&db);
        let keep = sessions.create(uid).await.unwrap();
        let gone = sessions.create(uid).await.unwrap();
        let gone_sid = session_ids(&db)
            .await
            .into_iter()
            .find(|id| gone.ends_with(id.as_str()))
            .unwrap();
        sqlx::query("UPDATE sessions SET expires_at = 0 WHERE id = ?")
            .bind(&gone_sid)
            .execute(&db)
            .await
            .unwrap();

        assert_eq!(sessions.purge_expired().await.unwrap(), 1);
        assert_eq!(sessions.resolve(&keep).await.unwrap(), Some(uid));
    }

    #[tokio::test]
    async fn quoted_cookie_value_still_resolves() {
        let db = db::memory().await;
        let uid = user(&db).await;
        let sessions = manager(&db);
        let token = sessions.create(uid).await.unwrap();

        let raw = format!("theme=dark; gella.sid=\"{}\"", token);
        let extracted = sessions.token_from_jar(&jar_with(&raw)).unwrap();
        assert_eq!(extracted, token);
        assert_eq!(sessions.resolve(&extracted).await.unwrap(), Some(uid));
    }

    #[tokio::test]
    async fn session_cookie_attributes() {
        let db = db::memory().await;
        let sessions = manager(&db);

        let set = sessions.cookie("abc".into()).to_string();
        assert!(set.starts_with("gella.sid=abc;"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("SameSite=Lax"));
        assert!(set.contains("Path=/"));
        assert!(set.contains(&format!("Max-Age={}", 7 * 24 * 60 * 60)));
        assert!(!set.contains("Secure"));

        let cleared = sessions.clearing_cookie().to_string();
        assert!(cleared.contains("Max-Age=0"));

        assert!(sessions.token_from_jar(&jar_with("gella.sid=")).is_none());
        assert!(sessions.token_from_jar(&CookieJar::new()).is_none());
    }

    #[tokio::test]
    async fn rejects_weak_secret_and_unbounded_ttl() {
        let db = db::memory().await;
        let mut cfg = test_config().session;
        cfg.secret = "short".into();
        assert!(SessionManager::new(db.clone(), &cfg).is_err());

        for days in [0, 366, i64::MAX] {
            let mut cfg = test_config().session;
            cfg.ttl_days = days;
            assert!(SessionManager::new(db.clone(), &cfg).is_err());
        }

        let mut cfg = test_config().session;
        cfg.cookie_secure = true;
        let secure = SessionManager::new(db, &cfg).unwrap();
        assert!(secure.clearing_cookie().to_string().contains("Secure"));
    }
}
