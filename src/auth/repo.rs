use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::auth::repo_types::{Role, User};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, username, email, password_hash, credits, role, created_at";

impl User {
    /// Find a user by (normalized) email. Includes the password hash.
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &SqlitePool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user. Duplicate email or username is a `Conflict`, both on
    /// the up-front check and when a concurrent insert trips the unique index.
    pub async fn create(
        db: &SqlitePool,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AppError> {
        if User::find_by_email(db, email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        if User::find_by_username(db, username).await?.is_some() {
            return Err(AppError::Conflict("Username already taken".into()));
        }

        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(db)
        .await;

        match res {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                if e.message().contains("users.email") {
                    Err(AppError::Conflict("Email already registered".into()))
                } else {
                    Err(AppError::Conflict("Username already taken".into()))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_role(db: &SqlitePool, id: i64, role: Role) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    /// Remove a user. Designs cascade, authored products keep a NULL author and
    /// outstanding sessions are destroyed the next time they are presented.
    pub async fn delete(db: &SqlitePool, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn create_applies_defaults() {
        let db = db::memory().await;
        let user = User::create(&db, "alice", "a@x.com", "hash", Role::User)
            .await
            .unwrap();
        assert_eq!(user.credits, 110);
        assert_eq!(user.role, Role::User);

        let found = User::find_by_email(&db, "a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "hash");
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_regardless_of_username() {
        let db = db::memory().await;
        User::create(&db, "alice", "a@x.com", "h", Role::User).await.unwrap();
        let err = User::create(&db, "someone-else", "a@x.com", "h", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("Email")));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let db = db::memory().await;
        User::create(&db, "alice", "a@x.com", "h", Role::User).await.unwrap();
        let err = User::create(&db, "alice", "b@x.com", "h", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("Username")));
    }

    #[tokio::test]
    async fn set_role_and_delete() {
        let db = db::memory().await;
        let user = User::create(&db, "bob", "b@x.com", "h", Role::User).await.unwrap();
        assert!(User::set_role(&db, user.id, Role::Admin).await.unwrap());
        let found = User::find_by_id(&db, user.id).await.unwrap().unwrap();
        assert_eq!(found.role, Role::Admin);

        assert!(User::delete(&db, user.id).await.unwrap());
        assert!(User::find_by_id(&db, user.id).await.unwrap().is_none());
        assert!(!User::delete(&db, user.id).await.unwrap());
    }
}
