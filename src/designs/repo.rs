use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Design {
    pub id: i64,
    pub user_id: i64,
    pub prompt: String,
    pub image_url: Option<String>,
    pub explanation: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const DESIGN_COLUMNS: &str = "id, user_id, prompt, image_url, explanation, created_at";

pub async fn list_by_user(db: &SqlitePool, user_id: i64) -> anyhow::Result<Vec<Design>> {
    let rows = sqlx::query_as::<_, Design>(&format!(
        r#"
        SELECT {DESIGN_COLUMNS}
          FROM designs
         WHERE user_id = ?
         ORDER BY created_at DESC, id DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// A design only if it belongs to `user_id`; foreign and missing ids look the same.
pub async fn find_owned(db: &SqlitePool, id: i64, user_id: i64) -> anyhow::Result<Option<Design>> {
    let row = sqlx::query_as::<_, Design>(&format!(
        "SELECT {DESIGN_COLUMNS} FROM designs WHERE id = ? AND user_id = ?"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    prompt: &str,
    image_url: &str,
    explanation: &str,
) -> anyhow::Result<Design> {
    let row = sqlx::query_as::<_, Design>(&format!(
        r#"
        INSERT INTO designs (user_id, prompt, image_url, explanation, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {DESIGN_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(prompt)
    .bind(image_url)
    .bind(explanation)
    .bind(OffsetDateTime::now_utc())
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

/// Replace prompt/result/explanation in place. `None` if not owned by `user_id`.
pub async fn update_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    user_id: i64,
    prompt: &str,
    image_url: &str,
    explanation: &str,
) -> anyhow::Result<Option<Design>> {
    let row = sqlx::query_as::<_, Design>(&format!(
        r#"
        UPDATE designs
           SET prompt = ?, image_url = ?, explanation = ?
         WHERE id = ? AND user_id = ?
        RETURNING {DESIGN_COLUMNS}
        "#
    ))
    .bind(prompt)
    .bind(image_url)
    .bind(explanation)
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

/// Returns whether a row owned by `user_id` was removed.
pub async fn delete_owned(db: &SqlitePool, id: i64, user_id: i64) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM designs WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() == 1)
}
