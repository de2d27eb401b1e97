use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub image_url: String,
    /// `None` once the authoring user has been deleted.
    pub author_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub struct NewProduct<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub price: f64,
    pub image_url: &'a str,
    pub author_id: i64,
}

const PRODUCT_COLUMNS: &str = "id, title, description, price, image_url, author_id, created_at";

pub async fn create(db: &SqlitePool, p: NewProduct<'_>) -> anyhow::Result<Product> {
    let row = sqlx::query_as::<_, Product>(&format!(
        r#"
        INSERT INTO products (title, description, price, image_url, author_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(p.title)
    .bind(p.description)
    .bind(p.price)
    .bind(p.image_url)
    .bind(p.author_id)
    .bind(OffsetDateTime::now_utc())
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn list(db: &SqlitePool) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find(db: &SqlitePool, id: i64) -> anyhow::Result<Option<Product>> {
    let row = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{Role, User};
    use crate::db;

    fn lamp(author_id: i64) -> NewProduct<'static> {
        NewProduct {
            title: "Lamp",
            description: "A lamp",
            price: 19.99,
            image_url: "https://img/lamp.png",
            author_id,
        }
    }

    #[tokio::test]
    async fn create_list_find() {
        let db = db::memory().await;
        let admin = User::create(&db, "root", "r@x.com", "h", Role::Admin).await.unwrap();
        let a = create(&db, lamp(admin.id)).await.unwrap();
        let b = create(&db, lamp(admin.id)).await.unwrap();

        let ids: Vec<i64> = list(&db).await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        let found = find(&db, a.id).await.unwrap().unwrap();
        assert_eq!(found.price, 19.99);
        assert_eq!(found.author_id, Some(admin.id));
        assert!(find(&db, 9_999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn products_outlive_their_author() {
        let db = db::memory().await;
        let admin = User::create(&db, "root", "r@x.com", "h", Role::Admin).await.unwrap();
        let p = create(&db, lamp(admin.id)).await.unwrap();

        User::delete(&db, admin.id).await.unwrap();
        let orphan = find(&db, p.id).await.unwrap().unwrap();
        assert_eq!(orphan.author_id, None);
    }
}
