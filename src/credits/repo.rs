use sqlx::{Sqlite, SqlitePool, Transaction};

/// Current balance, `None` if the user does not exist.
pub async fn balance(db: &SqlitePool, user_id: i64) -> anyhow::Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT credits FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|(c,)| c))
}

/// Atomically add `amount` and return the new balance.
pub async fn credit(db: &SqlitePool, user_id: i64, amount: i64) -> anyhow::Result<Option<i64>> {
    let row: Option<(i64,)> =
        sqlx::query_as("UPDATE users SET credits = credits + ? WHERE id = ? RETURNING credits")
            .bind(amount)
            .bind(user_id)
            .fetch_optional(db)
            .await?;
    Ok(row.map(|(c,)| c))
}

/// Conditionally subtract `amount` inside `tx`. Returns the new balance, or
/// `None` when the balance is below `amount` and nothing was changed.
pub async fn debit_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    amount: i64,
) -> anyhow::Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE users
           SET credits = credits - ?
         WHERE id = ? AND credits >= ?
        RETURNING credits
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|(c,)| c))
}
