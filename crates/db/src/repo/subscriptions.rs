use sqlx::SqlitePool;

/// Subscribe an actor for feed refreshes. Idempotent; returns whether the
/// subscription was newly created.
pub async fn subscribe(pool: &SqlitePool, actor_name: &str) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result =
        sqlx::query("INSERT OR IGNORE INTO subscription (actor_name, created_ts) VALUES (?, ?)")
            .bind(actor_name)
            .bind(now)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn unsubscribe(pool: &SqlitePool, actor_name: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM subscription WHERE actor_name = ?")
        .bind(actor_name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT actor_name FROM subscription ORDER BY actor_name")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(n,)| n).collect())
}
