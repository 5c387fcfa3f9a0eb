use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct FeedEntryRow {
    pub id: String,
    pub actor_name: String,
    pub title: String,
    pub published_at: String,
    pub seen: bool,
    pub created_ts: i64,
}

/// Parse a feed timestamp into epoch seconds for ordering. RSS `pubDate`
/// is RFC 2822; some sources emit RFC 3339 instead. An unparseable stamp
/// falls back to insertion time so the entry still sorts near its arrival.
fn published_ts(published_at: &str, fallback: i64) -> i64 {
    chrono::DateTime::parse_from_rfc2822(published_at)
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(published_at))
        .map(|dt| dt.timestamp())
        .unwrap_or(fallback)
}

/// Insert a feed entry unless an identical one is already recorded.
/// Dedup key is (actor_name, title, published_at). Returns whether a new
/// row was written.
pub async fn insert_entry(
    pool: &SqlitePool,
    actor_name: &str,
    title: &str,
    published_at: &str,
) -> Result<bool, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        "INSERT OR IGNORE INTO feed_entry \
         (id, actor_name, title, published_at, published_ts, seen, created_ts) \
         VALUES (?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(actor_name)
    .bind(title)
    .bind(published_at)
    .bind(published_ts(published_at, now))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// List entries newest first, by the parsed publication time.
pub async fn list_entries(
    pool: &SqlitePool,
    unseen_only: bool,
    limit: i64,
) -> Result<Vec<FeedEntryRow>, sqlx::Error> {
    let base = "SELECT id, actor_name, title, published_at, seen, created_ts FROM feed_entry";
    let sql = if unseen_only {
        format!("{base} WHERE seen = 0 ORDER BY published_ts DESC, created_ts DESC LIMIT ?")
    } else {
        format!("{base} ORDER BY published_ts DESC, created_ts DESC LIMIT ?")
    };

    let rows: Vec<(String, String, String, String, i64, i64)> =
        sqlx::query_as(&sql).bind(limit).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|r| FeedEntryRow {
            id: r.0,
            actor_name: r.1,
            title: r.2,
            published_at: r.3,
            seen: r.4 != 0,
            created_ts: r.5,
        })
        .collect())
}

/// Mark an entry seen. Returns false when the id is unknown.
pub async fn mark_seen(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE feed_entry SET seen = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
