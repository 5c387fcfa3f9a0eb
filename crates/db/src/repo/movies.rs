use cineshelf_core::types::{ActorRef, RatingState};
use sqlx::SqlitePool;

use crate::DbError;

/// A movie row keyed by its canonical catalog code.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRow {
    pub code: String,
    pub title: String,
    pub year: Option<i64>,
    pub actors: Vec<ActorRef>,
    pub date_added: Option<String>,
    pub external_id: Option<String>,
    pub rating: Option<f64>,
    pub rating_state: RatingState,
    pub rank_flags: Vec<String>,
    pub score: i64,
    pub created_ts: i64,
    pub updated_ts: i64,
}

/// Fields the sync engine owns. `rating`, `rank_flags` and `score` are
/// managed separately and survive upserts.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieUpsert {
    pub code: String,
    pub title: String,
    pub year: Option<i64>,
    pub actors: Vec<ActorRef>,
    pub date_added: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

type MovieTuple = (
    String,
    String,
    Option<i64>,
    String,
    Option<String>,
    Option<String>,
    Option<f64>,
    String,
    String,
    i64,
    i64,
    i64,
);

const MOVIE_COLUMNS: &str = "code, title, year, actors_json, date_added, external_id, \
     rating, rating_state, rank_flags_json, score, created_ts, updated_ts";

pub async fn get_movie(pool: &SqlitePool, code: &str) -> Result<Option<MovieRow>, DbError> {
    let row: Option<MovieTuple> = sqlx::query_as(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movie WHERE code = ?"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_movie).transpose()
}

pub async fn list_movies(pool: &SqlitePool) -> Result<Vec<MovieRow>, DbError> {
    let rows: Vec<MovieTuple> = sqlx::query_as(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movie ORDER BY code"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_movie).collect()
}

/// Case-insensitive search over code and actor names, paginated.
pub async fn search_movies(
    pool: &SqlitePool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<MovieRow>, DbError> {
    match search {
        Some(term) => Ok(search_matches(pool, term)
            .await?
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect()),
        None => {
            let rows: Vec<MovieTuple> = sqlx::query_as(&format!(
                "SELECT {MOVIE_COLUMNS} FROM movie ORDER BY code LIMIT ? OFFSET ?"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
            rows.into_iter().map(row_to_movie).collect()
        }
    }
}

pub async fn count_movies(pool: &SqlitePool, search: Option<&str>) -> Result<i64, DbError> {
    match search {
        Some(term) => Ok(search_matches(pool, term).await?.len() as i64),
        None => {
            let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movie")
                .fetch_one(pool)
                .await?;
            Ok(row.0)
        }
    }
}

/// All movies matching the term in their code or a decoded actor name.
/// The `LIKE` over the JSON column is only a prefilter; the real match
/// happens against decoded values so provider ids and JSON keys never
/// produce hits.
async fn search_matches(pool: &SqlitePool, term: &str) -> Result<Vec<MovieRow>, DbError> {
    let needle = term.to_lowercase();
    let pattern = format!("%{needle}%");
    let rows: Vec<MovieTuple> = sqlx::query_as(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movie \
         WHERE lower(code) LIKE ? OR lower(actors_json) LIKE ? \
         ORDER BY code"
    ))
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::new();
    for row in rows {
        let movie = row_to_movie(row)?;
        let hit = movie.code.to_lowercase().contains(&needle)
            || movie
                .actors
                .iter()
                .any(|a| a.name.to_lowercase().contains(&needle));
        if hit {
            out.push(movie);
        }
    }
    Ok(out)
}

/// All canonical codes currently in the store.
pub async fn list_codes(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT code FROM movie ORDER BY code")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

/// Movies featuring the named actor (exact name match against the stored
/// actor list, not a substring match).
pub async fn movies_by_actor(pool: &SqlitePool, name: &str) -> Result<Vec<MovieRow>, DbError> {
    // LIKE prefilter against the JSON column narrows the scan; the exact
    // match happens against the decoded actor list.
    let pattern = format!("%{}%", name);
    let rows: Vec<MovieTuple> = sqlx::query_as(&format!(
        "SELECT {MOVIE_COLUMNS} FROM movie WHERE actors_json LIKE ? ORDER BY code"
    ))
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::new();
    for row in rows {
        let movie = row_to_movie(row)?;
        if movie.actors.iter().any(|a| a.name == name) {
            out.push(movie);
        }
    }
    Ok(out)
}

/// Upsert a movie by code. Inserts new rows, rewrites changed rows, and
/// leaves identical rows untouched so a repeat sync reports zero updates.
/// `rating`, `rating_state`, `rank_flags` and `score` are preserved.
pub async fn upsert_movie(
    pool: &SqlitePool,
    movie: &MovieUpsert,
) -> Result<UpsertOutcome, DbError> {
    let actors_json = serde_json::to_string(&movie.actors)
        .map_err(|e| DbError::Corrupt(format!("encode actors: {e}")))?;
    let now = chrono::Utc::now().timestamp();

    let existing = get_movie(pool, &movie.code).await?;

    match existing {
        None => {
            sqlx::query(
                "INSERT INTO movie (code, title, year, actors_json, date_added, external_id, \
                 rating_state, rank_flags_json, score, created_ts, updated_ts) \
                 VALUES (?, ?, ?, ?, ?, ?, 'unknown', '[]', ?, ?, ?)",
            )
            .bind(&movie.code)
            .bind(&movie.title)
            .bind(movie.year)
            .bind(&actors_json)
            .bind(&movie.date_added)
            .bind(&movie.external_id)
            .bind(cineshelf_core::score::weighted_score(Default::default()))
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;
            Ok(UpsertOutcome::Inserted)
        }
        Some(current) => {
            let unchanged = current.title == movie.title
                && current.year == movie.year
                && current.actors == movie.actors
                && current.date_added == movie.date_added
                && current.external_id == movie.external_id;
            if unchanged {
                return Ok(UpsertOutcome::Unchanged);
            }

            sqlx::query(
                "UPDATE movie SET title = ?, year = ?, actors_json = ?, date_added = ?, \
                 external_id = ?, updated_ts = ? WHERE code = ?",
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(&actors_json)
            .bind(&movie.date_added)
            .bind(&movie.external_id)
            .bind(now)
            .bind(&movie.code)
            .execute(pool)
            .await?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

/// Replace a movie's rank flags and score in one statement. Returns whether
/// anything actually changed.
pub async fn set_flags_and_score(
    pool: &SqlitePool,
    code: &str,
    flags: &[String],
    score: i64,
) -> Result<bool, DbError> {
    let flags_json = serde_json::to_string(flags)
        .map_err(|e| DbError::Corrupt(format!("encode rank flags: {e}")))?;
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        "UPDATE movie SET rank_flags_json = ?, score = ?, updated_ts = ? \
         WHERE code = ? AND (rank_flags_json != ? OR score != ?)",
    )
    .bind(&flags_json)
    .bind(score)
    .bind(now)
    .bind(code)
    .bind(&flags_json)
    .bind(score)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record the outcome of a rating lookup together with the recomputed score.
pub async fn set_rating(
    pool: &SqlitePool,
    code: &str,
    rating: Option<f64>,
    state: RatingState,
    score: i64,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE movie SET rating = ?, rating_state = ?, score = ?, updated_ts = ? WHERE code = ?",
    )
    .bind(rating)
    .bind(state.as_str())
    .bind(score)
    .bind(now)
    .bind(code)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_movie(r: MovieTuple) -> Result<MovieRow, DbError> {
    let actors: Vec<ActorRef> = serde_json::from_str(&r.3)
        .map_err(|e| DbError::Corrupt(format!("actors_json for {}: {e}", r.0)))?;
    let rank_flags: Vec<String> = serde_json::from_str(&r.8)
        .map_err(|e| DbError::Corrupt(format!("rank_flags_json for {}: {e}", r.0)))?;

    Ok(MovieRow {
        code: r.0,
        title: r.1,
        year: r.2,
        actors,
        date_added: r.4,
        external_id: r.5,
        rating: r.6,
        rating_state: RatingState::parse(&r.7),
        rank_flags,
        score: r.9,
        created_ts: r.10,
        updated_ts: r.11,
    })
}
