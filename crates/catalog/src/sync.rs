//! Sync engine: reconciles the Jellyfin collection, the rank lists and any
//! cached ratings into scored movie rows.

use std::time::Duration;

use cineshelf_core::score::{ScoreInput, weighted_score};
use cineshelf_core::types::{RankList, RatingState};
use cineshelf_db::DbError;
use cineshelf_db::repo::movies::{self, MovieRow, MovieUpsert, UpsertOutcome};
use cineshelf_remote::{MovieSource, RemoteError};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::code::extract_code;
use crate::ranks::LoadedLists;

const PAGE_RETRIES: usize = 3;
const PAGE_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("source unreachable: {0}")]
    Source(#[from] RemoteError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Outcome counts of one sync run. Per-unit failures land in `failed`
/// instead of aborting the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failed: u64,
    pub rescored: u64,
}

/// Pull the complete movie collection, upsert by canonical code, then run
/// the rank matcher and recompute scores.
///
/// Fails outright only when the very first page is unreachable; once the
/// collection size is known, a dead page is counted as failed and the run
/// moves on.
pub async fn run_sync(
    pool: &SqlitePool,
    source: &dyn MovieSource,
    lists: &[RankList],
) -> Result<SyncSummary, SyncError> {
    let mut summary = SyncSummary::default();
    let page_size = source.page_size();
    let mut start_index = 0usize;
    let mut total: Option<usize> = None;

    loop {
        match fetch_page_with_retry(source, start_index).await {
            Ok(page) => {
                total = Some(page.total);
                let count = page.items.len();

                for item in &page.items {
                    let Some(code) = extract_code(&item.title) else {
                        warn!(title = %item.title, "no catalog code in title, skipping");
                        summary.failed += 1;
                        continue;
                    };

                    let upsert = MovieUpsert {
                        code,
                        title: item.title.clone(),
                        year: item.year,
                        actors: item.actors.clone(),
                        date_added: item.date_added.clone(),
                        external_id: Some(item.external_id.clone()),
                    };

                    // One bad row must not abort the batch.
                    match movies::upsert_movie(pool, &upsert).await {
                        Ok(UpsertOutcome::Inserted) => summary.inserted += 1,
                        Ok(UpsertOutcome::Updated) => summary.updated += 1,
                        Ok(UpsertOutcome::Unchanged) => summary.unchanged += 1,
                        Err(e) => {
                            error!(code = %upsert.code, error = %e, "movie upsert failed");
                            summary.failed += 1;
                        }
                    }
                }

                start_index += count;
                if count == 0 || start_index >= page.total {
                    break;
                }
            }
            Err(e) => {
                let Some(total) = total else {
                    // Nothing fetched yet: the source itself is down.
                    return Err(e.into());
                };
                warn!(
                    start_index,
                    error = %e,
                    "page failed after retries, continuing with the rest"
                );
                summary.failed += page_size.min(total - start_index) as u64;
                start_index += page_size;
                if start_index >= total {
                    break;
                }
            }
        }
    }

    let loaded = LoadedLists::load(lists);
    summary.rescored = rescore_all(pool, &loaded).await?;

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        failed = summary.failed,
        rescored = summary.rescored,
        "sync complete"
    );
    Ok(summary)
}

async fn fetch_page_with_retry(
    source: &dyn MovieSource,
    start_index: usize,
) -> Result<cineshelf_remote::jellyfin::MoviePage, RemoteError> {
    let mut last_err = None;
    for attempt in 0..PAGE_RETRIES {
        match source.list_movies_page(start_index).await {
            Ok(page) => return Ok(page),
            Err(e) => {
                warn!(start_index, attempt, error = %e, "page fetch failed");
                last_err = Some(e);
                tokio::time::sleep(PAGE_RETRY_DELAY * (attempt as u32 + 1)).await;
            }
        }
    }
    Err(last_err.unwrap_or(RemoteError::Provider("retries exhausted".into())))
}

/// Recompute rank flags and score for every stored movie. Returns how many
/// rows actually changed; a write failure loses that row only.
pub async fn rescore_all(pool: &SqlitePool, loaded: &LoadedLists) -> Result<u64, SyncError> {
    let mut changed = 0;
    for movie in movies::list_movies(pool).await? {
        let flags = loaded.flags_for(&movie.code);
        let score = score_for(&movie, &flags, loaded.on_annual_list(&movie.code));

        match movies::set_flags_and_score(pool, &movie.code, &flags, score).await {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(e) => error!(code = %movie.code, error = %e, "score update failed"),
        }
    }
    Ok(changed)
}

/// Score a movie from its stored state plus a rank-matcher result.
pub fn score_for(movie: &MovieRow, flags: &[String], on_annual_list: bool) -> i64 {
    let rating = match movie.rating_state {
        RatingState::Rated => movie.rating,
        _ => None,
    };
    weighted_score(ScoreInput {
        rating,
        list_count: flags.len(),
        on_annual_list,
        actor_count: movie.actors.len(),
        any_actor_has_id: movie.actors.iter().any(|a| a.external_id.is_some()),
    })
}
