use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cineshelf_catalog::ranks::LoadedLists;
use cineshelf_catalog::{feeds, sync};
use cineshelf_core::error::ApiError;
use cineshelf_core::types::{ActorRef, RatingState};
use cineshelf_db::repo::movies::MovieRow;
use cineshelf_db::repo::{feed, movies, subscriptions};
use cineshelf_remote::{RatingOutcome, RemoteError};

use crate::error::AppError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/sync", post(sync_now))
        // Movies
        .route("/movies", get(list_movies))
        .route("/movies/{code}", get(get_movie))
        .route("/movies/{code}/rating/refresh", post(refresh_rating))
        .route("/movies/{code}/poster", get(get_poster))
        // Rank lists
        .route("/lists", get(list_rank_lists))
        .route("/lists/{name}", get(get_rank_list))
        .route("/missing", get(get_missing))
        .route("/stats", get(get_stats))
        // Actors
        .route("/actors", get(list_actors))
        .route("/actors/{name}", get(get_actor_movies))
        .route(
            "/actors/{name}/subscription",
            put(subscribe_actor).delete(unsubscribe_actor),
        )
        .route("/subscriptions", get(list_subscriptions))
        // Actor update feed
        .route("/feed", get(list_feed))
        .route("/feed/refresh", post(refresh_feed))
        .route("/feed/{id}/seen", post(mark_feed_seen))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("database check failed: {e}")))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

async fn sync_now(
    State(state): State<AppState>,
) -> Result<Json<sync::SyncSummary>, AppError> {
    let summary = sync::run_sync(
        &state.db,
        state.movies.as_ref(),
        &state.config.rank_lists,
    )
    .await
    .map_err(|e| match e {
        sync::SyncError::Source(e) => ApiError::Upstream(format!("movie source: {e}")),
        other => ApiError::Internal(other.to_string()),
    })?;

    Ok(Json(summary))
}

// ---------------------------------------------------------------------------
// Movies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MovieDto {
    code: String,
    title: String,
    year: Option<i64>,
    actors: Vec<ActorRef>,
    date_added: Option<String>,
    rating: Option<f64>,
    rating_state: RatingState,
    tags: Vec<String>,
    score: i64,
}

impl From<MovieRow> for MovieDto {
    fn from(m: MovieRow) -> Self {
        Self {
            code: m.code,
            title: m.title,
            year: m.year,
            actors: m.actors,
            date_added: m.date_added,
            rating: m.rating,
            rating_state: m.rating_state,
            tags: m.rank_flags,
            score: m.score,
        }
    }
}

#[derive(Deserialize)]
struct MoviesQuery {
    search: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Serialize)]
struct MoviesResponse {
    movies: Vec<MovieDto>,
    total: i64,
    page: u32,
    per_page: u32,
}

async fn list_movies(
    State(state): State<AppState>,
    Query(query): Query<MoviesQuery>,
) -> Result<Json<MoviesResponse>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 200);
    let offset = (page as i64 - 1) * per_page as i64;
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());

    let rows = movies::search_movies(&state.db, search, per_page as i64, offset)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;
    let total = movies::count_movies(&state.db, search)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(MoviesResponse {
        movies: rows.into_iter().map(MovieDto::from).collect(),
        total,
        page,
        per_page,
    }))
}

async fn get_movie(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<MovieDto>, AppError> {
    let movie = movies::get_movie(&state.db, &code)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
        .ok_or_else(|| ApiError::NotFound(format!("movie {code}")))?;

    Ok(Json(MovieDto::from(movie)))
}

/// On-demand rating lookup. A `NotFound` answer is cached as a sentinel so
/// the code is not re-queried; a transient failure leaves any cached value
/// untouched and surfaces as 502.
async fn refresh_rating(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<MovieDto>, AppError> {
    let movie = movies::get_movie(&state.db, &code)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
        .ok_or_else(|| ApiError::NotFound(format!("movie {code}")))?;

    let outcome = state
        .rating
        .fetch_rating(&code)
        .await
        .map_err(|e| ApiError::Upstream(format!("rating lookup: {e}")))?;

    let (rating, rating_state) = match outcome {
        RatingOutcome::Rated(v) => (Some(v), RatingState::Rated),
        RatingOutcome::NotFound => (None, RatingState::NotFound),
    };

    let mut updated = movie.clone();
    updated.rating = rating;
    updated.rating_state = rating_state;
    let on_annual = state
        .config
        .rank_lists
        .iter()
        .any(|l| l.annual && movie.rank_flags.contains(&l.name));
    let score = sync::score_for(&updated, &movie.rank_flags, on_annual);

    movies::set_rating(&state.db, &code, rating, rating_state, score)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    updated.score = score;
    Ok(Json(MovieDto::from(updated)))
}

async fn get_poster(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let movie = movies::get_movie(&state.db, &code)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
        .ok_or_else(|| ApiError::NotFound(format!("movie {code}")))?;

    let item_id = movie
        .external_id
        .ok_or_else(|| ApiError::NotFound(format!("no source item for {code}")))?;

    match state.movies.fetch_poster(&item_id).await {
        Ok((bytes, content_type)) => {
            let content_type = content_type.unwrap_or_else(|| "image/jpeg".to_string());
            Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
        }
        Err(RemoteError::NotFound) => {
            Err(ApiError::NotFound(format!("no poster for {code}")).into())
        }
        Err(e) => Err(ApiError::Upstream(format!("poster fetch: {e}")).into()),
    }
}

// ---------------------------------------------------------------------------
// Rank lists
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RankListDto {
    name: String,
    annual: bool,
    codes: usize,
}

async fn list_rank_lists(State(state): State<AppState>) -> Json<Vec<RankListDto>> {
    let loaded = LoadedLists::load(&state.config.rank_lists);
    Json(
        loaded
            .iter()
            .map(|(list, codes)| RankListDto {
                name: list.name.clone(),
                annual: list.annual,
                codes: codes.len(),
            })
            .collect(),
    )
}

#[derive(Serialize)]
struct RankListEntryDto {
    code: String,
    in_library: bool,
    title: Option<String>,
    year: Option<i64>,
    actors: Vec<ActorRef>,
}

async fn get_rank_list(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<RankListEntryDto>>, AppError> {
    let loaded = LoadedLists::load(&state.config.rank_lists);
    let codes = loaded
        .get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("rank list {name}")))?;

    let stored: HashMap<String, MovieRow> = movies::list_movies(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
        .into_iter()
        .map(|m| (m.code.clone(), m))
        .collect();

    let entries = codes
        .iter()
        .map(|code| match stored.get(code) {
            Some(m) => RankListEntryDto {
                code: code.clone(),
                in_library: true,
                title: Some(m.title.clone()),
                year: m.year,
                actors: m.actors.clone(),
            },
            None => RankListEntryDto {
                code: code.clone(),
                in_library: false,
                title: None,
                year: None,
                actors: Vec::new(),
            },
        })
        .collect();

    Ok(Json(entries))
}

async fn get_missing(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<String>>>, AppError> {
    let loaded = LoadedLists::load(&state.config.rank_lists);
    let in_library: std::collections::BTreeSet<String> = movies::list_codes(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
        .into_iter()
        .collect();

    let mut missing = BTreeMap::new();
    for (list, codes) in loaded.iter() {
        let absent: Vec<String> = codes
            .iter()
            .filter(|c| !in_library.contains(*c))
            .cloned()
            .collect();
        missing.insert(list.name.clone(), absent);
    }

    Ok(Json(missing))
}

#[derive(Serialize)]
struct StatsResponse {
    total: i64,
    lists: BTreeMap<String, usize>,
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let total = movies::count_movies(&state.db, None)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let loaded = LoadedLists::load(&state.config.rank_lists);
    let lists = loaded
        .iter()
        .map(|(list, codes)| (list.name.clone(), codes.len()))
        .collect();

    Ok(Json(StatsResponse { total, lists }))
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ActorSummaryDto {
    name: String,
    external_id: Option<String>,
    count: usize,
    codes: Vec<String>,
}

async fn list_actors(
    State(state): State<AppState>,
) -> Result<Json<Vec<ActorSummaryDto>>, AppError> {
    let rows = movies::list_movies(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let mut by_name: BTreeMap<String, ActorSummaryDto> = BTreeMap::new();
    for movie in rows {
        for actor in &movie.actors {
            let entry = by_name
                .entry(actor.name.clone())
                .or_insert_with(|| ActorSummaryDto {
                    name: actor.name.clone(),
                    external_id: None,
                    count: 0,
                    codes: Vec::new(),
                });
            entry.count += 1;
            entry.codes.push(movie.code.clone());
            if entry.external_id.is_none() {
                entry.external_id = actor.external_id.clone();
            }
        }
    }

    let mut actors: Vec<ActorSummaryDto> = by_name.into_values().collect();
    actors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    Ok(Json(actors))
}

async fn get_actor_movies(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<MovieDto>>, AppError> {
    let rows = movies::movies_by_actor(&state.db, &name)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(rows.into_iter().map(MovieDto::from).collect()))
}

#[derive(Serialize)]
struct SubscriptionResponse {
    actor: String,
    subscribed: bool,
}

async fn subscribe_actor(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    subscriptions::subscribe(&state.db, &name)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(SubscriptionResponse {
        actor: name,
        subscribed: true,
    }))
}

async fn unsubscribe_actor(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let removed = subscriptions::unsubscribe(&state.db, &name)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if !removed {
        return Err(ApiError::NotFound(format!("subscription for {name}")).into());
    }

    Ok(Json(SubscriptionResponse {
        actor: name,
        subscribed: false,
    }))
}

async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let actors = subscriptions::list(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;
    Ok(Json(actors))
}

// ---------------------------------------------------------------------------
// Actor update feed
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FeedQuery {
    unseen: Option<bool>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct FeedEntryDto {
    id: String,
    actor_name: String,
    title: String,
    published_at: String,
    seen: bool,
}

async fn list_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedEntryDto>>, AppError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let entries = feed::list_entries(&state.db, query.unseen.unwrap_or(false), limit)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(
        entries
            .into_iter()
            .map(|e| FeedEntryDto {
                id: e.id,
                actor_name: e.actor_name,
                title: e.title,
                published_at: e.published_at,
                seen: e.seen,
            })
            .collect(),
    ))
}

async fn refresh_feed(State(state): State<AppState>) -> Json<feeds::FeedSummary> {
    Json(feeds::refresh_all(&state.db, state.feeds.as_ref()).await)
}

async fn mark_feed_seen(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = feed::mark_seen(&state.db, &id)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if !updated {
        return Err(ApiError::NotFound(format!("feed entry {id}")).into());
    }

    Ok(Json(serde_json::json!({ "seen": true })))
}
