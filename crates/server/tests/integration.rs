use std::sync::{Arc, Mutex};

use axum_test::TestServer;
use serde_json::Value;

use cineshelf_core::types::{ActorRef, RankList};
use cineshelf_remote::jellyfin::{MoviePage, RemoteMovie};
use cineshelf_remote::{FeedItem, FeedSource, MovieSource, RatingOutcome, RatingProvider, RemoteError};
use cineshelf_server::config::Config;
use cineshelf_server::routes::build_router;
use cineshelf_server::state::AppState;

// ---------------------------------------------------------------------------
// Mock upstreams
// ---------------------------------------------------------------------------

struct MockMovies {
    movies: Vec<RemoteMovie>,
}

#[async_trait::async_trait]
impl MovieSource for MockMovies {
    fn page_size(&self) -> usize {
        100
    }

    async fn list_movies_page(&self, start_index: usize) -> Result<MoviePage, RemoteError> {
        let items = self.movies.iter().skip(start_index).cloned().collect();
        Ok(MoviePage {
            items,
            total: self.movies.len(),
        })
    }

    async fn fetch_poster(&self, item_id: &str) -> Result<(Vec<u8>, Option<String>), RemoteError> {
        if item_id == "item-1" {
            Ok((b"poster-bytes".to_vec(), Some("image/png".to_string())))
        } else {
            Err(RemoteError::NotFound)
        }
    }
}

enum RatingBehavior {
    Rated(f64),
    NotFound,
    Fail,
}

struct MockRating {
    behavior: Mutex<RatingBehavior>,
}

impl MockRating {
    fn set(&self, behavior: RatingBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait::async_trait]
impl RatingProvider for MockRating {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_rating(&self, _code: &str) -> Result<RatingOutcome, RemoteError> {
        match *self.behavior.lock().unwrap() {
            RatingBehavior::Rated(v) => Ok(RatingOutcome::Rated(v)),
            RatingBehavior::NotFound => Ok(RatingOutcome::NotFound),
            RatingBehavior::Fail => Err(RemoteError::Network("connection refused".into())),
        }
    }
}

struct MockFeed;

#[async_trait::async_trait]
impl FeedSource for MockFeed {
    async fn fetch_feed(&self, actor_name: &str) -> Result<Vec<FeedItem>, RemoteError> {
        if actor_name == "Alice" {
            Ok(vec![
                FeedItem {
                    title: "ABCD-200 New Release".to_string(),
                    published_at: "Wed, 01 May 2024 00:00:00 GMT".to_string(),
                },
                FeedItem {
                    title: "ABCD-201 Another Release".to_string(),
                    published_at: "Thu, 02 May 2024 00:00:00 GMT".to_string(),
                },
            ])
        } else {
            Err(RemoteError::Network("feed unreachable".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn sample_movies() -> Vec<RemoteMovie> {
    vec![
        RemoteMovie {
            external_id: "item-1".to_string(),
            title: "ABCD-123 Example Feature".to_string(),
            year: Some(2023),
            date_added: Some("2024-01-15".to_string()),
            actors: vec![
                ActorRef {
                    name: "Alice".to_string(),
                    external_id: Some("a1".to_string()),
                },
                ActorRef {
                    name: "Bella".to_string(),
                    external_id: None,
                },
            ],
        },
        RemoteMovie {
            external_id: "item-2".to_string(),
            title: "efgh-45 Second Feature".to_string(),
            year: None,
            date_added: None,
            actors: vec![ActorRef {
                name: "Alice".to_string(),
                external_id: Some("a1".to_string()),
            }],
        },
        RemoteMovie {
            external_id: "item-3".to_string(),
            title: "home video without a code".to_string(),
            year: None,
            date_added: None,
            actors: vec![],
        },
    ]
}

struct TestCtx {
    server: TestServer,
    rating: Arc<MockRating>,
}

fn test_config(rank_lists: Vec<RankList>) -> Config {
    Config {
        db_path: ":memory:".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        jellyfin_url: "http://127.0.0.1:1".to_string(),
        jellyfin_api_key: "test".to_string(),
        rating_domain: "example.invalid".to_string(),
        feed_url: "http://127.0.0.1:1".to_string(),
        sync_on_startup: false,
        feed_refresh_on_start: false,
        feed_interval: std::time::Duration::from_secs(3600),
        rank_lists,
    }
}

/// Create a test server backed by an in-memory SQLite database and mock
/// upstreams.
async fn test_app_with(movies: Vec<RemoteMovie>, rank_lists: Vec<RankList>) -> TestCtx {
    let pool = cineshelf_db::connect(":memory:").await.unwrap();
    cineshelf_db::migrate::run(&pool).await.unwrap();

    let rating = Arc::new(MockRating {
        behavior: Mutex::new(RatingBehavior::Rated(4.6)),
    });

    let state = AppState {
        db: pool,
        config: Arc::new(test_config(rank_lists)),
        movies: Arc::new(MockMovies { movies }),
        rating: rating.clone(),
        feeds: Arc::new(MockFeed),
    };

    TestCtx {
        server: TestServer::new(build_router(state)).unwrap(),
        rating,
    }
}

async fn test_app() -> TestCtx {
    test_app_with(sample_movies(), Vec::new()).await
}

/// Write a rank-list CSV to a temp file and return its path.
fn write_csv(name: &str, body: &str) -> String {
    let path = std::env::temp_dir().join(format!("cineshelf_{}_{}.csv", std::process::id(), name));
    std::fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Health and errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let ctx = test_app().await;
    let resp = ctx.server.get("/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_movie_returns_error_envelope() {
    let ctx = test_app().await;
    let resp = ctx.server.get("/api/v1/movies/ZZZZ-999").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "not_found");
    assert!(body["error"]["message"].as_str().unwrap().contains("ZZZZ-999"));
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_imports_coded_movies_and_is_idempotent() {
    let ctx = test_app().await;

    let resp = ctx.server.post("/api/v1/sync").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["inserted"], 2);
    assert_eq!(body["updated"], 0);
    assert_eq!(body["failed"], 1); // the uncoded home video

    let resp = ctx.server.post("/api/v1/sync").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["inserted"], 0);
    assert_eq!(body["unchanged"], 2);
}

#[tokio::test]
async fn sync_normalizes_code_case() {
    let ctx = test_app().await;
    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    // "efgh-45" in the source title is stored upper-cased.
    let resp = ctx.server.get("/api/v1/movies/EFGH-45").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["code"], "EFGH-45");
    assert_eq!(body["title"], "efgh-45 Second Feature");
}

#[tokio::test]
async fn sync_applies_rank_flags_and_score() {
    let csv = write_csv("annual", "rank,name\n1,ABCD-123 Example Feature\n");
    let lists = vec![RankList::new("Top 2024", csv)];
    let ctx = test_app_with(sample_movies(), lists).await;

    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    let resp = ctx.server.get("/api/v1/movies/ABCD-123").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["tags"], serde_json::json!(["Top 2024"]));
    // base 50, one list +20, annual +10, two actors +5, actor id +15
    assert_eq!(body["score"], 100);
}

// ---------------------------------------------------------------------------
// Movies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn movies_listing_supports_search_and_pagination() {
    let ctx = test_app().await;
    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    let resp = ctx.server.get("/api/v1/movies").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["movies"].as_array().unwrap().len(), 2);

    let resp = ctx
        .server
        .get("/api/v1/movies")
        .add_query_param("per_page", "1")
        .add_query_param("page", "2")
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["movies"].as_array().unwrap().len(), 1);
    assert_eq!(body["page"], 2);

    let resp = ctx
        .server
        .get("/api/v1/movies")
        .add_query_param("search", "abcd")
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["movies"][0]["code"], "ABCD-123");
}

#[tokio::test]
async fn poster_is_proxied_with_content_type() {
    let ctx = test_app().await;
    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    let resp = ctx.server.get("/api/v1/movies/ABCD-123/poster").await;
    resp.assert_status_ok();
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "image/png"
    );
    assert_eq!(resp.as_bytes().as_ref(), b"poster-bytes");

    // item-2 has no poster upstream
    let resp = ctx.server.get("/api/v1/movies/EFGH-45/poster").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Rating refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rating_refresh_stores_value_and_recomputes_score() {
    let ctx = test_app().await;
    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    ctx.rating.set(RatingBehavior::Rated(4.6));
    let resp = ctx.server.post("/api/v1/movies/ABCD-123/rating/refresh").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["rating"], 4.6);
    assert_eq!(body["rating_state"], "rated");
    // base 50, rating >= 4.5 +20, two actors +5, actor id +15
    assert_eq!(body["score"], 90);

    let resp = ctx.server.get("/api/v1/movies/ABCD-123").await;
    let body: Value = resp.json();
    assert_eq!(body["rating"], 4.6);
    assert_eq!(body["score"], 90);
}

#[tokio::test]
async fn rating_not_found_is_cached_as_sentinel() {
    let ctx = test_app().await;
    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    ctx.rating.set(RatingBehavior::NotFound);
    let resp = ctx.server.post("/api/v1/movies/ABCD-123/rating/refresh").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert!(body["rating"].is_null());
    assert_eq!(body["rating_state"], "not_found");
    // no rating adjustment, two actors +5, actor id +15
    assert_eq!(body["score"], 70);
}

#[tokio::test]
async fn rating_failure_leaves_cached_value_untouched() {
    let ctx = test_app().await;
    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    ctx.rating.set(RatingBehavior::Rated(4.0));
    ctx.server
        .post("/api/v1/movies/ABCD-123/rating/refresh")
        .await
        .assert_status_ok();

    ctx.rating.set(RatingBehavior::Fail);
    let resp = ctx.server.post("/api/v1/movies/ABCD-123/rating/refresh").await;
    resp.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "upstream_error");

    let resp = ctx.server.get("/api/v1/movies/ABCD-123").await;
    let body: Value = resp.json();
    assert_eq!(body["rating"], 4.0);
    assert_eq!(body["rating_state"], "rated");
}

#[tokio::test]
async fn rating_refresh_on_unknown_movie_is_404() {
    let ctx = test_app().await;
    let resp = ctx.server.post("/api/v1/movies/ZZZZ-1/rating/refresh").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Rank lists
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rank_lists_report_membership_and_missing_codes() {
    let csv_a = write_csv(
        "lists_a",
        "rank,SUBSTR(name,0,40)\n1,ABCD-123 Example Feature\n2,WXYZ-777 Not In Library\n",
    );
    let csv_b = write_csv("lists_b", "rank,name\n1,EFGH-45 Second\n");
    let lists = vec![
        RankList::new("Top 2024", csv_a),
        RankList::new("All Time", csv_b),
    ];
    let ctx = test_app_with(sample_movies(), lists).await;
    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    let resp = ctx.server.get("/api/v1/lists").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    let lists = body.as_array().unwrap();
    assert_eq!(lists.len(), 2);
    let top = lists.iter().find(|l| l["name"] == "Top 2024").unwrap();
    assert_eq!(top["annual"], true);
    assert_eq!(top["codes"], 2);
    let all_time = lists.iter().find(|l| l["name"] == "All Time").unwrap();
    assert_eq!(all_time["annual"], false);

    let resp = ctx.server.get("/api/v1/lists/Top%202024").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let owned = entries.iter().find(|e| e["code"] == "ABCD-123").unwrap();
    assert_eq!(owned["in_library"], true);
    assert_eq!(owned["title"], "ABCD-123 Example Feature");
    let missing = entries.iter().find(|e| e["code"] == "WXYZ-777").unwrap();
    assert_eq!(missing["in_library"], false);
    assert!(missing["title"].is_null());

    let resp = ctx.server.get("/api/v1/lists/No%20Such%20List").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);

    let resp = ctx.server.get("/api/v1/missing").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["Top 2024"], serde_json::json!(["WXYZ-777"]));
    assert_eq!(body["All Time"], serde_json::json!([]));

    let resp = ctx.server.get("/api/v1/stats").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["lists"]["Top 2024"], 2);
    assert_eq!(body["lists"]["All Time"], 1);
}

// ---------------------------------------------------------------------------
// Actors and subscriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn actors_are_aggregated_across_movies() {
    let ctx = test_app().await;
    ctx.server.post("/api/v1/sync").await.assert_status_ok();

    let resp = ctx.server.get("/api/v1/actors").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    let actors = body.as_array().unwrap();
    // Alice appears twice, Bella once; most-credited first.
    assert_eq!(actors[0]["name"], "Alice");
    assert_eq!(actors[0]["count"], 2);
    assert_eq!(actors[0]["external_id"], "a1");
    assert_eq!(actors[1]["name"], "Bella");
    assert_eq!(actors[1]["count"], 1);

    let resp = ctx.server.get("/api/v1/actors/Alice").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body.as_array().unwrap().len(), 2);

    let resp = ctx.server.get("/api/v1/actors/Nobody").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn subscriptions_roundtrip() {
    let ctx = test_app().await;

    let resp = ctx.server.put("/api/v1/actors/Alice/subscription").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["subscribed"], true);

    // Subscribing twice is fine.
    ctx.server
        .put("/api/v1/actors/Alice/subscription")
        .await
        .assert_status_ok();

    let resp = ctx.server.get("/api/v1/subscriptions").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body, serde_json::json!(["Alice"]));

    let resp = ctx.server.delete("/api/v1/actors/Alice/subscription").await;
    resp.assert_status_ok();

    let resp = ctx.server.delete("/api/v1/actors/Alice/subscription").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);

    let resp = ctx.server.get("/api/v1/subscriptions").await;
    let body: Value = resp.json();
    assert!(body.as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Actor update feed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn feed_refresh_collects_and_deduplicates_entries() {
    let ctx = test_app().await;
    ctx.server
        .put("/api/v1/actors/Alice/subscription")
        .await
        .assert_status_ok();
    // Carol's feed is unreachable in the mock; she must not block Alice.
    ctx.server
        .put("/api/v1/actors/Carol/subscription")
        .await
        .assert_status_ok();

    let resp = ctx.server.post("/api/v1/feed/refresh").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["actors_ok"], 1);
    assert_eq!(body["actors_failed"], 1);
    assert_eq!(body["new_entries"], 2);

    // A second pass finds nothing new.
    let resp = ctx.server.post("/api/v1/feed/refresh").await;
    let body: Value = resp.json();
    assert_eq!(body["new_entries"], 0);

    let resp = ctx.server.get("/api/v1/feed").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    // Newest first.
    assert_eq!(entries[0]["title"], "ABCD-201 Another Release");
    assert_eq!(entries[0]["seen"], false);
}

#[tokio::test]
async fn feed_entries_can_be_marked_seen() {
    let ctx = test_app().await;
    ctx.server
        .put("/api/v1/actors/Alice/subscription")
        .await
        .assert_status_ok();
    ctx.server.post("/api/v1/feed/refresh").await.assert_status_ok();

    let resp = ctx.server.get("/api/v1/feed").await;
    let body: Value = resp.json();
    let id = body[0]["id"].as_str().unwrap().to_string();

    ctx.server
        .post(&format!("/api/v1/feed/{id}/seen"))
        .await
        .assert_status_ok();

    let resp = ctx
        .server
        .get("/api/v1/feed")
        .add_query_param("unseen", "true")
        .await;
    let body: Value = resp.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_ne!(body[0]["id"], id);

    let resp = ctx.server.post("/api/v1/feed/no-such-id/seen").await;
    resp.assert_status(axum::http::StatusCode::NOT_FOUND);
}
