pub mod feed;
pub mod jellyfin;
pub mod rating;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not found")]
    NotFound,
}

/// Outcome of a rating lookup. `NotFound` is a real answer (the site has
/// no entry for the code) and is cached by the caller so the code is not
/// re-queried every run; transient failures surface as `RemoteError`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingOutcome {
    Rated(f64),
    NotFound,
}

/// On-demand external rating lookup, one query per call.
#[async_trait::async_trait]
pub trait RatingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_rating(&self, code: &str) -> Result<RatingOutcome, RemoteError>;
}

/// Paged source of the full movie collection.
#[async_trait::async_trait]
pub trait MovieSource: Send + Sync {
    /// Number of items requested per page; sync advances by this much when
    /// a whole page has to be written off.
    fn page_size(&self) -> usize;

    async fn list_movies_page(
        &self,
        start_index: usize,
    ) -> Result<jellyfin::MoviePage, RemoteError>;

    /// Poster image bytes plus content type for an item, passed straight
    /// through to the caller.
    async fn fetch_poster(
        &self,
        item_id: &str,
    ) -> Result<(Vec<u8>, Option<String>), RemoteError>;
}

/// One entry from an actor's update feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub published_at: String,
}

/// Per-actor update feed source.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feed(&self, actor_name: &str) -> Result<Vec<FeedItem>, RemoteError>;
}
