use std::sync::Arc;

use cineshelf_remote::{FeedSource, MovieSource, RatingProvider};
use sqlx::SqlitePool;

use crate::config::Config;

/// Shared application state passed to all handlers. External collaborators
/// sit behind trait objects so tests can swap them out.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub movies: Arc<dyn MovieSource>,
    pub rating: Arc<dyn RatingProvider>,
    pub feeds: Arc<dyn FeedSource>,
}
