use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cineshelf_catalog::feeds::FeedRefresher;
use cineshelf_remote::feed::FeedClient;
use cineshelf_remote::jellyfin::JellyfinClient;
use cineshelf_remote::rating::RatingClient;
use cineshelf_server::config::Config;
use cineshelf_server::routes::build_router;
use cineshelf_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(Config::from_env());
    info!(db_path = %config.db_path, "connecting to database");

    let pool = cineshelf_db::connect(&config.db_path)
        .await
        .context("failed to connect to database")?;

    cineshelf_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("migrations complete");

    let movies = Arc::new(JellyfinClient::new(
        config.jellyfin_url.clone(),
        config.jellyfin_api_key.clone(),
    ));
    let rating = Arc::new(RatingClient::new(config.rating_domain.clone()));
    let feeds = Arc::new(FeedClient::new(config.feed_url.clone()));

    let state = AppState {
        db: pool.clone(),
        config: config.clone(),
        movies: movies.clone(),
        rating,
        feeds: feeds.clone(),
    };

    // Shutdown signal shared with background tasks
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Periodic feed refresher over subscribed actors
    let refresher = FeedRefresher::new(
        pool.clone(),
        feeds,
        config.feed_interval,
        config.feed_refresh_on_start,
    );
    tokio::spawn(refresher.run(shutdown_rx));

    // Optional full library sync at startup
    if config.sync_on_startup {
        let pool = pool.clone();
        let movies = movies.clone();
        let lists = config.rank_lists.clone();
        tokio::spawn(async move {
            match cineshelf_catalog::sync::run_sync(&pool, movies.as_ref(), &lists).await {
                Ok(summary) => info!(
                    inserted = summary.inserted,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    failed = summary.failed,
                    "startup sync complete"
                ),
                Err(e) => warn!(error = %e, "startup sync failed"),
            }
        });
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("failed to bind")?;
    info!(addr = %config.bind_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}
