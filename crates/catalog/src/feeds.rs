//! Actor feed refresher.
//!
//! A background task that re-pulls each subscribed actor's update feed on a
//! fixed interval and records entries it has not seen before. Runs until
//! the shutdown signal flips; tests call `refresh_once` directly.

use std::sync::Arc;
use std::time::Duration;

use cineshelf_db::repo::{feed, subscriptions};
use cineshelf_remote::FeedSource;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outcome counts of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    pub actors_ok: u64,
    pub actors_failed: u64,
    pub new_entries: u64,
}

pub struct FeedRefresher {
    pool: SqlitePool,
    source: Arc<dyn FeedSource>,
    interval: Duration,
    run_on_start: bool,
}

impl FeedRefresher {
    pub fn new(
        pool: SqlitePool,
        source: Arc<dyn FeedSource>,
        interval: Duration,
        run_on_start: bool,
    ) -> Self {
        Self {
            pool,
            source,
            interval,
            run_on_start,
        }
    }

    /// Drive refresh cycles until `shutdown` flips to true. A failed cycle
    /// simply waits for the next tick; there is no immediate retry.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        if !self.run_on_start {
            // The first interval tick fires immediately; swallow it unless
            // a startup refresh was asked for.
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = refresh_all(&self.pool, self.source.as_ref()).await;
                    info!(
                        actors_ok = summary.actors_ok,
                        actors_failed = summary.actors_failed,
                        new_entries = summary.new_entries,
                        "feed refresh cycle complete"
                    );
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("feed refresher stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One refresh cycle over every subscription.
    pub async fn refresh_once(&self) -> FeedSummary {
        refresh_all(&self.pool, self.source.as_ref()).await
    }
}

/// Refresh every subscribed actor's feed once. A failure on one actor's
/// feed never blocks the others.
pub async fn refresh_all(pool: &SqlitePool, source: &dyn FeedSource) -> FeedSummary {
    let mut summary = FeedSummary::default();

    let actors = match subscriptions::list(pool).await {
        Ok(actors) => actors,
        Err(e) => {
            warn!(error = %e, "could not list subscriptions");
            return summary;
        }
    };

    for actor in actors {
        match source.fetch_feed(&actor).await {
            Ok(items) => {
                summary.actors_ok += 1;
                for item in items {
                    match feed::insert_entry(pool, &actor, &item.title, &item.published_at).await {
                        Ok(true) => summary.new_entries += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!(actor = %actor, error = %e, "feed entry write failed")
                        }
                    }
                }
                debug!(actor = %actor, "feed refreshed");
            }
            Err(e) => {
                warn!(actor = %actor, error = %e, "feed fetch failed");
                summary.actors_failed += 1;
            }
        }
    }

    summary
}
