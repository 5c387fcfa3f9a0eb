//! Rating-site lookup client.
//!
//! Searches the configured site for a catalog code, follows the first
//! result link and extracts the community rating from the detail page.
//! The site has no JSON API, so extraction works over a fixed list of
//! HTML patterns.

use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use tracing::debug;

use crate::{RatingOutcome, RatingProvider, RemoteError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// Detail pages live under /v/<id>.
static RE_RESULT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(/v/[^"]+)""#).unwrap());

static RE_DATA_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-score="(\d+\.?\d*)""#).unwrap());

static RE_RATING_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<[^>]*class="[^"]*rating[^"]*"[^>]*>(\d+\.?\d*)"#).unwrap());

static RE_OUT_OF_FIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*/\s*5").unwrap());

pub struct RatingClient {
    base_url: String,
    client: reqwest::Client,
}

impl RatingClient {
    pub fn new(domain: String) -> Self {
        let base_url = if domain.starts_with("http") {
            domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", domain.trim_end_matches('/'))
        };
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    async fn get_page(&self, url: &str) -> Result<String, RemoteError> {
        // Jittered delay so bursts of lookups do not hammer the site.
        let delay_ms = rand::thread_rng().gen_range(500..1500);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        debug!(url = %url, "rating request");
        let resp = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(RemoteError::Provider(format!(
                "rating site returned {}",
                resp.status()
            )));
        }

        resp.text()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))
    }
}

#[async_trait::async_trait]
impl RatingProvider for RatingClient {
    fn name(&self) -> &str {
        "rating-site"
    }

    async fn fetch_rating(&self, code: &str) -> Result<RatingOutcome, RemoteError> {
        let search_url = format!("{}/search?q={}&f=all", self.base_url, code);
        let search_page = match self.get_page(&search_url).await {
            Ok(page) => page,
            Err(RemoteError::NotFound) => return Ok(RatingOutcome::NotFound),
            Err(e) => return Err(e),
        };

        let Some(detail_path) = first_result_link(&search_page) else {
            debug!(code = code, "no search results");
            return Ok(RatingOutcome::NotFound);
        };

        let detail_url = format!("{}{detail_path}", self.base_url);
        let detail_page = match self.get_page(&detail_url).await {
            Ok(page) => page,
            Err(RemoteError::NotFound) => return Ok(RatingOutcome::NotFound),
            Err(e) => return Err(e),
        };

        match extract_score(&detail_page) {
            Some(score) if (0.0..=5.0).contains(&score) => Ok(RatingOutcome::Rated(score)),
            Some(score) => Err(RemoteError::Provider(format!(
                "rating {score} outside 0.0–5.0"
            ))),
            None => {
                debug!(code = code, "detail page carries no score");
                Ok(RatingOutcome::NotFound)
            }
        }
    }
}

fn first_result_link(html: &str) -> Option<String> {
    RE_RESULT_LINK
        .captures(html)
        .map(|caps| caps[1].to_string())
}

/// Try each known score pattern in order and return the first hit.
fn extract_score(html: &str) -> Option<f64> {
    for re in [&*RE_DATA_SCORE, &*RE_RATING_CLASS, &*RE_OUT_OF_FIVE] {
        if let Some(caps) = re.captures(html) {
            if let Ok(v) = caps[1].parse() {
                return Some(v);
            }
        }
    }
    None
}
