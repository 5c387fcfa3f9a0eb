//! Jellyfin API client.
//!
//! Consumes the item-listing and image endpoints of a Jellyfin server,
//! authenticated with the `X-Emby-Token` header.

use std::time::Duration;

use cineshelf_core::types::ActorRef;
use tracing::debug;

use crate::RemoteError;

const PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct JellyfinClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// One movie as reported by Jellyfin, before code normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMovie {
    pub external_id: String,
    pub title: String,
    pub year: Option<i64>,
    pub date_added: Option<String>,
    pub actors: Vec<ActorRef>,
}

/// One page of the movie listing.
#[derive(Debug, Clone)]
pub struct MoviePage {
    pub items: Vec<RemoteMovie>,
    pub total: usize,
}

impl JellyfinClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, RemoteError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "jellyfin request");

        let resp = self
            .client
            .get(&url)
            .header("X-Emby-Token", &self.api_key)
            .query(params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(RemoteError::Provider(format!(
                "jellyfin returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| RemoteError::Provider(format!("parse JSON: {e}")))
    }

    async fn fetch_poster_inner(
        &self,
        item_id: &str,
    ) -> Result<(Vec<u8>, Option<String>), RemoteError> {
        let url = format!("{}/Items/{item_id}/Images/Primary", self.base_url);

        let resp = self
            .client
            .get(&url)
            .header("X-Emby-Token", &self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(RemoteError::Provider(format!(
                "jellyfin returned {}",
                resp.status()
            )));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok((bytes.to_vec(), content_type))
    }
}

#[async_trait::async_trait]
impl crate::MovieSource for JellyfinClient {
    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    /// Fetch one page of the full recursive movie listing.
    async fn list_movies_page(&self, start_index: usize) -> Result<MoviePage, RemoteError> {
        let start = start_index.to_string();
        let limit = PAGE_SIZE.to_string();
        let data = self
            .get_json(
                "/Items",
                &[
                    ("Recursive", "true"),
                    ("IncludeItemTypes", "Movie"),
                    ("Fields", "ProviderIds,ProductionYear,DateCreated,People"),
                    ("StartIndex", &start),
                    ("Limit", &limit),
                ],
            )
            .await?;

        let total = data["TotalRecordCount"].as_u64().unwrap_or(0) as usize;
        let items = data["Items"]
            .as_array()
            .map(|arr| arr.iter().map(parse_movie_item).collect())
            .unwrap_or_default();

        Ok(MoviePage { items, total })
    }

    async fn fetch_poster(
        &self,
        item_id: &str,
    ) -> Result<(Vec<u8>, Option<String>), RemoteError> {
        self.fetch_poster_inner(item_id).await
    }
}

fn parse_movie_item(item: &serde_json::Value) -> RemoteMovie {
    let date_added = item["DateCreated"]
        .as_str()
        .and_then(|d| d.get(..10))
        .map(|s| s.to_string());

    RemoteMovie {
        external_id: item["Id"].as_str().unwrap_or_default().to_string(),
        title: item["Name"].as_str().unwrap_or_default().to_string(),
        year: item["ProductionYear"].as_i64(),
        date_added,
        actors: extract_actors(item.get("People")),
    }
}

fn extract_actors(people: Option<&serde_json::Value>) -> Vec<ActorRef> {
    let Some(people) = people.and_then(|p| p.as_array()) else {
        return Vec::new();
    };

    people
        .iter()
        .filter(|p| p["Type"].as_str() == Some("Actor"))
        .filter_map(|p| {
            let name = p["Name"].as_str()?.to_string();
            let external_id = p["ProviderIds"]
                .as_object()
                .and_then(|ids| ids.values().next())
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Some(ActorRef { name, external_id })
        })
        .collect()
}
