//! Actor update-feed client.
//!
//! Fetches a per-actor RSS feed from an aggregation endpoint and parses
//! `<item>` title/pubDate pairs with a streaming XML reader.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::debug;

use crate::{FeedItem, FeedSource, RemoteError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct FeedClient {
    base_url: String,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for FeedClient {
    async fn fetch_feed(&self, actor_name: &str) -> Result<Vec<FeedItem>, RemoteError> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(actor_name));
        debug!(url = %url, actor = actor_name, "feed request");

        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(RemoteError::Provider(format!(
                "feed source returned {}",
                resp.status()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        parse_feed(&body)
    }
}

/// Parse an RSS document into feed items. Channel-level titles are ignored;
/// only `<item>` children count.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedItem>, RemoteError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut buf = Vec::new();

    let mut current_item: Option<ItemBuilder> = None;
    let mut current_element = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    current_item = Some(ItemBuilder::default());
                }
                current_element = name;
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    if let Some(builder) = current_item.take() {
                        if let Some(item) = builder.build() {
                            items.push(item);
                        }
                    }
                }
                current_element.clear();
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut item) = current_item {
                    let text = e.unescape().unwrap_or_default().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match current_element.as_str() {
                        "title" => item.title = Some(text),
                        "pubDate" => item.published_at = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(ref mut item) = current_item {
                    let text = String::from_utf8_lossy(&e).to_string();
                    if current_element == "title" && !text.is_empty() {
                        item.title = Some(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(RemoteError::Provider(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    published_at: Option<String>,
}

impl ItemBuilder {
    fn build(self) -> Option<FeedItem> {
        Some(FeedItem {
            title: self.title?,
            // pubDate is optional in RSS; an empty stamp still dedups.
            published_at: self.published_at.unwrap_or_default(),
        })
    }
}
