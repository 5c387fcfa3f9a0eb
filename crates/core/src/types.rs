use serde::{Deserialize, Serialize};

/// Rating cache state stored in the `movie.rating_state` column.
///
/// `NotFound` is a sentinel: the external site was queried and had no entry
/// for the code, so the code is not re-queried on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingState {
    Unknown,
    Rated,
    NotFound,
}

impl RatingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Rated => "rated",
            Self::NotFound => "not_found",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "rated" => Self::Rated,
            "not_found" => Self::NotFound,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for RatingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One credited actor on a movie, in billing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

/// A configured rank list: a static, externally curated "top N" CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankList {
    pub name: String,
    pub path: String,
    pub annual: bool,
}

impl RankList {
    /// A list is annual when its display name carries a standalone
    /// four-digit year, e.g. "JavDB 2024 TOP250".
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        let name = name.into();
        let annual = name
            .split(|c: char| !c.is_ascii_digit())
            .any(|run| run.len() == 4 && run.parse::<u16>().is_ok_and(|y| (1900..=2100).contains(&y)));
        Self {
            name,
            path: path.into(),
            annual,
        }
    }
}
