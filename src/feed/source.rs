use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::SortOrder;

/// Feed tab selection. Each source is paginated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    #[default]
    Trending,
    Following,
    Assets,
    Creators,
}

impl FeedSource {
    pub const ALL: [FeedSource; 4] = [
        FeedSource::Trending,
        FeedSource::Following,
        FeedSource::Assets,
        FeedSource::Creators,
    ];

    /// Parse a tab identifier. Unknown identifiers fall back to trending.
    pub fn from_tab(tab: &str) -> Self {
        match tab.trim().to_ascii_lowercase().as_str() {
            "following" => FeedSource::Following,
            "assets" => FeedSource::Assets,
            "creators" => FeedSource::Creators,
            _ => FeedSource::Trending,
        }
    }

    pub fn index(self) -> usize {
        match self {
            FeedSource::Trending => 0,
            FeedSource::Following => 1,
            FeedSource::Assets => 2,
            FeedSource::Creators => 3,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Whether the source can only be fetched with a signed-in session
    pub fn requires_session(self) -> bool {
        matches!(self, FeedSource::Following)
    }

    pub fn default_sort(self) -> SortOrder {
        match self {
            FeedSource::Trending | FeedSource::Creators => SortOrder::Popular,
            FeedSource::Following | FeedSource::Assets => SortOrder::Latest,
        }
    }

    pub fn following_only(self) -> bool {
        matches!(self, FeedSource::Following)
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Trending => write!(f, "Trending"),
            FeedSource::Following => write!(f, "Following"),
            FeedSource::Assets => write!(f, "Assets"),
            FeedSource::Creators => write!(f, "Creators"),
        }
    }
}
