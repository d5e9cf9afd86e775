use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Popular,
    Latest,
}

impl SortOrder {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            SortOrder::Popular => "popular",
            SortOrder::Latest => "latest",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Popular => SortOrder::Latest,
            SortOrder::Latest => SortOrder::Popular,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Popular => write!(f, "Popular"),
            SortOrder::Latest => write!(f, "Latest"),
        }
    }
}

/// Filters sent with every page request for one source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedFilters {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub asset_type: Option<String>,
    pub sort: SortOrder,
    pub following_only: bool,
}

/// A game-dev asset posted by a creator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub asset_type: String,
    pub tags: Vec<String>,
    pub author: String,
    pub likes: u32,
    pub comments: u32,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// A creator as listed in the creators feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub name: String,
    pub username: String,
    pub bio: Option<String>,
    pub followers: u32,
    pub assets: u32,
    pub is_following: bool,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Asset(Asset),
    Creator(Creator),
}

impl Item {
    pub fn id(&self) -> &str {
        match self {
            Item::Asset(a) => &a.id,
            Item::Creator(c) => &c.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Item::Asset(a) => &a.title,
            Item::Creator(c) => &c.name,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Item::Asset(a) => &a.url,
            Item::Creator(c) => &c.url,
        }
    }
}

/// One page of a feed. The cursor is opaque and only meaningful to the API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub items: Vec<Item>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub linkedin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub social: SocialLinks,
    pub image: Option<String>,
    pub banner_image: Option<String>,
    pub followers: u32,
    pub following: u32,
    pub is_following: bool,
}

/// Payload of a profile update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: String,
    pub username: String,
    pub bio: String,
    pub location: String,
    pub social: SocialLinks,
    pub image: Option<String>,
    pub banner_image: Option<String>,
}

/// The signed-in user as known to the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub username: String,
    pub image: Option<String>,
}
