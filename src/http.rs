use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::api::ShelfApi;
use crate::error::{Result, ShelfError};
use crate::feed::FeedSource;
use crate::types::{
    Asset, Creator, FeedFilters, Item, Page, Profile, ProfileUpdate, SessionUser, SocialLinks,
};

/// REST client for the PixelShelf API
pub struct HttpApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpApi {
    pub fn new(base_url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("pixelshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShelfError::Api(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorized(request).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ShelfError::Auth("session expired or token rejected".to_string()));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ShelfError::Api(format!(
                "PixelShelf API {}: {}",
                status,
                error_message(&text)
            )));
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "GET");
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }
}

/// Pull `{"error": "..."}` out of an error body, or fall back to the raw text
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct PsError {
        error: Option<String>,
        message: Option<String>,
    }

    serde_json::from_str::<PsError>(body)
        .ok()
        .and_then(|e| e.error.or(e.message))
        .unwrap_or_else(|| body.trim().to_string())
}

// PixelShelf API response types

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsPage<T> {
    items: Vec<T>,
    next_cursor: Option<String>,
    has_more: Option<bool>,
    pagination: Option<PsPagination>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsPagination {
    page: u32,
    has_more: Option<bool>,
    total_pages: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsAsset {
    id: String,
    title: String,
    description: Option<String>,
    #[serde(rename = "type")]
    asset_type: Option<String>,
    tags: Option<Vec<String>>,
    user: Option<PsUserRef>,
    likes: Option<u32>,
    comments: Option<u32>,
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct PsUserRef {
    username: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsCreator {
    id: String,
    name: Option<String>,
    username: String,
    bio: Option<String>,
    followers: Option<u32>,
    assets: Option<u32>,
    is_following: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsProfile {
    id: String,
    name: Option<String>,
    username: String,
    bio: Option<String>,
    location: Option<String>,
    social: Option<SocialLinks>,
    image: Option<String>,
    banner_image: Option<String>,
    followers: Option<u32>,
    following: Option<u32>,
    is_following: Option<bool>,
}

#[derive(Deserialize)]
struct PsSessionUser {
    id: String,
    name: Option<String>,
    username: String,
    image: Option<String>,
}

#[derive(Deserialize)]
struct PsSession {
    user: Option<PsSessionUser>,
}

impl From<PsSessionUser> for SessionUser {
    fn from(u: PsSessionUser) -> Self {
        SessionUser {
            name: u.name.unwrap_or_else(|| u.username.clone()),
            id: u.id,
            username: u.username,
            image: u.image.filter(|i| !i.is_empty()),
        }
    }
}

fn parse_datetime(s: Option<&str>) -> chrono::DateTime<chrono::Utc> {
    s.and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now)
}

fn source_path(source: FeedSource) -> &'static str {
    match source {
        FeedSource::Trending => "/assets/trending",
        FeedSource::Following => "/feed/following",
        FeedSource::Assets => "/assets",
        FeedSource::Creators => "/users",
    }
}

/// Continuation as the endpoint expressed it. Stored in `Page::next_cursor`
/// with its style so an opaque token is never mistaken for a page number.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Token(String),
    Page(u32),
}

impl Cursor {
    fn encode(&self) -> String {
        match self {
            Cursor::Token(token) => format!("cursor:{}", token),
            Cursor::Page(page) => format!("page:{}", page),
        }
    }

    fn decode(raw: &str) -> Self {
        if let Some(page) = raw.strip_prefix("page:").and_then(|p| p.parse().ok()) {
            return Cursor::Page(page);
        }
        Cursor::Token(raw.strip_prefix("cursor:").unwrap_or(raw).to_string())
    }
}

/// Query string for a page request
fn page_query(filters: &FeedFilters, cursor: Option<&str>, limit: u32) -> String {
    let mut params = vec![
        format!("limit={}", limit),
        format!("sort={}", filters.sort.as_api_str()),
    ];
    match cursor.map(Cursor::decode) {
        Some(Cursor::Page(page)) => params.push(format!("page={}", page)),
        Some(Cursor::Token(token)) => {
            params.push(format!("cursor={}", urlencoding::encode(&token)))
        }
        None => {}
    }
    if let Some(search) = &filters.search {
        params.push(format!("search={}", urlencoding::encode(search)));
    }
    if let Some(tag) = &filters.tag {
        params.push(format!("tag={}", urlencoding::encode(tag)));
    }
    if let Some(asset_type) = &filters.asset_type {
        params.push(format!("type={}", urlencoding::encode(asset_type)));
    }
    if filters.following_only {
        params.push("following=true".to_string());
    }
    params.join("&")
}

/// Next cursor from whichever pagination style the endpoint answered with
fn next_cursor<T>(page: &PsPage<T>, requested: Option<&str>) -> Option<String> {
    if let Some(cursor) = page.next_cursor.as_ref().filter(|c| !c.is_empty()) {
        return Some(Cursor::Token(cursor.clone()).encode());
    }
    if let Some(p) = &page.pagination {
        let more = p
            .has_more
            .or_else(|| p.total_pages.map(|total| p.page < total))
            .unwrap_or(false);
        return more.then(|| Cursor::Page(p.page + 1).encode());
    }
    if page.has_more == Some(true) {
        let current = match requested.map(Cursor::decode) {
            Some(Cursor::Page(page)) => page,
            _ => 1,
        };
        return Some(Cursor::Page(current + 1).encode());
    }
    None
}

fn asset_item(base_url: &str, a: PsAsset) -> Item {
    let author = a
        .user
        .and_then(|u| u.username.or(u.name))
        .unwrap_or_else(|| "unknown".to_string());
    Item::Asset(Asset {
        url: format!("{}/assets/{}", base_url, a.id),
        id: a.id,
        title: a.title,
        description: a.description.filter(|d| !d.is_empty()),
        asset_type: a.asset_type.unwrap_or_default(),
        tags: a.tags.unwrap_or_default(),
        author,
        likes: a.likes.unwrap_or(0),
        comments: a.comments.unwrap_or(0),
        created_at: parse_datetime(a.created_at.as_deref()),
    })
}

fn creator_item(base_url: &str, c: PsCreator) -> Item {
    Item::Creator(Creator {
        url: format!("{}/u/{}", base_url, c.username),
        name: c.name.unwrap_or_else(|| c.username.clone()),
        id: c.id,
        username: c.username,
        bio: c.bio.filter(|b| !b.is_empty()),
        followers: c.followers.unwrap_or(0),
        assets: c.assets.unwrap_or(0),
        is_following: c.is_following.unwrap_or(false),
    })
}

fn into_page<T>(
    page: PsPage<T>,
    requested: Option<&str>,
    to_item: impl Fn(T) -> Item,
) -> Page {
    let next_cursor = next_cursor(&page, requested);
    Page {
        items: page.items.into_iter().map(to_item).collect(),
        next_cursor,
    }
}

#[async_trait]
impl ShelfApi for HttpApi {
    fn web_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn current_user(&self) -> Result<Option<SessionUser>> {
        if self.token.is_none() {
            return Ok(None);
        }
        let url = self.api_url("/auth/session");
        match self.get_json::<PsSession>(&url).await {
            Ok(session) => Ok(session.user.map(SessionUser::from)),
            Err(ShelfError::Auth(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_page(
        &self,
        source: FeedSource,
        filters: &FeedFilters,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page> {
        let url = self.api_url(&format!(
            "{}?{}",
            source_path(source),
            page_query(filters, cursor, limit)
        ));

        let page = match source {
            FeedSource::Creators => {
                let page: PsPage<PsCreator> = self.get_json(&url).await?;
                into_page(page, cursor, |c| creator_item(&self.base_url, c))
            }
            _ => {
                let page: PsPage<PsAsset> = self.get_json(&url).await?;
                into_page(page, cursor, |a| asset_item(&self.base_url, a))
            }
        };
        debug!(%source, items = page.items.len(), more = page.next_cursor.is_some(), "page fetched");
        Ok(page)
    }

    async fn follow(&self, user_id: &str) -> Result<()> {
        let url = self.api_url(&format!("/users/{}/follow", urlencoding::encode(user_id)));
        self.send(self.client.post(&url)).await?;
        Ok(())
    }

    async fn unfollow(&self, user_id: &str) -> Result<()> {
        let url = self.api_url(&format!("/users/{}/follow", urlencoding::encode(user_id)));
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn get_profile(&self, username: &str) -> Result<Profile> {
        let url = self.api_url(&format!("/users/{}", urlencoding::encode(username)));
        let p: PsProfile = self.get_json(&url).await?;

        Ok(Profile {
            name: p.name.unwrap_or_else(|| p.username.clone()),
            id: p.id,
            username: p.username,
            bio: p.bio.filter(|b| !b.is_empty()),
            location: p.location.filter(|l| !l.is_empty()),
            social: p.social.unwrap_or_default(),
            image: p.image.filter(|i| !i.is_empty()),
            banner_image: p.banner_image.filter(|i| !i.is_empty()),
            followers: p.followers.unwrap_or(0),
            following: p.following.unwrap_or(0),
            is_following: p.is_following.unwrap_or(false),
        })
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<SessionUser> {
        let url = self.api_url("/user/profile");
        let response = self.send(self.client.put(&url).json(update)).await?;
        let user: PsSessionUser = response.json().await?;
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortOrder;

    #[test]
    fn page_query_includes_only_set_filters() {
        let filters = FeedFilters {
            search: Some("dark forest".to_string()),
            tag: Some("pixel-art".to_string()),
            asset_type: None,
            sort: SortOrder::Latest,
            following_only: true,
        };
        assert_eq!(
            page_query(&filters, None, 20),
            "limit=20&sort=latest&search=dark%20forest&tag=pixel-art&following=true"
        );
    }

    #[test]
    fn page_query_distinguishes_page_numbers_from_cursors() {
        let filters = FeedFilters::default();
        assert_eq!(
            page_query(&filters, Some("page:3"), 10),
            "limit=10&sort=popular&page=3"
        );
        assert_eq!(
            page_query(&filters, Some("cursor:abc=="), 10),
            "limit=10&sort=popular&cursor=abc%3D%3D"
        );
    }

    #[test]
    fn numeric_token_cursor_stays_a_cursor() {
        let json = r#"{"items": [], "nextCursor": "1024"}"#;
        let page: PsPage<PsAsset> = serde_json::from_str(json).unwrap();
        let cursor = next_cursor(&page, None).unwrap();
        assert_eq!(
            page_query(&FeedFilters::default(), Some(&cursor), 20),
            "limit=20&sort=popular&cursor=1024"
        );
    }

    #[test]
    fn cursor_style_page_decodes() {
        let json = r#"{
            "items": [
                {"id": "a1", "title": "Slime", "type": "2d", "tags": ["rpg"],
                 "user": {"username": "ada"}, "likes": 3,
                 "createdAt": "2024-05-01T10:00:00Z"}
            ],
            "nextCursor": "a1"
        }"#;
        let page: PsPage<PsAsset> = serde_json::from_str(json).unwrap();
        let page = into_page(page, None, |a| asset_item("https://ps.test", a));

        assert_eq!(page.next_cursor.as_deref(), Some("cursor:a1"));
        let Item::Asset(asset) = &page.items[0] else {
            panic!("expected an asset");
        };
        assert_eq!(asset.author, "ada");
        assert_eq!(asset.url, "https://ps.test/assets/a1");
        assert_eq!(asset.likes, 3);
        assert_eq!(asset.comments, 0);
    }

    #[test]
    fn numbered_pagination_derives_next_page() {
        let json = r#"{
            "items": [{"id": "u1", "username": "bob", "isFollowing": true}],
            "pagination": {"page": 2, "totalPages": 3}
        }"#;
        let page: PsPage<PsCreator> = serde_json::from_str(json).unwrap();
        let page = into_page(page, Some("page:2"), |c| creator_item("https://ps.test", c));
        assert_eq!(page.next_cursor.as_deref(), Some("page:3"));

        let Item::Creator(creator) = &page.items[0] else {
            panic!("expected a creator");
        };
        assert_eq!(creator.name, "bob");
        assert!(creator.is_following);
    }

    #[test]
    fn last_numbered_page_has_no_cursor() {
        let json = r#"{"items": [], "pagination": {"page": 3, "totalPages": 3}}"#;
        let page: PsPage<PsCreator> = serde_json::from_str(json).unwrap();
        assert_eq!(next_cursor(&page, Some("page:3")), None);
    }

    #[test]
    fn bare_has_more_counts_from_requested_page() {
        let json = r#"{"items": [], "hasMore": true}"#;
        let page: PsPage<PsAsset> = serde_json::from_str(json).unwrap();
        assert_eq!(next_cursor(&page, None).as_deref(), Some("page:2"));
        assert_eq!(next_cursor(&page, Some("page:4")).as_deref(), Some("page:5"));
    }

    #[test]
    fn malformed_page_fails_to_decode() {
        assert!(serde_json::from_str::<PsPage<PsAsset>>(r#"{"assets": []}"#).is_err());
    }

    #[test]
    fn error_message_prefers_json_error_field() {
        assert_eq!(error_message(r#"{"error":"Not allowed"}"#), "Not allowed");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }
}
