use async_trait::async_trait;

use crate::error::Result;
use crate::feed::FeedSource;
use crate::types::{FeedFilters, Page, Profile, ProfileUpdate, SessionUser};

/// Everything the client needs from the PixelShelf backend.
#[async_trait]
pub trait ShelfApi: Send + Sync + std::fmt::Debug {
    fn web_url(&self, path: &str) -> String;

    /// The signed-in user, or `None` when the token is missing or rejected
    async fn current_user(&self) -> Result<Option<SessionUser>>;

    /// One page of a feed. `cursor` is `None` for the first page.
    async fn fetch_page(
        &self,
        source: FeedSource,
        filters: &FeedFilters,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page>;

    async fn follow(&self, user_id: &str) -> Result<()>;
    async fn unfollow(&self, user_id: &str) -> Result<()>;

    async fn get_profile(&self, username: &str) -> Result<Profile>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<SessionUser>;
}
