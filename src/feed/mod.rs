//! Multi-source feed: per-source paginated queries, the view state that
//! decides how they are laid out, and the scroll trigger that pages them.

mod manager;
mod query;
mod scroll;
mod source;
mod view;

pub use manager::{ActiveFeed, FeedManager};
pub use query::{Applied, FeedQuery, FetchRequest, RetrievalMode};
pub use scroll::{ScrollTrigger, Viewport};
pub use source::FeedSource;
pub use view::{Breakpoint, GridLayout, ViewMode, ViewState};
