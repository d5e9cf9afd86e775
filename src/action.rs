use crate::error::ShelfError;
use crate::feed::{FeedSource, RetrievalMode, ViewMode};
use crate::types::{Page, Profile, SessionUser};

/// Which free-text filter is being typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Search,
    Tags,
}

#[derive(Debug, Clone)]
pub enum Action {
    Init,
    Tick,
    Quit,
    Back,
    Resize(u16, u16),
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
    PageUp,
    PageDown,
    GoToTop,
    GoToBottom,
    Select,
    NextTab,
    PrevTab,
    SwitchTab(FeedSource),

    // Feed
    ToggleViewMode,
    ViewModeChanged(ViewMode),
    ToggleInfiniteScroll,
    LoadMore,
    Refresh,
    FeedPageLoaded {
        source: FeedSource,
        mode: RetrievalMode,
        generation: u64,
        result: Result<Page, String>,
    },

    // Filters
    EnterInput(InputKind),
    Input(char),
    InputBackspace,
    InputConfirm,
    InputCancel,
    ClearFilters,
    CycleType,
    FlipSort,

    // Follow
    ToggleFollow,
    FollowSettled {
        user_id: String,
        result: Result<(), String>,
    },
    FollowChanged {
        user_id: String,
        following: bool,
    },

    // Profile
    OpenProfile(String),
    OpenOwnProfile,
    ProfileLoaded(Box<Profile>),
    EditProfile,
    /// Handled by the main loop: the terminal is released while the editor runs
    SuspendForEditor(String),
    EditorClosed(Result<String, String>),
    ProfileSaved(SessionUser),
    ProfileSaveFailed(String),

    // Polish
    OpenInBrowser,
    YankUrl,
    DismissPopup,

    Error(String),
    None,
}

impl From<ShelfError> for Action {
    fn from(err: ShelfError) -> Self {
        Action::Error(err.to_string())
    }
}
