use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::{Action, InputKind};
use crate::api::ShelfApi;
use crate::cache;
use crate::config::Config;
use crate::event::Event;
use crate::feed::{
    Applied, Breakpoint, FeedManager, FeedQuery, FeedSource, FetchRequest, GridLayout,
    RetrievalMode, ScrollTrigger, ViewState, Viewport,
};
use crate::follow::{FollowEdge, Settlement, ToggleOutcome};
use crate::profile::{self, FieldError, ProfileForm};
use crate::session::Session;
use crate::types::{Item, Page, Profile, ProfileUpdate};

/// Card heights in terminal rows, borders included
pub const GRID_CARD_HEIGHT: usize = 6;
pub const LIST_CARD_HEIGHT: usize = 3;
/// Header, tabs, filter bar, feed footer and status bar
const CHROME_HEIGHT: u16 = 1 + 3 + 1 + 1 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Feed,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    SignIn,
    Validation(Vec<FieldError>),
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub is_error: bool,
    expires_at: Instant,
}

/// How the feed occupies the content area at the current terminal size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedGeometry {
    pub layout: GridLayout,
    pub columns: usize,
    pub card_height: usize,
    pub visible_rows: usize,
}

pub struct App {
    pub screen: Screen,
    pub config: Config,
    pub session: Session,
    pub feeds: FeedManager,
    pub view: ViewState,
    pub trigger: ScrollTrigger,
    pub follow_edges: HashMap<String, FollowEdge>,

    // Feed screen
    pub selected: usize,
    pub scroll_row: usize,
    pub input: Option<(InputKind, String)>,

    // Profile screen
    pub profile: Option<Profile>,
    pub profile_loading: bool,
    requested_profile: Option<String>,

    pub popup: Option<Popup>,
    pub notification: Option<Notification>,
    pub saving_profile: bool,
    pub should_quit: bool,
    pub width: u16,
    pub height: u16,
    api: Arc<dyn ShelfApi>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    pub fn new(
        api: Arc<dyn ShelfApi>,
        session: Session,
        config: Config,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        let mut view = ViewState::new(&config.feed);
        let tx = action_tx.clone();
        view.on_view_mode_change(move |mode| {
            tx.send(Action::ViewModeChanged(mode)).ok();
        });

        Self {
            screen: Screen::Feed,
            feeds: FeedManager::new(&config.feed),
            trigger: ScrollTrigger::new(config.feed.infinite_scroll, config.feed.prefetch_rows),
            view,
            config,
            session,
            follow_edges: HashMap::new(),
            selected: 0,
            scroll_row: 0,
            input: None,
            profile: None,
            profile_loading: false,
            requested_profile: None,
            popup: None,
            notification: None,
            saving_profile: false,
            should_quit: false,
            width: 80,
            height: 24,
            api,
            action_tx,
        }
    }

    pub fn web_url(&self, path: &str) -> String {
        self.api.web_url(path)
    }

    pub fn active_query(&self) -> &FeedQuery {
        self.feeds.query(self.feeds.active(), self.feeds.mode())
    }

    pub fn selected_item(&self) -> Option<&Item> {
        self.active_query().items().nth(self.selected)
    }

    /// Label and pending flag of the follow control for `user_id`, or `None`
    /// when no control is shown. Falls back to the feed's baseline until an
    /// edge exists.
    pub fn follow_control(&self, user_id: &str, baseline: bool) -> Option<(&'static str, bool)> {
        match self.follow_edges.get(user_id) {
            Some(edge) => edge
                .is_rendered(&self.session)
                .then(|| (edge.label(), edge.is_pending())),
            None if self.session.is_self(user_id) => None,
            None if baseline => Some(("Following", false)),
            None => Some(("Follow", false)),
        }
    }

    pub fn feed_geometry(&self) -> FeedGeometry {
        let layout = self.view.layout(Breakpoint::from_width(self.width));
        let card_height = match layout {
            GridLayout::Columns(_) => GRID_CARD_HEIGHT,
            GridLayout::List { .. } | GridLayout::SidecardColumn => LIST_CARD_HEIGHT,
        };
        let content = self.height.saturating_sub(CHROME_HEIGHT) as usize;
        FeedGeometry {
            layout,
            columns: layout.columns(),
            card_height,
            visible_rows: (content / card_height).max(1),
        }
    }

    pub fn handle_event(&self, event: Event) -> Action {
        match event {
            Event::Init => Action::Init,
            Event::Tick => Action::Tick,
            Event::Resize(width, height) => Action::Resize(width, height),
            Event::Key(key) => self.handle_key(key),
            Event::Render => Action::None,
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Action {
        if self.input.is_some() {
            return match key.code {
                KeyCode::Enter => Action::InputConfirm,
                KeyCode::Esc => Action::InputCancel,
                KeyCode::Backspace => Action::InputBackspace,
                KeyCode::Char(c) => Action::Input(c),
                _ => Action::None,
            };
        }

        if let Some(popup) = &self.popup {
            return match (popup, key.code) {
                (Popup::Validation(_), KeyCode::Char('e')) => Action::EditProfile,
                _ => Action::DismissPopup,
            };
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let on_feed = self.screen == Screen::Feed;

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if on_feed {
                    Action::Quit
                } else {
                    Action::Back
                }
            }
            KeyCode::Char('d') if ctrl => Action::PageDown,
            KeyCode::Char('u') if ctrl => Action::PageUp,
            KeyCode::PageDown => Action::PageDown,
            KeyCode::PageUp => Action::PageUp,
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::Char('h') | KeyCode::Left => Action::ScrollLeft,
            KeyCode::Char('l') | KeyCode::Right => Action::ScrollRight,
            KeyCode::Char('g') | KeyCode::Home => Action::GoToTop,
            KeyCode::Char('G') | KeyCode::End => Action::GoToBottom,
            KeyCode::Enter => Action::Select,
            KeyCode::Tab if on_feed => Action::NextTab,
            KeyCode::BackTab if on_feed => Action::PrevTab,
            KeyCode::Char(c @ '1'..='4') if on_feed => {
                let index = c as usize - '1' as usize;
                Action::SwitchTab(FeedSource::ALL[index])
            }
            KeyCode::Char('/') if on_feed => Action::EnterInput(InputKind::Search),
            KeyCode::Char('#') if on_feed => Action::EnterInput(InputKind::Tags),
            KeyCode::Char('c') if on_feed => Action::ClearFilters,
            KeyCode::Char('y') if on_feed => Action::CycleType,
            KeyCode::Char('s') if on_feed => Action::FlipSort,
            KeyCode::Char('v') if on_feed => Action::ToggleViewMode,
            KeyCode::Char('i') if on_feed => Action::ToggleInfiniteScroll,
            KeyCode::Char('m') if on_feed => Action::LoadMore,
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('f') => Action::ToggleFollow,
            KeyCode::Char('o') => Action::OpenInBrowser,
            KeyCode::Char('Y') => Action::YankUrl,
            KeyCode::Char('p') => Action::OpenOwnProfile,
            KeyCode::Char('e') => Action::EditProfile,
            _ => Action::None,
        }
    }

    pub fn update(&mut self, action: Action) {
        match action {
            Action::Init => {
                self.trigger.attach();
                let requests = self.feeds.sync(&self.session);
                self.dispatch(requests);
            }
            Action::Tick => {
                if self
                    .notification
                    .as_ref()
                    .is_some_and(|n| Instant::now() >= n.expires_at)
                {
                    self.notification = None;
                }
            }
            Action::Quit => {
                self.teardown();
                self.should_quit = true;
            }
            Action::Back => match self.screen {
                Screen::Feed => {
                    self.teardown();
                    self.should_quit = true;
                }
                Screen::Profile => {
                    self.screen = Screen::Feed;
                    self.profile = None;
                    self.profile_loading = false;
                    self.requested_profile = None;
                    self.check_scroll_trigger();
                }
            },
            Action::Resize(width, height) => {
                self.width = width;
                self.height = height;
                self.ensure_visible();
                self.check_scroll_trigger();
            }

            // Selection
            Action::ScrollUp => {
                let columns = self.feed_geometry().columns as isize;
                self.move_selection(-columns);
            }
            Action::ScrollDown => {
                let columns = self.feed_geometry().columns as isize;
                self.move_selection(columns);
            }
            Action::ScrollLeft => self.move_selection(-1),
            Action::ScrollRight => self.move_selection(1),
            Action::PageUp => {
                let geometry = self.feed_geometry();
                self.move_selection(-((geometry.visible_rows * geometry.columns) as isize));
            }
            Action::PageDown => {
                let geometry = self.feed_geometry();
                self.move_selection((geometry.visible_rows * geometry.columns) as isize);
            }
            Action::GoToTop => self.move_selection(isize::MIN / 2),
            Action::GoToBottom => self.move_selection(isize::MAX / 2),
            Action::Select => {
                if self.screen != Screen::Feed {
                    return;
                }
                match self.selected_item() {
                    Some(Item::Creator(creator)) => {
                        let username = creator.username.clone();
                        self.update(Action::OpenProfile(username));
                    }
                    Some(Item::Asset(_)) => self.open_in_browser(),
                    None => {}
                }
            }

            // Tabs
            Action::NextTab => self.switch_tab(self.feeds.active().next()),
            Action::PrevTab => self.switch_tab(self.feeds.active().prev()),
            Action::SwitchTab(source) => self.switch_tab(source),

            // Feed
            Action::ToggleViewMode => self.view.toggle_view_mode(),
            Action::ViewModeChanged(mode) => {
                self.ensure_visible();
                self.check_scroll_trigger();
                self.notify(format!("{} view", mode));
            }
            Action::ToggleInfiniteScroll => {
                let infinite = !self.config.feed.infinite_scroll;
                self.config.feed.infinite_scroll = infinite;
                self.view.reconfigure(&self.config.feed);
                self.trigger.set_enabled(infinite);
                self.trigger.attach();
                self.reset_selection();
                let requests = self.feeds.set_infinite_scroll(infinite, &self.session);
                self.dispatch(requests);
                self.notify(if infinite {
                    "Infinite scroll on"
                } else {
                    "Paged mode: press m to load more"
                });
            }
            Action::LoadMore => {
                if let Some(request) = self.feeds.load_more() {
                    self.spawn_fetch(request);
                }
            }
            Action::Refresh => match self.screen {
                Screen::Feed => {
                    let source = self.feeds.active();
                    if let Some(request) = self.feeds.refresh(source) {
                        self.reset_selection();
                        self.trigger.rearm();
                        self.spawn_fetch(request);
                    }
                }
                Screen::Profile => {
                    if let Some(username) = self.requested_profile.clone() {
                        self.open_profile(username);
                    }
                }
            },
            Action::FeedPageLoaded {
                source,
                mode,
                generation,
                result,
            } => self.on_page_loaded(source, mode, generation, result),

            // Filters
            Action::EnterInput(kind) => {
                let current = match kind {
                    InputKind::Search => self.feeds.search().unwrap_or_default().to_string(),
                    InputKind::Tags => self.feeds.selected_tags().join(", "),
                };
                self.input = Some((kind, current));
            }
            Action::Input(c) => {
                if let Some((_, buffer)) = self.input.as_mut() {
                    buffer.push(c);
                }
            }
            Action::InputBackspace => {
                if let Some((_, buffer)) = self.input.as_mut() {
                    buffer.pop();
                }
            }
            Action::InputCancel => self.input = None,
            Action::InputConfirm => {
                let Some((kind, buffer)) = self.input.take() else {
                    return;
                };
                let requests = match kind {
                    InputKind::Search => self.feeds.set_search(Some(buffer), &self.session),
                    InputKind::Tags => {
                        let tags = buffer.split(',').map(str::to_string).collect();
                        self.feeds.set_tags(tags, &self.session)
                    }
                };
                self.apply_filter_change(requests);
            }
            Action::ClearFilters => {
                let requests = self.feeds.clear_filters(&self.session);
                self.apply_filter_change(requests);
            }
            Action::CycleType => {
                let types = &self.config.feed.asset_types;
                let next = match self.feeds.selected_type() {
                    None => types.first().cloned(),
                    Some(current) => types
                        .iter()
                        .position(|t| t == current)
                        .and_then(|i| types.get(i + 1))
                        .cloned(),
                };
                let requests = self.feeds.set_type(next, &self.session);
                self.apply_filter_change(requests);
            }
            Action::FlipSort => {
                let requests = self.feeds.flip_sort(&self.session);
                self.apply_filter_change(requests);
            }

            // Follow
            Action::ToggleFollow => self.toggle_follow(),
            Action::FollowSettled { user_id, result } => {
                let Some(edge) = self.follow_edges.get_mut(&user_id) else {
                    return;
                };
                if let Some(Settlement::RolledBack { error, .. }) = edge.settle(result) {
                    self.notify_error(format!("Could not update follow: {}", error));
                }
            }
            Action::FollowChanged { user_id, following } => {
                if let Some(profile) = self.profile.as_mut().filter(|p| p.id == user_id) {
                    profile.is_following = following;
                    profile.followers = if following {
                        profile.followers.saturating_add(1)
                    } else {
                        profile.followers.saturating_sub(1)
                    };
                }
                if let Some(request) = self.feeds.refresh(FeedSource::Following) {
                    self.spawn_fetch(request);
                }
            }

            // Profile
            Action::OpenProfile(username) => self.open_profile(username),
            Action::OpenOwnProfile => match self.session.current_user() {
                Some(user) => {
                    let username = user.username.clone();
                    self.open_profile(username);
                }
                None => self.popup = Some(Popup::SignIn),
            },
            Action::ProfileLoaded(profile) => {
                let wanted = self
                    .requested_profile
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(&profile.username));
                if self.screen != Screen::Profile || !wanted {
                    debug!(username = %profile.username, "ignoring profile that is no longer shown");
                    return;
                }
                self.profile_loading = false;
                self.edge(&profile.id, profile.is_following)
                    .sync_baseline(profile.is_following);
                self.profile = Some(*profile);
            }
            Action::EditProfile => self.edit_profile(),
            Action::SuspendForEditor(_) => {
                warn!("editor request reached the reducer; the main loop handles it");
            }
            Action::EditorClosed(result) => self.on_editor_closed(result),
            Action::ProfileSaved(user) => {
                self.saving_profile = false;
                cache::remove(&cache::draft_key(&user.id));
                self.session.update(profile::session_patch(&user));
                self.notify("Profile updated");
                if self.screen == Screen::Profile
                    && self.profile.as_ref().is_some_and(|p| p.id == user.id)
                {
                    self.open_profile(user.username);
                }
            }
            Action::ProfileSaveFailed(message) => {
                self.saving_profile = false;
                self.notify_error(format!(
                    "Profile update failed: {} (draft kept, press e to retry)",
                    message
                ));
            }

            // Polish
            Action::OpenInBrowser => self.open_in_browser(),
            Action::YankUrl => {
                let Some(url) = self.current_url() else {
                    return;
                };
                match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(url.clone())) {
                    Ok(()) => self.notify(format!("Copied {}", url)),
                    Err(e) => self.notify_error(format!("Clipboard unavailable: {}", e)),
                }
            }
            Action::DismissPopup => self.popup = None,
            Action::Error(message) => {
                warn!(%message, "action failed");
                self.profile_loading = false;
                self.notify_error(message);
            }
            Action::None => {}
        }
    }

    fn teardown(&mut self) {
        self.trigger.disconnect();
        self.feeds.teardown();
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.set_notification(message.into(), false);
    }

    fn notify_error(&mut self, message: impl Into<String>) {
        self.set_notification(message.into(), true);
    }

    fn set_notification(&mut self, message: String, is_error: bool) {
        self.notification = Some(Notification {
            message,
            is_error,
            expires_at: Instant::now() + Duration::from_secs(self.config.ui.notification_secs),
        });
    }

    fn reset_selection(&mut self) {
        self.selected = 0;
        self.scroll_row = 0;
    }

    fn switch_tab(&mut self, source: FeedSource) {
        if source == self.feeds.active() {
            return;
        }
        self.reset_selection();
        let requests = self.feeds.set_active_tab(source, &self.session);
        self.trigger.rearm();
        self.dispatch(requests);
        self.check_scroll_trigger();
    }

    fn apply_filter_change(&mut self, requests: Vec<FetchRequest>) {
        self.reset_selection();
        self.trigger.rearm();
        self.dispatch(requests);
    }

    fn move_selection(&mut self, delta: isize) {
        if self.screen != Screen::Feed {
            return;
        }
        let len = self.active_query().len();
        if len == 0 {
            return;
        }
        let target = (self.selected as isize).saturating_add(delta);
        self.selected = target.clamp(0, len as isize - 1) as usize;
        self.ensure_visible();
        self.check_scroll_trigger();
    }

    /// Keep the selected card's row inside the viewport
    fn ensure_visible(&mut self) {
        let geometry = self.feed_geometry();
        let row = self.selected / geometry.columns;
        if row < self.scroll_row {
            self.scroll_row = row;
        } else if row >= self.scroll_row + geometry.visible_rows {
            self.scroll_row = row + 1 - geometry.visible_rows;
        }
    }

    /// Report the sentinel row (one past the last card row) to the trigger
    fn check_scroll_trigger(&mut self) {
        if self.screen != Screen::Feed {
            return;
        }
        let geometry = self.feed_geometry();
        let query = self.active_query();
        if query.is_loading() || query.len() == 0 {
            return;
        }
        let sentinel_row = query.len().div_ceil(geometry.columns);
        let (has_more, is_loading_more) = (query.has_more(), query.is_loading_more());
        let viewport = Viewport {
            first_row: self.scroll_row,
            rows: geometry.visible_rows,
        };

        if self
            .trigger
            .observe(viewport, sentinel_row, has_more, is_loading_more)
        {
            if let Some(request) = self.feeds.load_more() {
                self.spawn_fetch(request);
            }
        }
    }

    fn on_page_loaded(
        &mut self,
        source: FeedSource,
        mode: RetrievalMode,
        generation: u64,
        result: Result<Page, String>,
    ) {
        let baselines: Vec<(String, bool)> = match &result {
            Ok(page) => page
                .items
                .iter()
                .filter_map(|item| match item {
                    Item::Creator(c) => Some((c.id.clone(), c.is_following)),
                    Item::Asset(_) => None,
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        let succeeded = result.is_ok();
        if let Err(error) = &result {
            warn!(%source, %error, "feed page failed");
        }

        if self.feeds.apply(source, mode, generation, result) == Applied::Stale {
            return;
        }
        for (user_id, is_following) in baselines {
            if let Some(edge) = self.follow_edges.get_mut(&user_id) {
                edge.sync_baseline(is_following);
            }
        }

        if source == self.feeds.active() && mode == self.feeds.mode() {
            let len = self.active_query().len();
            self.selected = self.selected.min(len.saturating_sub(1));
            // A failed page waits for an explicit refresh
            if succeeded {
                self.trigger.rearm();
                self.check_scroll_trigger();
            }
        }
    }

    /// The edge for `user_id`, created from `baseline` on first use
    fn edge(&mut self, user_id: &str, baseline: bool) -> &mut FollowEdge {
        let tx = self.action_tx.clone();
        self.follow_edges
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let mut edge = FollowEdge::new(user_id, baseline);
                edge.on_follow_change(move |user_id, following| {
                    tx.send(Action::FollowChanged {
                        user_id: user_id.to_string(),
                        following,
                    })
                    .ok();
                });
                edge
            })
    }

    /// The user the follow control on screen points at, with its baseline
    fn follow_target(&self) -> Option<(String, bool)> {
        match self.screen {
            Screen::Feed => match self.selected_item()? {
                Item::Creator(c) => Some((c.id.clone(), c.is_following)),
                Item::Asset(_) => None,
            },
            Screen::Profile => self
                .profile
                .as_ref()
                .map(|p| (p.id.clone(), p.is_following)),
        }
    }

    fn toggle_follow(&mut self) {
        let Some((user_id, baseline)) = self.follow_target() else {
            return;
        };
        let session = self.session.clone();
        match self.edge(&user_id, baseline).toggle(&session) {
            ToggleOutcome::Mutate(mutation) => {
                self.spawn_follow(mutation.user_id, mutation.follow)
            }
            ToggleOutcome::SignInRequired => self.popup = Some(Popup::SignIn),
            ToggleOutcome::Busy | ToggleOutcome::Hidden | ToggleOutcome::Noop => {}
        }
    }

    fn open_profile(&mut self, username: String) {
        self.screen = Screen::Profile;
        self.profile = None;
        self.profile_loading = true;
        self.requested_profile = Some(username.clone());
        self.spawn_load_profile(username);
    }

    fn current_url(&self) -> Option<String> {
        match self.screen {
            Screen::Feed => self.selected_item().map(|item| item.url().to_string()),
            Screen::Profile => self
                .profile
                .as_ref()
                .map(|p| self.api.web_url(&format!("u/{}", p.username))),
        }
    }

    fn open_in_browser(&mut self) {
        let Some(url) = self.current_url() else {
            return;
        };
        if let Err(e) = open::that(&url) {
            self.notify_error(format!("Could not open {}: {}", url, e));
        }
    }

    fn edit_profile(&mut self) {
        let Some(user) = self.session.current_user().cloned() else {
            self.popup = Some(Popup::SignIn);
            return;
        };
        self.popup = None;

        if let Some(draft) = cache::read::<String>(&cache::draft_key(&user.id)) {
            debug!("resuming cached profile draft");
            self.action_tx.send(Action::SuspendForEditor(draft)).ok();
            return;
        }

        match self.profile.as_ref().filter(|p| p.id == user.id) {
            Some(profile) => {
                let text = ProfileForm::from_profile(profile).to_editor_text();
                self.action_tx.send(Action::SuspendForEditor(text)).ok();
            }
            None => self.spawn_edit_own_profile(user.username),
        }
    }

    fn on_editor_closed(&mut self, result: Result<String, String>) {
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                self.notify_error(format!("Editor failed: {}", e));
                return;
            }
        };
        let Some(user) = self.session.current_user().cloned() else {
            return;
        };
        let key = cache::draft_key(&user.id);

        let form = match ProfileForm::from_editor_text(&text) {
            Ok(Some(form)) => form,
            Ok(None) => {
                cache::remove(&key);
                self.notify("Profile edit cancelled");
                return;
            }
            Err(error) => {
                cache::write(&key, &text);
                self.popup = Some(Popup::Validation(vec![error]));
                return;
            }
        };

        // Kept until the server accepts it
        cache::write(&key, &text);
        let errors = profile::validate(&form);
        if !errors.is_empty() {
            self.popup = Some(Popup::Validation(errors));
            return;
        }

        self.saving_profile = true;
        self.spawn_update_profile(form.to_update());
    }

    fn dispatch(&self, requests: Vec<FetchRequest>) {
        for request in requests {
            self.spawn_fetch(request);
        }
    }

    fn spawn_fetch(&self, request: FetchRequest) {
        let tx = self.action_tx.clone();
        let api = Arc::clone(&self.api);
        let limit = self.feeds.page_size();
        tokio::spawn(async move {
            let result = api
                .fetch_page(
                    request.source,
                    &request.filters,
                    request.cursor.as_deref(),
                    limit,
                )
                .await
                .map_err(|e| e.to_string());
            tx.send(Action::FeedPageLoaded {
                source: request.source,
                mode: request.mode,
                generation: request.generation,
                result,
            })
            .ok();
        });
    }

    fn spawn_follow(&self, user_id: String, follow: bool) {
        let tx = self.action_tx.clone();
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            let result = if follow {
                api.follow(&user_id).await
            } else {
                api.unfollow(&user_id).await
            };
            tx.send(Action::FollowSettled {
                user_id,
                result: result.map_err(|e| e.to_string()),
            })
            .ok();
        });
    }

    fn spawn_load_profile(&self, username: String) {
        let tx = self.action_tx.clone();
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            match api.get_profile(&username).await {
                Ok(profile) => {
                    tx.send(Action::ProfileLoaded(Box::new(profile))).ok();
                }
                Err(e) => {
                    tx.send(Action::from(e)).ok();
                }
            }
        });
    }

    fn spawn_edit_own_profile(&self, username: String) {
        let tx = self.action_tx.clone();
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            match api.get_profile(&username).await {
                Ok(profile) => {
                    let text = ProfileForm::from_profile(&profile).to_editor_text();
                    tx.send(Action::SuspendForEditor(text)).ok();
                }
                Err(e) => {
                    tx.send(Action::from(e)).ok();
                }
            }
        });
    }

    fn spawn_update_profile(&self, update: ProfileUpdate) {
        let tx = self.action_tx.clone();
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            match api.update_profile(&update).await {
                Ok(user) => {
                    tx.send(Action::ProfileSaved(user)).ok();
                }
                Err(e) => {
                    tx.send(Action::ProfileSaveFailed(e.to_string())).ok();
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ShelfError};
    use crate::types::{Creator, FeedFilters, SessionUser, SocialLinks};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeApi {
        fetches: Mutex<Vec<(FeedSource, Option<String>)>>,
        mutations: Mutex<Vec<(String, bool)>>,
        fail_follow: bool,
        /// First pages carry a cursor and every cursor request fails
        fail_next_pages: bool,
    }

    fn creator(id: &str, is_following: bool) -> Item {
        Item::Creator(Creator {
            id: id.to_string(),
            name: format!("Creator {}", id),
            username: id.to_string(),
            bio: None,
            followers: 10,
            assets: 3,
            is_following,
            url: format!("https://pixelshelf.dev/u/{}", id),
        })
    }

    #[async_trait]
    impl ShelfApi for FakeApi {
        fn web_url(&self, path: &str) -> String {
            format!("https://pixelshelf.dev/{}", path)
        }

        async fn current_user(&self) -> Result<Option<SessionUser>> {
            Ok(None)
        }

        async fn fetch_page(
            &self,
            source: FeedSource,
            _filters: &FeedFilters,
            cursor: Option<&str>,
            _limit: u32,
        ) -> Result<Page> {
            self.fetches
                .lock()
                .unwrap()
                .push((source, cursor.map(str::to_string)));
            if self.fail_next_pages && cursor.is_some() {
                return Err(ShelfError::Api("503".to_string()));
            }
            Ok(Page {
                items: vec![creator("me", false), creator("u2", false)],
                next_cursor: self.fail_next_pages.then(|| "c1".to_string()),
            })
        }

        async fn follow(&self, user_id: &str) -> Result<()> {
            self.mutations
                .lock()
                .unwrap()
                .push((user_id.to_string(), true));
            if self.fail_follow {
                Err(ShelfError::Api("rate limited".to_string()))
            } else {
                Ok(())
            }
        }

        async fn unfollow(&self, user_id: &str) -> Result<()> {
            self.mutations
                .lock()
                .unwrap()
                .push((user_id.to_string(), false));
            Ok(())
        }

        async fn get_profile(&self, username: &str) -> Result<Profile> {
            Ok(Profile {
                id: username.to_string(),
                name: username.to_string(),
                username: username.to_string(),
                bio: None,
                location: None,
                social: SocialLinks::default(),
                image: None,
                banner_image: None,
                followers: 10,
                following: 2,
                is_following: false,
            })
        }

        async fn update_profile(&self, _update: &ProfileUpdate) -> Result<SessionUser> {
            Err(ShelfError::Api("not used".to_string()))
        }
    }

    fn signed_in() -> Session {
        Session::new(Some(SessionUser {
            id: "me".to_string(),
            name: "Me".to_string(),
            username: "me".to_string(),
            image: None,
        }))
    }

    fn creators_config() -> Config {
        let mut config = Config::default();
        config.feed.active_tab = "creators".to_string();
        config
    }

    fn app_with(
        api: Arc<FakeApi>,
        session: Session,
        config: Config,
    ) -> (App, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = App::new(api, session, config, tx);
        app.update(Action::Resize(160, 40));
        (app, rx)
    }

    /// Feed the app whatever its spawned tasks send back until `done` holds
    async fn pump(
        app: &mut App,
        rx: &mut mpsc::UnboundedReceiver<Action>,
        done: impl Fn(&Action) -> bool,
    ) {
        while let Some(action) = rx.recv().await {
            let finished = done(&action);
            app.update(action);
            if finished {
                break;
            }
        }
    }

    async fn load_creators(app: &mut App, rx: &mut mpsc::UnboundedReceiver<Action>) {
        app.update(Action::Init);
        pump(app, rx, |a| matches!(a, Action::FeedPageLoaded { .. })).await;
        assert_eq!(app.active_query().len(), 2);
    }

    #[tokio::test]
    async fn failed_follow_rolls_back_and_notifies() {
        let api = Arc::new(FakeApi {
            fail_follow: true,
            ..FakeApi::default()
        });
        let (mut app, mut rx) = app_with(api.clone(), signed_in(), creators_config());
        load_creators(&mut app, &mut rx).await;

        app.update(Action::ScrollRight);
        app.update(Action::ToggleFollow);
        assert_eq!(app.follow_control("u2", false), Some(("Following", true)));

        pump(&mut app, &mut rx, |a| matches!(a, Action::FollowSettled { .. })).await;
        assert_eq!(app.follow_control("u2", false), Some(("Follow", false)));
        let notification = app.notification.as_ref().unwrap();
        assert!(notification.is_error);
        assert!(notification.message.contains("rate limited"));
        assert_eq!(api.mutations.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn confirmed_follow_notifies_observers() {
        let api = Arc::new(FakeApi::default());
        let (mut app, mut rx) = app_with(api.clone(), signed_in(), creators_config());
        load_creators(&mut app, &mut rx).await;

        app.update(Action::ScrollRight);
        app.update(Action::ToggleFollow);
        pump(&mut app, &mut rx, |a| matches!(a, Action::FollowChanged { .. })).await;
        assert_eq!(app.follow_control("u2", false), Some(("Following", false)));
        assert!(app.notification.is_none());
    }

    #[tokio::test]
    async fn signed_out_follow_prompts_and_sends_nothing() {
        let api = Arc::new(FakeApi::default());
        let (mut app, mut rx) = app_with(api.clone(), Session::anonymous(), creators_config());
        load_creators(&mut app, &mut rx).await;

        app.update(Action::ScrollRight);
        app.update(Action::ToggleFollow);
        assert_eq!(app.popup, Some(Popup::SignIn));
        assert_eq!(app.follow_control("u2", false), Some(("Follow", false)));
        tokio::task::yield_now().await;
        assert!(api.mutations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn own_card_has_no_follow_control() {
        let api = Arc::new(FakeApi::default());
        let (mut app, mut rx) = app_with(api.clone(), signed_in(), creators_config());
        load_creators(&mut app, &mut rx).await;

        // first card is the signed-in user
        app.update(Action::ToggleFollow);
        assert_eq!(app.follow_control("me", false), None);
        assert!(app.popup.is_none());
        tokio::task::yield_now().await;
        assert!(api.mutations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn following_tab_without_session_fetches_nothing() {
        let api = Arc::new(FakeApi::default());
        let (mut app, _rx) = app_with(api.clone(), Session::anonymous(), Config::default());
        app.update(Action::Init);
        app.update(Action::SwitchTab(FeedSource::Following));
        tokio::task::yield_now().await;

        let fetched: Vec<FeedSource> = api
            .fetches
            .lock()
            .unwrap()
            .iter()
            .map(|(source, _)| *source)
            .collect();
        assert!(!fetched.contains(&FeedSource::Following));
        let feed = app.feeds.select_active_feed(&app.session);
        assert!(feed.needs_sign_in);
        assert!(feed.error.is_none());
    }

    #[tokio::test]
    async fn late_page_after_filter_change_is_dropped() {
        let api = Arc::new(FakeApi::default());
        let (mut app, mut rx) = app_with(api, signed_in(), creators_config());
        app.update(Action::Init);
        let first = rx.recv().await.unwrap();

        app.update(Action::CycleType);
        app.update(first);
        assert_eq!(app.active_query().len(), 0);
        assert!(app.active_query().is_loading());

        pump(&mut app, &mut rx, |a| matches!(a, Action::FeedPageLoaded { .. })).await;
        assert_eq!(app.active_query().len(), 2);
    }

    #[tokio::test]
    async fn failed_next_page_is_not_retried_until_refresh() {
        let api = Arc::new(FakeApi {
            fail_next_pages: true,
            ..FakeApi::default()
        });
        let (mut app, mut rx) = app_with(api.clone(), signed_in(), creators_config());
        load_creators(&mut app, &mut rx).await;

        // the sentinel is on screen, so the first page pulled in the next one
        pump(&mut app, &mut rx, |a| matches!(a, Action::FeedPageLoaded { .. })).await;
        assert_eq!(app.active_query().error(), Some("API error: 503"));
        assert_eq!(app.active_query().len(), 2);

        app.update(Action::ScrollDown);
        app.update(Action::LoadMore);
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(api.fetches.lock().unwrap().len(), 2);

        app.update(Action::Refresh);
        assert_eq!(app.active_query().error(), None);
        assert!(app.active_query().is_loading());
        pump(&mut app, &mut rx, |a| matches!(a, Action::FeedPageLoaded { .. })).await;

        let fetches = api.fetches.lock().unwrap();
        assert_eq!(fetches[2], (FeedSource::Creators, None));
    }

    #[tokio::test]
    async fn selecting_a_creator_opens_their_profile() {
        let api = Arc::new(FakeApi::default());
        let (mut app, mut rx) = app_with(api, signed_in(), creators_config());
        load_creators(&mut app, &mut rx).await;

        app.update(Action::ScrollRight);
        app.update(Action::Select);
        assert_eq!(app.screen, Screen::Profile);
        assert!(app.profile_loading);

        pump(&mut app, &mut rx, |a| matches!(a, Action::ProfileLoaded(_))).await;
        assert_eq!(app.profile.as_ref().map(|p| p.username.as_str()), Some("u2"));
    }

    #[tokio::test]
    async fn quitting_ignores_late_pages() {
        let api = Arc::new(FakeApi::default());
        let (mut app, mut rx) = app_with(api, signed_in(), creators_config());
        app.update(Action::Init);
        let late = rx.recv().await.unwrap();

        app.update(Action::Quit);
        app.update(late);
        assert!(app.should_quit);
        assert_eq!(app.active_query().len(), 0);
        assert!(!app.trigger.is_attached());
    }

    #[tokio::test]
    async fn view_toggle_emits_change_and_notifies() {
        let api = Arc::new(FakeApi::default());
        let (mut app, mut rx) = app_with(api, signed_in(), Config::default());
        app.update(Action::ToggleViewMode);
        pump(&mut app, &mut rx, |a| matches!(a, Action::ViewModeChanged(_))).await;
        assert_eq!(app.feed_geometry().layout, GridLayout::List { sidecards: false });
        assert_eq!(app.notification.as_ref().unwrap().message, "List view");
    }

    #[tokio::test]
    async fn paged_toggle_switches_queries() {
        let api = Arc::new(FakeApi::default());
        let (mut app, _rx) = app_with(api, signed_in(), Config::default());
        app.update(Action::Init);
        app.update(Action::ToggleInfiniteScroll);
        assert_eq!(app.feeds.mode(), RetrievalMode::Paged);
        assert!(!app.trigger.is_enabled());
        assert!(app.active_query().is_loading());
    }

    #[test]
    fn geometry_follows_breakpoints() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(
            Arc::new(FakeApi::default()),
            Session::anonymous(),
            Config::default(),
            tx,
        );
        app.width = 100;
        assert_eq!(app.feed_geometry().columns, 3);
        app.width = 60;
        assert_eq!(app.feed_geometry().columns, 1);
        app.width = 150;
        assert_eq!(app.feed_geometry().columns, 4);
    }
}
