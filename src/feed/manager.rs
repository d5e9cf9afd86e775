use std::collections::HashMap;

use tracing::debug;

use super::query::{Applied, FeedQuery, FetchRequest, RetrievalMode};
use super::source::FeedSource;
use crate::config::FeedConfig;
use crate::session::Session;
use crate::types::{FeedFilters, Item, Page, SortOrder};

/// Retrieval state of the feed currently on screen, in one shape
/// regardless of source or mode.
#[derive(Debug)]
pub struct ActiveFeed<'a> {
    pub source: FeedSource,
    pub data: Vec<&'a Item>,
    pub is_loading: bool,
    pub error: Option<&'a str>,
    pub has_more: bool,
    pub is_loading_more: bool,
    /// The source needs a session that does not exist. Not an error.
    pub needs_sign_in: bool,
}

/// Owns one query per source and retrieval mode and decides which of them
/// may fetch.
#[derive(Debug)]
pub struct FeedManager {
    queries: HashMap<(FeedSource, RetrievalMode), FeedQuery>,
    mode: RetrievalMode,
    active: FeedSource,
    search: Option<String>,
    selected_tags: Vec<String>,
    selected_type: Option<String>,
    sort_overrides: HashMap<FeedSource, SortOrder>,
    page_size: u32,
}

impl FeedManager {
    pub fn new(config: &FeedConfig) -> Self {
        let mut queries = HashMap::new();
        for source in FeedSource::ALL {
            for mode in [RetrievalMode::Infinite, RetrievalMode::Paged] {
                queries.insert((source, mode), FeedQuery::new(source, mode));
            }
        }

        Self {
            queries,
            mode: RetrievalMode::from_flag(config.infinite_scroll),
            active: FeedSource::from_tab(&config.active_tab),
            search: non_empty(config.search_query.clone()),
            selected_tags: config.selected_tags.clone(),
            selected_type: non_empty(config.selected_type.clone()),
            sort_overrides: HashMap::new(),
            page_size: config.page_size,
        }
    }

    pub fn active(&self) -> FeedSource {
        self.active
    }

    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn selected_tags(&self) -> &[String] {
        &self.selected_tags
    }

    pub fn selected_type(&self) -> Option<&str> {
        self.selected_type.as_deref()
    }

    pub fn sort_for(&self, source: FeedSource) -> SortOrder {
        self.sort_overrides
            .get(&source)
            .copied()
            .unwrap_or_else(|| source.default_sort())
    }

    pub fn query(&self, source: FeedSource, mode: RetrievalMode) -> &FeedQuery {
        &self.queries[&(source, mode)]
    }

    fn query_mut(&mut self, source: FeedSource, mode: RetrievalMode) -> &mut FeedQuery {
        self.queries
            .entry((source, mode))
            .or_insert_with(|| FeedQuery::new(source, mode))
    }

    /// Whether a source may fetch right now
    pub fn is_enabled(&self, source: FeedSource, mode: RetrievalMode, session: &Session) -> bool {
        source == self.active
            && mode == self.mode
            && (!source.requires_session() || session.is_authenticated())
    }

    /// Filters for the active source. Only the first selected tag is sent.
    pub fn filters_for(&self, source: FeedSource) -> FeedFilters {
        FeedFilters {
            search: self.search.clone(),
            tag: self.selected_tags.first().cloned(),
            asset_type: self.selected_type.clone(),
            sort: self.sort_for(source),
            following_only: source.following_only(),
        }
    }

    /// Re-evaluate every query against the enablement rule and return the
    /// requests that have to be issued.
    pub fn sync(&mut self, session: &Session) -> Vec<FetchRequest> {
        let mut requests = Vec::new();
        for source in FeedSource::ALL {
            for mode in [RetrievalMode::Infinite, RetrievalMode::Paged] {
                let binding = self
                    .is_enabled(source, mode, session)
                    .then(|| self.filters_for(source));
                if let Some(request) = self.query_mut(source, mode).bind(binding) {
                    requests.push(request);
                }
            }
        }
        requests
    }

    pub fn set_active_tab(&mut self, source: FeedSource, session: &Session) -> Vec<FetchRequest> {
        debug!(from = %self.active, to = %source, "switching feed tab");
        self.active = source;
        self.sync(session)
    }

    pub fn set_infinite_scroll(&mut self, infinite: bool, session: &Session) -> Vec<FetchRequest> {
        self.mode = RetrievalMode::from_flag(infinite);
        self.sync(session)
    }

    pub fn set_search(&mut self, search: Option<String>, session: &Session) -> Vec<FetchRequest> {
        self.search = non_empty(search);
        self.sync(session)
    }

    pub fn set_tags(&mut self, tags: Vec<String>, session: &Session) -> Vec<FetchRequest> {
        self.selected_tags = tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        self.sync(session)
    }

    pub fn set_type(&mut self, asset_type: Option<String>, session: &Session) -> Vec<FetchRequest> {
        self.selected_type = non_empty(asset_type);
        self.sync(session)
    }

    /// Drop search, tags and type in one step so the active query restarts once
    pub fn clear_filters(&mut self, session: &Session) -> Vec<FetchRequest> {
        self.search = None;
        self.selected_tags.clear();
        self.selected_type = None;
        self.sync(session)
    }

    /// Flip popular/latest for the active source
    pub fn flip_sort(&mut self, session: &Session) -> Vec<FetchRequest> {
        let flipped = self.sort_for(self.active).flipped();
        self.sort_overrides.insert(self.active, flipped);
        self.sync(session)
    }

    /// Next page of the active feed, if it may fetch one
    pub fn load_more(&mut self) -> Option<FetchRequest> {
        let (source, mode) = (self.active, self.mode);
        let query = self.query_mut(source, mode);
        match mode {
            RetrievalMode::Infinite => query.fetch_next_page(),
            RetrievalMode::Paged => query.load_more(),
        }
    }

    /// Refetch exactly one source in the current mode
    pub fn refresh(&mut self, source: FeedSource) -> Option<FetchRequest> {
        let mode = self.mode;
        self.query_mut(source, mode).refetch()
    }

    pub fn apply(
        &mut self,
        source: FeedSource,
        mode: RetrievalMode,
        generation: u64,
        result: Result<Page, String>,
    ) -> Applied {
        self.query_mut(source, mode).apply(generation, result)
    }

    /// Stop everything. Late responses are ignored afterwards.
    pub fn teardown(&mut self) {
        for query in self.queries.values_mut() {
            query.teardown();
        }
    }

    pub fn select_active_feed(&self, session: &Session) -> ActiveFeed<'_> {
        let query = self.query(self.active, self.mode);
        ActiveFeed {
            source: self.active,
            data: query.items().collect(),
            is_loading: query.is_loading(),
            error: query.error(),
            has_more: query.has_more(),
            is_loading_more: query.is_loading_more(),
            needs_sign_in: self.active.requires_session() && !session.is_authenticated(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
