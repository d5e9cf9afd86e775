use std::collections::HashSet;

use tracing::{debug, warn};

use super::source::FeedSource;
use crate::types::{FeedFilters, Item, Page};

/// How a query continues past its first page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrievalMode {
    /// Pages are kept separately and the next one is requested by the scroll trigger
    Infinite,
    /// Items are appended on an explicit "load more"
    Paged,
}

impl RetrievalMode {
    pub fn from_flag(infinite_scroll: bool) -> Self {
        if infinite_scroll {
            RetrievalMode::Infinite
        } else {
            RetrievalMode::Paged
        }
    }
}

/// A page request the caller must issue against the API.
///
/// The generation ties the eventual response to the query state it was
/// issued from; anything that resets the query bumps it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub source: FeedSource,
    pub mode: RetrievalMode,
    pub filters: FeedFilters,
    pub cursor: Option<String>,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetching {
    Idle,
    FirstPage,
    NextPage,
}

/// Outcome of feeding a response back into a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Stale,
}

/// Paginated state of one feed source in one retrieval mode.
#[derive(Debug)]
pub struct FeedQuery {
    source: FeedSource,
    mode: RetrievalMode,
    enabled: bool,
    filters: Option<FeedFilters>,
    pages: Vec<Page>,
    seen: HashSet<String>,
    fetching: Fetching,
    error: Option<String>,
    generation: u64,
}

impl FeedQuery {
    pub fn new(source: FeedSource, mode: RetrievalMode) -> Self {
        Self {
            source,
            mode,
            enabled: false,
            filters: None,
            pages: Vec::new(),
            seen: HashSet::new(),
            fetching: Fetching::Idle,
            error: None,
            generation: 0,
        }
    }

    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn filters(&self) -> Option<&FeedFilters> {
        self.filters.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bind the query to filters. `None` suspends it.
    ///
    /// Returns the first-page request when the query has to (re)start:
    /// on first enablement or when the filters differ from those the
    /// cached pages were fetched with.
    pub fn bind(&mut self, filters: Option<FeedFilters>) -> Option<FetchRequest> {
        let Some(filters) = filters else {
            self.disable();
            return None;
        };

        self.enabled = true;
        if self.filters.as_ref() != Some(&filters) {
            debug!(source = %self.source, "filters changed, restarting from page 1");
            self.reset();
            self.filters = Some(filters);
            return Some(self.start_first_page());
        }

        if self.pages.is_empty() && self.fetching == Fetching::Idle && self.error.is_none() {
            return Some(self.start_first_page());
        }

        None
    }

    /// Stop fetching. Infinite queries keep their pages (and let in-flight
    /// responses land) so re-enabling with the same filters resumes; paged
    /// queries are torn down.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        if self.mode == RetrievalMode::Paged {
            self.reset();
            self.filters = None;
        }
    }

    /// Discard everything and invalidate in-flight responses.
    pub fn teardown(&mut self) {
        self.enabled = false;
        self.reset();
        self.filters = None;
    }

    /// Discard cached pages and start again from page 1.
    pub fn refetch(&mut self) -> Option<FetchRequest> {
        if !self.enabled || self.filters.is_none() {
            return None;
        }
        self.reset();
        Some(self.start_first_page())
    }

    // Infinite-mode surface

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn has_next_page(&self) -> bool {
        self.pages
            .last()
            .is_some_and(|page| page.next_cursor.is_some())
    }

    pub fn is_fetching_next_page(&self) -> bool {
        self.fetching == Fetching::NextPage
    }

    /// Request the page after the last one. No-op while a fetch is in
    /// flight, without a next page, while disabled, or after an error
    /// until `refetch` clears it.
    pub fn fetch_next_page(&mut self) -> Option<FetchRequest> {
        if !self.enabled || self.fetching != Fetching::Idle || self.error.is_some() {
            return None;
        }
        let cursor = self.pages.last()?.next_cursor.clone()?;
        let filters = self.filters.clone()?;
        self.fetching = Fetching::NextPage;
        debug!(source = %self.source, %cursor, "fetching next page");
        Some(FetchRequest {
            source: self.source,
            mode: self.mode,
            filters,
            cursor: Some(cursor),
            generation: self.generation,
        })
    }

    // Paged-mode surface

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }

    pub fn has_more(&self) -> bool {
        self.has_next_page()
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_fetching_next_page()
    }

    pub fn load_more(&mut self) -> Option<FetchRequest> {
        self.fetch_next_page()
    }

    // Shared

    /// True only while the first page is in flight
    pub fn is_loading(&self) -> bool {
        self.fetching == Fetching::FirstPage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Feed a response back. Responses from an older generation are dropped.
    /// A failure keeps the pages accumulated so far.
    pub fn apply(&mut self, generation: u64, result: Result<Page, String>) -> Applied {
        if generation != self.generation || self.fetching == Fetching::Idle {
            warn!(
                source = %self.source,
                generation,
                current = self.generation,
                "dropping stale page response"
            );
            return Applied::Stale;
        }
        self.fetching = Fetching::Idle;

        match result {
            Ok(page) => {
                let before = page.items.len();
                let items: Vec<Item> = page
                    .items
                    .into_iter()
                    .filter(|item| self.seen.insert(item.id().to_string()))
                    .collect();
                if items.len() != before {
                    debug!(
                        source = %self.source,
                        dropped = before - items.len(),
                        "dropped duplicate items"
                    );
                }
                self.pages.push(Page {
                    items,
                    next_cursor: page.next_cursor,
                });
                self.error = None;
            }
            Err(message) => {
                self.error = Some(message);
            }
        }
        Applied::Applied
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.pages.clear();
        self.seen.clear();
        self.fetching = Fetching::Idle;
        self.error = None;
    }

    fn start_first_page(&mut self) -> FetchRequest {
        self.fetching = Fetching::FirstPage;
        self.error = None;
        debug!(source = %self.source, generation = self.generation, "fetching first page");
        FetchRequest {
            source: self.source,
            mode: self.mode,
            filters: self.filters.clone().unwrap_or_default(),
            cursor: None,
            generation: self.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Creator, Item};

    fn creator(id: &str) -> Item {
        Item::Creator(Creator {
            id: id.to_string(),
            name: format!("Creator {}", id),
            username: id.to_string(),
            bio: None,
            followers: 0,
            assets: 0,
            is_following: false,
            url: String::new(),
        })
    }

    fn page(ids: &[&str], next: Option<&str>) -> Page {
        Page {
            items: ids.iter().map(|id| creator(id)).collect(),
            next_cursor: next.map(str::to_string),
        }
    }

    fn ids(query: &FeedQuery) -> Vec<String> {
        query.items().map(|item| item.id().to_string()).collect()
    }

    fn started(mode: RetrievalMode) -> (FeedQuery, FetchRequest) {
        let mut query = FeedQuery::new(FeedSource::Creators, mode);
        let req = query.bind(Some(FeedFilters::default())).unwrap();
        (query, req)
    }

    #[test]
    fn pages_concatenate_in_fetch_order() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        assert!(query.is_loading());
        assert_eq!(first.cursor, None);
        query.apply(first.generation, Ok(page(&["a", "b"], Some("c1"))));
        assert!(!query.is_loading());

        let second = query.fetch_next_page().unwrap();
        assert_eq!(second.cursor.as_deref(), Some("c1"));
        assert!(query.is_fetching_next_page());
        query.apply(second.generation, Ok(page(&["c", "d"], Some("c2"))));

        let third = query.fetch_next_page().unwrap();
        query.apply(third.generation, Ok(page(&["e"], None)));

        assert_eq!(ids(&query), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(query.pages().len(), 3);
        assert!(!query.has_next_page());
    }

    #[test]
    fn repeated_ids_are_dropped() {
        let (mut query, first) = started(RetrievalMode::Paged);
        query.apply(first.generation, Ok(page(&["a", "b"], Some("c1"))));
        let next = query.load_more().unwrap();
        query.apply(next.generation, Ok(page(&["b", "c"], None)));
        assert_eq!(ids(&query), vec!["a", "b", "c"]);
    }

    #[test]
    fn fetch_next_page_while_fetching_is_noop() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        // first page still in flight
        assert!(query.fetch_next_page().is_none());
        query.apply(first.generation, Ok(page(&["a"], Some("c1"))));

        assert!(query.fetch_next_page().is_some());
        assert!(query.is_loading_more());
        assert!(query.fetch_next_page().is_none());
        assert!(query.load_more().is_none());
    }

    #[test]
    fn no_next_page_without_cursor() {
        let (mut query, first) = started(RetrievalMode::Paged);
        query.apply(first.generation, Ok(page(&["a"], None)));
        assert!(!query.has_more());
        assert!(query.load_more().is_none());
    }

    #[test]
    fn error_keeps_accumulated_items() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        query.apply(first.generation, Ok(page(&["a", "b"], Some("c1"))));
        let next = query.fetch_next_page().unwrap();
        query.apply(next.generation, Err("boom".to_string()));

        assert_eq!(query.error(), Some("boom"));
        assert_eq!(ids(&query), vec!["a", "b"]);
        assert!(!query.is_fetching_next_page());
    }

    #[test]
    fn failed_next_page_waits_for_refetch() {
        let (mut query, first) = started(RetrievalMode::Paged);
        query.apply(first.generation, Ok(page(&["a"], Some("c1"))));
        let next = query.load_more().unwrap();
        query.apply(next.generation, Err("503".to_string()));

        assert!(query.load_more().is_none());
        assert!(query.fetch_next_page().is_none());

        let again = query.refetch().unwrap();
        assert_eq!(again.cursor, None);
        assert_eq!(query.error(), None);
    }

    #[test]
    fn refetch_restarts_from_first_page() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        query.apply(first.generation, Ok(page(&["a"], Some("c1"))));
        let next = query.fetch_next_page().unwrap();

        let again = query.refetch().unwrap();
        assert_eq!(again.cursor, None);
        assert!(again.generation > first.generation);
        assert_eq!(query.len(), 0);

        // the next-page response from before the refetch is stale
        assert_eq!(
            query.apply(next.generation, Ok(page(&["x"], None))),
            Applied::Stale
        );
        query.apply(again.generation, Ok(page(&["a2"], None)));
        assert_eq!(ids(&query), vec!["a2"]);
    }

    #[test]
    fn rebinding_same_filters_does_not_refetch() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        query.apply(first.generation, Ok(page(&["a"], Some("c1"))));
        query.bind(None);
        assert!(!query.is_enabled());
        assert!(query.bind(Some(FeedFilters::default())).is_none());
        assert_eq!(ids(&query), vec!["a"]);
    }

    #[test]
    fn changed_filters_restart() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        query.apply(first.generation, Ok(page(&["a"], Some("c1"))));
        let filters = FeedFilters {
            asset_type: Some("3d".to_string()),
            ..Default::default()
        };
        let req = query.bind(Some(filters.clone())).unwrap();
        assert_eq!(req.cursor, None);
        assert_eq!(req.filters, filters);
        assert_eq!(query.len(), 0);
        assert!(query.is_loading());
    }

    #[test]
    fn disabled_infinite_query_settles_in_flight_response() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        query.disable();
        assert_eq!(
            query.apply(first.generation, Ok(page(&["a"], None))),
            Applied::Applied
        );
        assert_eq!(ids(&query), vec!["a"]);
    }

    #[test]
    fn disabled_paged_query_is_torn_down() {
        let (mut query, first) = started(RetrievalMode::Paged);
        query.apply(first.generation, Ok(page(&["a"], Some("c1"))));
        let next = query.load_more().unwrap();
        query.disable();

        assert_eq!(query.len(), 0);
        assert_eq!(
            query.apply(next.generation, Ok(page(&["b"], None))),
            Applied::Stale
        );
        // re-enabling starts over
        let again = query.bind(Some(FeedFilters::default())).unwrap();
        assert_eq!(again.cursor, None);
    }

    #[test]
    fn disabled_query_does_not_fetch() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        query.apply(first.generation, Ok(page(&["a"], Some("c1"))));
        query.disable();
        assert!(query.fetch_next_page().is_none());
        assert!(query.refetch().is_none());
    }

    #[test]
    fn teardown_drops_late_responses() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        query.teardown();
        assert_eq!(
            query.apply(first.generation, Ok(page(&["a"], None))),
            Applied::Stale
        );
        assert_eq!(query.len(), 0);
    }

    #[test]
    fn errored_query_is_not_retried_by_rebinding() {
        let (mut query, first) = started(RetrievalMode::Infinite);
        query.apply(first.generation, Err("offline".to_string()));
        assert!(query.bind(Some(FeedFilters::default())).is_none());
        assert_eq!(query.error(), Some("offline"));
        assert!(query.refetch().is_some());
        assert_eq!(query.error(), None);
    }
}
