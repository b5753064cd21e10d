use std::collections::HashSet;
use tracing::{debug, warn};

use crate::domain::gallery::{FeedPage, GalleryId, GalleryItem};
use crate::http::ApiError;
use crate::infra::api::GalleryApi;

const FIRST_PAGE: u32 = 1;

/// A page fetch handed out by [`FeedAccumulator::begin_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: usize,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was merged; holds the number of items actually appended.
    Appended(usize),
    /// A fetch is already in flight or the end was reached. Nothing was sent.
    Skipped,
    /// The fetch failed and the feed is untouched.
    Failed,
    /// The result arrived for a feed that was reset or torn down.
    Discarded,
}

/// Ordered, duplicate-free gallery feed built from sequential page fetches.
pub struct FeedAccumulator {
    items: Vec<GalleryItem>,
    seen: HashSet<GalleryId>,
    anchor: Option<GalleryItem>,
    next_page: u32,
    page_size: usize,
    has_more: bool,
    loading: bool,
    generation: u64,
}

impl FeedAccumulator {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            anchor: None,
            next_page: FIRST_PAGE,
            page_size: page_size.max(1),
            has_more: true,
            loading: false,
            generation: 0,
        }
    }

    /// Shows `anchor` ahead of the paged items and keeps it out of later pages.
    pub fn seed_anchor(&mut self, anchor: GalleryItem) {
        if let Some(previous) = self.anchor.take() {
            self.seen.remove(&previous.id);
        }
        self.items.retain(|item| item.id != anchor.id);
        self.seen.insert(anchor.id);
        self.anchor = Some(anchor);
    }

    /// Claims the single in-flight slot. `None` means no fetch must be issued.
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        if self.loading || !self.has_more {
            return None;
        }
        self.loading = true;
        Some(PageRequest {
            page: self.next_page,
            page_size: self.page_size,
            generation: self.generation,
        })
    }

    pub fn complete_load(
        &mut self,
        request: PageRequest,
        result: Result<FeedPage, ApiError>,
    ) -> LoadOutcome {
        if request.generation != self.generation {
            debug!(page = request.page, "dropping page for a reset feed");
            return LoadOutcome::Discarded;
        }
        self.loading = false;

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                warn!(error = %err, page = request.page, "failed to load gallery page");
                return LoadOutcome::Failed;
            }
        };

        // The end is judged on the raw page, before duplicates are dropped.
        let short_page = !page.has_more;

        let mut appended = 0;
        for item in page.items {
            if self.seen.insert(item.id) {
                self.items.push(item);
                appended += 1;
            }
        }

        self.next_page = request.page + 1;
        if short_page {
            self.has_more = false;
        }

        debug!(
            page = request.page,
            appended,
            has_more = self.has_more,
            "merged gallery page"
        );
        LoadOutcome::Appended(appended)
    }

    /// Gives back the in-flight slot of a load that will never complete.
    /// The feed is otherwise untouched, so the same page is asked for again.
    pub fn abandon_load(&mut self, request: PageRequest) {
        if request.generation == self.generation && self.loading {
            debug!(page = request.page, "page load abandoned");
            self.loading = false;
        }
    }

    /// Fetches and merges the next page unless one is in flight or the end was reached.
    pub async fn load_next_page(&mut self, api: &dyn GalleryApi) -> LoadOutcome {
        let Some(request) = self.begin_load() else {
            return LoadOutcome::Skipped;
        };
        let pending = PendingLoad {
            feed: self,
            request: Some(request),
        };
        let result = api
            .fetch_gallery_page(request.page, request.page_size)
            .await;
        pending.complete(result)
    }

    /// Drops everything fetched so far, keeping the anchor. Any fetch still in
    /// flight is ignored when it lands.
    pub fn reset(&mut self) {
        self.items.clear();
        self.seen.clear();
        if let Some(anchor) = &self.anchor {
            self.seen.insert(anchor.id);
        }
        self.next_page = FIRST_PAGE;
        self.has_more = true;
        self.loading = false;
        self.generation += 1;
    }

    /// Anchor first, then paged items in arrival order.
    pub fn items(&self) -> impl DoubleEndedIterator<Item = &GalleryItem> {
        self.anchor.iter().chain(self.items.iter())
    }

    pub fn get(&self, id: GalleryId) -> Option<&GalleryItem> {
        self.items().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len() + usize::from(self.anchor.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }
}

/// A claimed load slot. Dropping it before [`PendingLoad::complete`] releases
/// the slot, so a cancelled fetch cannot wedge the feed.
struct PendingLoad<'a> {
    feed: &'a mut FeedAccumulator,
    request: Option<PageRequest>,
}

impl PendingLoad<'_> {
    fn complete(mut self, result: Result<FeedPage, ApiError>) -> LoadOutcome {
        match self.request.take() {
            Some(request) => self.feed.complete_load(request, result),
            None => LoadOutcome::Discarded,
        }
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            self.feed.abandon_load(request);
        }
    }
}
