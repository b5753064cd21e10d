use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::app::comments::CommentSection;
use crate::app::engagement::{
    DoubleTapDetector, HeartBurst, InteractionState, LikeSnapshot, ToggleOutcome,
    DEFAULT_DOUBLE_TAP_WINDOW, DEFAULT_HEART_BURST,
};
use crate::app::feed::{FeedAccumulator, LoadOutcome};
use crate::app::lifecycle::ScreenScope;
use crate::app::search;
use crate::config::ClientConfig;
use crate::domain::engagement::CommentId;
use crate::domain::gallery::{GalleryId, GalleryItem};
use crate::domain::user::UserId;
use crate::http::ApiError;
use crate::infra::api::GalleryApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSettings {
    pub page_size: usize,
    pub double_tap_window: Duration,
    pub heart_burst: Duration,
}

impl ScreenSettings {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            double_tap_window: DEFAULT_DOUBLE_TAP_WINDOW,
            heart_burst: DEFAULT_HEART_BURST,
        }
    }

    /// Settings for the grid listing.
    pub fn grid(config: &ClientConfig) -> Self {
        Self {
            page_size: config.feed_page_size,
            double_tap_window: Duration::from_millis(config.double_tap_window_ms),
            heart_burst: Duration::from_millis(config.heart_burst_ms),
        }
    }

    /// Settings for the detail feed opened from a single gallery.
    pub fn detail(config: &ClientConfig) -> Self {
        Self {
            page_size: config.anchor_feed_page_size,
            ..Self::grid(config)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Single,
    /// `toggle` is `None` when the item was already liked.
    DoubleTap { toggle: Option<ToggleOutcome> },
}

struct ScreenState {
    feed: FeedAccumulator,
    interactions: InteractionState,
    taps: HashMap<GalleryId, DoubleTapDetector>,
    hearts: HashMap<GalleryId, HeartBurst>,
    comments: HashMap<GalleryId, CommentSection>,
}

impl ScreenState {
    /// Comment sheet of `id`, opened from the item's comments on first use.
    fn comment_section(&mut self, id: GalleryId) -> Option<&mut CommentSection> {
        let Self { feed, comments, .. } = self;
        if !comments.contains_key(&id) {
            let item = feed.get(id)?;
            comments.insert(id, CommentSection::new(id, item.comments.clone()));
        }
        comments.get_mut(&id)
    }

    /// Server copy of an item arrived: like state and any open comment sheet
    /// follow it.
    fn track(&mut self, item: &GalleryItem) {
        self.interactions.track(item);
        if let Some(section) = self.comments.get_mut(&item.id) {
            section.reconcile(item.comments.clone());
        }
    }
}

/// Undo for work begun under the state lock. Unless disarmed, it runs when
/// the driving future is dropped: inline if the lock is free, otherwise on a
/// spawned task.
struct UndoOnDrop<F>
where
    F: FnOnce(&mut ScreenState) + Send + 'static,
{
    state: Arc<Mutex<ScreenState>>,
    undo: Option<F>,
}

impl<F> UndoOnDrop<F>
where
    F: FnOnce(&mut ScreenState) + Send + 'static,
{
    fn new(state: &Arc<Mutex<ScreenState>>, undo: F) -> Self {
        Self {
            state: Arc::clone(state),
            undo: Some(undo),
        }
    }

    fn disarm(mut self) {
        self.undo = None;
    }
}

impl<F> Drop for UndoOnDrop<F>
where
    F: FnOnce(&mut ScreenState) + Send + 'static,
{
    fn drop(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        if let Ok(mut state) = self.state.try_lock() {
            undo(&mut *state);
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                let state = Arc::clone(&self.state);
                handle.spawn(async move {
                    undo(&mut *state.lock().await);
                });
            }
            Err(_) => warn!("no runtime left to release a cancelled screen operation"),
        }
    }
}

/// A gallery feed on screen: pagination, likes, gestures and comment sheets.
///
/// Calls may overlap; each one takes the state lock only around its own
/// bookkeeping and never across a network call. A call dropped mid-flight
/// releases whatever guard it claimed. Once the screen is closed, responses
/// that are still in flight are thrown away.
pub struct GalleryScreen {
    api: Arc<dyn GalleryApi>,
    scope: ScreenScope,
    settings: ScreenSettings,
    state: Arc<Mutex<ScreenState>>,
}

impl GalleryScreen {
    pub fn new(api: Arc<dyn GalleryApi>, viewer: Option<UserId>, settings: ScreenSettings) -> Self {
        Self {
            api,
            scope: ScreenScope::new(),
            settings,
            state: Arc::new(Mutex::new(ScreenState {
                feed: FeedAccumulator::new(settings.page_size),
                interactions: InteractionState::new(viewer),
                taps: HashMap::new(),
                hearts: HashMap::new(),
                comments: HashMap::new(),
            })),
        }
    }

    pub fn close(&self) {
        self.scope.close();
    }

    /// Fetches the deep-linked gallery and pins it above the paged results.
    pub async fn open_anchor(&self, id: GalleryId) -> Result<(), ApiError> {
        let item = self.api.fetch_gallery_detail(id).await?;
        if self.scope.is_closed() {
            debug!(gallery_id = %id, "screen closed, dropping anchor");
            return Ok(());
        }

        let mut state = self.state.lock().await;
        state.track(&item);
        state.feed.seed_anchor(item);
        Ok(())
    }

    pub async fn load_next_page(&self) -> LoadOutcome {
        let request = {
            let mut state = self.state.lock().await;
            match state.feed.begin_load() {
                Some(request) => request,
                None => return LoadOutcome::Skipped,
            }
        };

        let release = UndoOnDrop::new(&self.state, move |state: &mut ScreenState| {
            state.feed.abandon_load(request);
        });

        let result = self
            .api
            .fetch_gallery_page(request.page, request.page_size)
            .await;
        if self.scope.is_closed() {
            debug!(page = request.page, "screen closed, dropping page");
            return LoadOutcome::Discarded;
        }

        let mut state = self.state.lock().await;
        release.disarm();
        let outcome = state.feed.complete_load(request, result);
        if let LoadOutcome::Appended(appended) = outcome {
            // Only the new tail: older items may carry confirmed local likes.
            let fresh: Vec<GalleryItem> =
                state.feed.items().rev().take(appended).cloned().collect();
            for item in &fresh {
                state.track(item);
            }
        }
        outcome
    }

    /// Starts over from the first page; fresh pages replace optimistic values
    /// and the comments of open sheets.
    pub async fn refresh(&self) -> LoadOutcome {
        {
            let mut state = self.state.lock().await;
            state.feed.reset();
            state.taps.clear();
            state.hearts.clear();
        }
        self.load_next_page().await
    }

    pub async fn toggle_like(&self, id: GalleryId) -> ToggleOutcome {
        let ticket = {
            let mut state = self.state.lock().await;
            match state.interactions.begin_toggle(id) {
                Some(ticket) => ticket,
                None => return ToggleOutcome::Dropped,
            }
        };

        let release = UndoOnDrop::new(&self.state, move |state: &mut ScreenState| {
            state.interactions.abandon(ticket);
        });

        let result = self.api.toggle_like(id).await;
        if self.scope.is_closed() {
            debug!(gallery_id = %id, "screen closed, dropping like result");
            return ToggleOutcome::Dropped;
        }

        let mut state = self.state.lock().await;
        release.disarm();
        state.interactions.settle(ticket, &result)
    }

    pub async fn tap_media(&self, id: GalleryId) -> TapOutcome {
        self.tap_media_at(id, Instant::now()).await
    }

    /// Feeds one tap on the media area into the double-tap detector.
    pub async fn tap_media_at(&self, id: GalleryId, now: Instant) -> TapOutcome {
        let already_liked = {
            let mut state = self.state.lock().await;
            let window = self.settings.double_tap_window;
            let double = state
                .taps
                .entry(id)
                .or_insert_with(|| DoubleTapDetector::new(window))
                .register_tap(now);
            if !double {
                return TapOutcome::Single;
            }

            state
                .hearts
                .entry(id)
                .or_default()
                .trigger(&self.scope, self.settings.heart_burst);
            state.interactions.is_liked(id)
        };

        if already_liked {
            return TapOutcome::DoubleTap { toggle: None };
        }
        TapOutcome::DoubleTap {
            toggle: Some(self.toggle_like(id).await),
        }
    }

    pub async fn heart_visible(&self, id: GalleryId) -> bool {
        self.state
            .lock()
            .await
            .hearts
            .get(&id)
            .map_or(false, HeartBurst::is_visible)
    }

    pub async fn like_state(&self, id: GalleryId) -> Option<LikeSnapshot> {
        self.state
            .lock()
            .await
            .interactions
            .get(id)
            .map(|state| state.snapshot())
    }

    /// Anchor first, then paged items.
    pub async fn items(&self) -> Vec<GalleryItem> {
        self.state.lock().await.feed.items().cloned().collect()
    }

    pub async fn search(&self, query: &str) -> Vec<GalleryItem> {
        let state = self.state.lock().await;
        search::filter_by_caption(state.feed.items(), query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.feed.has_more()
    }

    /// Runs `f` on the comment sheet of `id`, opening it from the item's
    /// comments on first use. `None` if the item is not on screen.
    pub async fn with_comments<R>(
        &self,
        id: GalleryId,
        f: impl FnOnce(&mut CommentSection) -> R,
    ) -> Option<R> {
        self.state.lock().await.comment_section(id).map(f)
    }

    pub async fn submit_comment(&self, id: GalleryId) -> Result<Option<CommentId>, ApiError> {
        let draft = match self.with_comments(id, CommentSection::begin_submit).await {
            Some(Some(draft)) => draft,
            _ => return Ok(None),
        };
        let release = UndoOnDrop::new(&self.state, move |state: &mut ScreenState| {
            if let Some(section) = state.comments.get_mut(&id) {
                section.abandon_submit();
            }
        });

        let result = self
            .api
            .submit_comment(id, &draft.content, draft.parent_id)
            .await;
        if self.scope.is_closed() {
            debug!(gallery_id = %id, "screen closed, dropping created comment");
            return Ok(None);
        }

        let mut state = self.state.lock().await;
        release.disarm();
        match state.comment_section(id) {
            Some(section) => section.complete_submit(result).map(Some),
            None => Ok(None),
        }
    }
}

impl Drop for GalleryScreen {
    fn drop(&mut self) {
        self.scope.close();
    }
}
