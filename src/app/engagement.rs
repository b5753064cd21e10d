use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::app::lifecycle::{ScreenScope, TimerHandle};
use crate::domain::gallery::{GalleryId, GalleryItem};
use crate::domain::user::UserId;
use crate::http::ApiError;
use crate::infra::api::GalleryApi;

pub const DEFAULT_DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);
pub const DEFAULT_HEART_BURST: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeSnapshot {
    pub liked: bool,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikePhase {
    Idle,
    /// A toggle is waiting for the server. `before` is what a failure restores.
    Pending { before: LikeSnapshot },
    Committed,
    RolledBack,
}

/// Proof that a toggle was started; settles exactly that toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeTicket {
    pub item_id: GalleryId,
    /// State the toggle moves towards.
    pub liked: bool,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Committed,
    RolledBack,
    /// Another toggle was in flight, the item is unknown, or the screen is gone.
    Dropped,
}

/// Like state of one gallery item as the viewer sees it.
#[derive(Debug, Clone)]
pub struct LikeState {
    item_id: GalleryId,
    liked: bool,
    count: u32,
    phase: LikePhase,
    seq: u64,
    deferred_truth: Option<LikeSnapshot>,
}

impl LikeState {
    pub fn from_item(item: &GalleryItem, viewer: Option<UserId>) -> Self {
        let truth = server_truth(item, viewer);
        Self {
            item_id: item.id,
            liked: truth.liked,
            count: truth.count,
            phase: LikePhase::Idle,
            seq: 0,
            deferred_truth: None,
        }
    }

    pub fn item_id(&self) -> GalleryId {
        self.item_id
    }

    pub fn liked(&self) -> bool {
        self.liked
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn phase(&self) -> LikePhase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, LikePhase::Pending { .. })
    }

    pub fn snapshot(&self) -> LikeSnapshot {
        LikeSnapshot {
            liked: self.liked,
            count: self.count,
        }
    }

    /// Applies the optimistic flip. Returns `None` while a toggle is in flight.
    pub fn begin_toggle(&mut self) -> Option<LikeTicket> {
        if self.is_pending() {
            return None;
        }

        let before = self.snapshot();
        self.liked = !before.liked;
        self.count = if self.liked {
            before.count.saturating_add(1)
        } else {
            before.count.saturating_sub(1)
        };
        self.seq += 1;
        self.phase = LikePhase::Pending { before };

        Some(LikeTicket {
            item_id: self.item_id,
            liked: self.liked,
            seq: self.seq,
        })
    }

    /// Resolves the pending toggle. Returns `false` for a stale ticket.
    pub fn settle(&mut self, ticket: LikeTicket, result: &Result<(), ApiError>) -> bool {
        let LikePhase::Pending { before } = self.phase else {
            return false;
        };
        if ticket.seq != self.seq || ticket.item_id != self.item_id {
            return false;
        }

        match result {
            Ok(()) => {
                // Truth read while pending may predate this toggle.
                self.deferred_truth = None;
                self.phase = LikePhase::Committed;
            }
            Err(_) => self.roll_back(before),
        }
        true
    }

    /// Rolls back a toggle whose outcome will never be known.
    /// Returns `false` for a stale ticket.
    pub fn abandon(&mut self, ticket: LikeTicket) -> bool {
        let LikePhase::Pending { before } = self.phase else {
            return false;
        };
        if ticket.seq != self.seq || ticket.item_id != self.item_id {
            return false;
        }
        self.roll_back(before);
        true
    }

    fn roll_back(&mut self, before: LikeSnapshot) {
        let restored = self.deferred_truth.take().unwrap_or(before);
        self.liked = restored.liked;
        self.count = restored.count;
        self.phase = LikePhase::RolledBack;
    }

    /// Replaces local values with what the server reported.
    pub fn reconcile(&mut self, item: &GalleryItem, viewer: Option<UserId>) {
        let truth = server_truth(item, viewer);
        if self.is_pending() {
            self.deferred_truth = Some(truth);
            return;
        }
        self.liked = truth.liked;
        self.count = truth.count;
        self.phase = LikePhase::Idle;
    }
}

fn server_truth(item: &GalleryItem, viewer: Option<UserId>) -> LikeSnapshot {
    LikeSnapshot {
        liked: viewer.map_or(false, |viewer| item.is_liked_by(viewer)),
        count: item.likes_count,
    }
}

/// Like states for every item on screen.
pub struct InteractionState {
    viewer: Option<UserId>,
    likes: HashMap<GalleryId, LikeState>,
}

impl InteractionState {
    pub fn new(viewer: Option<UserId>) -> Self {
        Self {
            viewer,
            likes: HashMap::new(),
        }
    }

    /// Starts tracking `item`, or reconciles it if already tracked.
    pub fn track(&mut self, item: &GalleryItem) {
        let viewer = self.viewer;
        self.likes
            .entry(item.id)
            .and_modify(|state| state.reconcile(item, viewer))
            .or_insert_with(|| LikeState::from_item(item, viewer));
    }

    pub fn get(&self, id: GalleryId) -> Option<&LikeState> {
        self.likes.get(&id)
    }

    pub fn is_liked(&self, id: GalleryId) -> bool {
        self.likes.get(&id).map_or(false, LikeState::liked)
    }

    pub fn begin_toggle(&mut self, id: GalleryId) -> Option<LikeTicket> {
        let Some(state) = self.likes.get_mut(&id) else {
            debug!(gallery_id = %id, "toggle for untracked gallery");
            return None;
        };
        let ticket = state.begin_toggle();
        if ticket.is_none() {
            debug!(gallery_id = %id, "like toggle already in flight");
        }
        ticket
    }

    pub fn settle(&mut self, ticket: LikeTicket, result: &Result<(), ApiError>) -> ToggleOutcome {
        let Some(state) = self.likes.get_mut(&ticket.item_id) else {
            return ToggleOutcome::Dropped;
        };
        if !state.settle(ticket, result) {
            return ToggleOutcome::Dropped;
        }
        match result {
            Ok(()) => ToggleOutcome::Committed,
            Err(err) => {
                warn!(error = %err, gallery_id = %ticket.item_id, "like toggle failed, rolled back");
                ToggleOutcome::RolledBack
            }
        }
    }

    /// Releases the in-flight guard of a toggle that was cancelled before the
    /// server answered, restoring the pre-toggle values.
    pub fn abandon(&mut self, ticket: LikeTicket) -> ToggleOutcome {
        let Some(state) = self.likes.get_mut(&ticket.item_id) else {
            return ToggleOutcome::Dropped;
        };
        if !state.abandon(ticket) {
            return ToggleOutcome::Dropped;
        }
        debug!(gallery_id = %ticket.item_id, "like toggle abandoned, rolled back");
        ToggleOutcome::RolledBack
    }

    /// Optimistically flips the like on `id`, then confirms with the server.
    pub async fn toggle_like(&mut self, id: GalleryId, api: &dyn GalleryApi) -> ToggleOutcome {
        let Some(ticket) = self.begin_toggle(id) else {
            return ToggleOutcome::Dropped;
        };
        let pending = PendingToggle {
            interactions: self,
            ticket: Some(ticket),
        };
        let result = api.toggle_like(id).await;
        pending.settle(&result)
    }
}

/// A toggle waiting for the server. Dropped unsettled, it rolls back.
struct PendingToggle<'a> {
    interactions: &'a mut InteractionState,
    ticket: Option<LikeTicket>,
}

impl PendingToggle<'_> {
    fn settle(mut self, result: &Result<(), ApiError>) -> ToggleOutcome {
        match self.ticket.take() {
            Some(ticket) => self.interactions.settle(ticket, result),
            None => ToggleOutcome::Dropped,
        }
    }
}

impl Drop for PendingToggle<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.interactions.abandon(ticket);
        }
    }
}

/// Recognises two taps landing within `window` of each other.
#[derive(Debug, Clone)]
pub struct DoubleTapDetector {
    window: Duration,
    last_tap: Option<Instant>,
}

impl DoubleTapDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_tap: None,
        }
    }

    /// Records a tap. Returns `true` when it completes a double tap; the pair is
    /// then consumed so a third quick tap starts over.
    pub fn register_tap(&mut self, now: Instant) -> bool {
        match self.last_tap {
            Some(previous) if now.saturating_duration_since(previous) < self.window => {
                self.last_tap = None;
                true
            }
            _ => {
                self.last_tap = Some(now);
                false
            }
        }
    }
}

impl Default for DoubleTapDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DOUBLE_TAP_WINDOW)
    }
}

/// The big heart shown over the media after a double tap.
#[derive(Debug, Default)]
pub struct HeartBurst {
    visible: Arc<AtomicBool>,
    timer: Option<TimerHandle>,
}

impl HeartBurst {
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Shows the heart for `duration`, restarting any burst already running.
    pub fn trigger(&mut self, scope: &ScreenScope, duration: Duration) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        if scope.is_closed() {
            return;
        }

        self.visible.store(true, Ordering::Release);
        let visible = Arc::clone(&self.visible);
        self.timer = scope.spawn_timer(duration, move || {
            visible.store(false, Ordering::Release);
        });
    }
}

impl Drop for HeartBurst {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
