use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::domain::engagement::{Comment, CommentId};
use crate::domain::gallery::GalleryId;
use crate::http::ApiError;
use crate::infra::api::GalleryApi;

/// Deepest level that is rendered (roots are level 0).
pub const MAX_RENDER_LEVEL: usize = 2;
/// Deepest level that still offers "reply".
pub const MAX_REPLY_LEVEL: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentKey {
    Root,
    Comment(CommentId),
}

/// One rendered line of the thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRow<'a> {
    pub comment: &'a Comment,
    pub level: usize,
    pub can_reply: bool,
    pub reply_count: usize,
    pub expanded: bool,
}

/// Reply tree over a flat comment list.
///
/// Comments live in `nodes`; `index` maps ids to slots and `children` holds
/// the slots of each sibling group in arrival order.
#[derive(Debug, Default)]
pub struct CommentThread {
    nodes: Vec<Comment>,
    index: HashMap<CommentId, usize>,
    parents: Vec<ParentKey>,
    children: HashMap<ParentKey, Vec<usize>>,
    expanded: HashMap<CommentId, bool>,
}

impl CommentThread {
    /// Stable partition of `comments` by parent. A parent that is missing,
    /// points at the comment itself, or sits on a cycle makes the comment
    /// top level.
    pub fn group(comments: Vec<Comment>) -> Self {
        let mut thread = Self::default();
        for comment in comments {
            if thread.index.contains_key(&comment.id) {
                debug!(comment_id = %comment.id, "skipping duplicate comment");
                continue;
            }
            thread.index.insert(comment.id, thread.nodes.len());
            thread.nodes.push(comment);
        }

        let cyclic = thread.cyclic_slots();
        for slot in 0..thread.nodes.len() {
            let key = if cyclic.contains(&slot) {
                ParentKey::Root
            } else {
                thread.resolve_parent(&thread.nodes[slot])
            };
            thread.parents.push(key);
            thread.children.entry(key).or_default().push(slot);
        }
        thread
    }

    fn resolve_parent(&self, comment: &Comment) -> ParentKey {
        match comment.parent_id {
            Some(parent) if parent != comment.id && self.index.contains_key(&parent) => {
                ParentKey::Comment(parent)
            }
            _ => ParentKey::Root,
        }
    }

    /// Slots whose ancestor chain leads back to themselves.
    fn cyclic_slots(&self) -> HashSet<usize> {
        let mut cyclic = HashSet::new();
        for (start, comment) in self.nodes.iter().enumerate() {
            let mut visited = HashSet::new();
            let mut parent = comment.parent_id;
            while let Some(id) = parent {
                let Some(&slot) = self.index.get(&id) else {
                    break;
                };
                if slot == start {
                    cyclic.insert(start);
                    break;
                }
                if !visited.insert(slot) {
                    break;
                }
                parent = self.nodes[slot].parent_id;
            }
        }
        cyclic
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn children_of(&self, key: ParentKey) -> Vec<&Comment> {
        self.children
            .get(&key)
            .map(|slots| slots.iter().map(|&slot| &self.nodes[slot]).collect())
            .unwrap_or_default()
    }

    pub fn roots(&self) -> Vec<&Comment> {
        self.children_of(ParentKey::Root)
    }

    pub fn replies(&self, id: CommentId) -> Vec<&Comment> {
        self.children_of(ParentKey::Comment(id))
    }

    pub fn reply_count(&self, id: CommentId) -> usize {
        self.children
            .get(&ParentKey::Comment(id))
            .map_or(0, Vec::len)
    }

    /// Nesting level of `id` in the resolved tree, roots being 0.
    pub fn depth(&self, id: CommentId) -> Option<usize> {
        let mut slot = *self.index.get(&id)?;
        let mut depth = 0;
        while let ParentKey::Comment(parent) = self.parents[slot] {
            slot = self.index[&parent];
            depth += 1;
        }
        Some(depth)
    }

    pub fn is_expanded(&self, id: CommentId) -> bool {
        self.expanded.get(&id).copied().unwrap_or(false)
    }

    /// Flips one node's replies. Descendants keep their own state.
    pub fn toggle_expanded(&mut self, id: CommentId) -> bool {
        let entry = self.expanded.entry(id).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn set_expanded(&mut self, id: CommentId, expanded: bool) {
        self.expanded.insert(id, expanded);
    }

    /// Adds a freshly created comment: top level goes first among the roots,
    /// a reply goes last among its siblings and opens its parent.
    /// Returns `false` if the id is already present.
    pub fn insert(&mut self, comment: Comment) -> bool {
        if self.index.contains_key(&comment.id) {
            return false;
        }

        let key = self.resolve_parent(&comment);
        let slot = self.nodes.len();
        self.index.insert(comment.id, slot);
        self.nodes.push(comment);
        self.parents.push(key);

        let siblings = self.children.entry(key).or_default();
        match key {
            ParentKey::Root => siblings.insert(0, slot),
            ParentKey::Comment(parent) => {
                siblings.push(slot);
                self.expanded.insert(parent, true);
            }
        }
        true
    }

    /// The thread as it should be drawn, honouring expand state and the depth cap.
    pub fn visible_rows(&self) -> Vec<ThreadRow<'_>> {
        let mut rows = Vec::new();
        self.push_rows(ParentKey::Root, 0, &mut rows);
        rows
    }

    fn push_rows<'a>(&'a self, key: ParentKey, level: usize, rows: &mut Vec<ThreadRow<'a>>) {
        let Some(slots) = self.children.get(&key) else {
            return;
        };
        for &slot in slots {
            let comment = &self.nodes[slot];
            let expanded = self.is_expanded(comment.id);
            rows.push(ThreadRow {
                comment,
                level,
                can_reply: level <= MAX_REPLY_LEVEL,
                reply_count: self.reply_count(comment.id),
                expanded,
            });
            if expanded && level < MAX_RENDER_LEVEL {
                self.push_rows(ParentKey::Comment(comment.id), level + 1, rows);
            }
        }
    }
}

/// A comment ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub content: String,
    pub parent_id: Option<CommentId>,
}

/// Compose field plus the "replying to" indicator.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    text: String,
    replying_to: Option<CommentId>,
}

impl Composer {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn replying_to(&self) -> Option<CommentId> {
        self.replying_to
    }

    pub(crate) fn reply_to(&mut self, id: CommentId) {
        self.replying_to = Some(id);
    }

    pub fn cancel_reply(&mut self) {
        self.replying_to = None;
    }

    /// `None` for blank input.
    pub fn draft(&self) -> Option<CommentDraft> {
        let content = self.text.trim();
        if content.is_empty() {
            return None;
        }
        Some(CommentDraft {
            content: content.to_string(),
            parent_id: self.replying_to,
        })
    }

    fn clear(&mut self) {
        self.text.clear();
        self.replying_to = None;
    }
}

/// Comment sheet of one gallery item.
#[derive(Debug)]
pub struct CommentSection {
    gallery_id: GalleryId,
    thread: CommentThread,
    composer: Composer,
    submitting: bool,
}

impl CommentSection {
    pub fn new(gallery_id: GalleryId, comments: Vec<Comment>) -> Self {
        Self {
            gallery_id,
            thread: CommentThread::group(comments),
            composer: Composer::default(),
            submitting: false,
        }
    }

    pub fn gallery_id(&self) -> GalleryId {
        self.gallery_id
    }

    pub fn thread(&self) -> &CommentThread {
        &self.thread
    }

    pub fn thread_mut(&mut self) -> &mut CommentThread {
        &mut self.thread
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Offers "reply" only where the depth policy allows it.
    pub fn reply_to(&mut self, id: CommentId) -> bool {
        let allowed = self
            .thread
            .depth(id)
            .map_or(false, |level| level <= MAX_REPLY_LEVEL);
        if allowed {
            self.composer.reply_to(id);
        }
        allowed
    }

    /// Claims the submit slot. Blank input or a submit in flight yields `None`.
    pub fn begin_submit(&mut self) -> Option<CommentDraft> {
        if self.submitting {
            return None;
        }
        let draft = self.composer.draft()?;
        self.submitting = true;
        Some(draft)
    }

    /// Frees the submit slot of a send that will never complete. The composer
    /// keeps its text so the user can send again.
    pub fn abandon_submit(&mut self) {
        if self.submitting {
            debug!(gallery_id = %self.gallery_id, "comment submission abandoned");
            self.submitting = false;
        }
    }

    /// Rebuilds the thread from a refetched comment list. Expand state of
    /// comments that are still present survives, and a reply target that
    /// disappeared is dropped.
    pub fn reconcile(&mut self, comments: Vec<Comment>) {
        let previous = std::mem::replace(&mut self.thread, CommentThread::group(comments));
        for (id, expanded) in previous.expanded {
            if self.thread.index.contains_key(&id) {
                self.thread.expanded.insert(id, expanded);
            }
        }
        if let Some(target) = self.composer.replying_to {
            if self.thread.get(target).is_none() {
                self.composer.cancel_reply();
            }
        }
    }

    pub fn complete_submit(
        &mut self,
        result: Result<Comment, ApiError>,
    ) -> Result<CommentId, ApiError> {
        self.submitting = false;
        match result {
            Ok(created) => {
                let id = created.id;
                self.thread.insert(created);
                self.composer.clear();
                Ok(id)
            }
            Err(err) => {
                warn!(error = %err, gallery_id = %self.gallery_id, "failed to submit comment");
                Err(err)
            }
        }
    }

    /// Sends the composed text. Blank text is ignored silently (`Ok(None)`);
    /// on failure the text stays in the composer.
    pub async fn submit_comment(
        &mut self,
        api: &dyn GalleryApi,
    ) -> Result<Option<CommentId>, ApiError> {
        let Some(draft) = self.begin_submit() else {
            return Ok(None);
        };
        let gallery_id = self.gallery_id;
        let pending = PendingSubmit {
            section: self,
            armed: true,
        };
        let result = api
            .submit_comment(gallery_id, &draft.content, draft.parent_id)
            .await;
        pending.complete(result).map(Some)
    }
}

/// A claimed submit slot, released if dropped before completion.
struct PendingSubmit<'a> {
    section: &'a mut CommentSection,
    armed: bool,
}

impl PendingSubmit<'_> {
    fn complete(mut self, result: Result<Comment, ApiError>) -> Result<CommentId, ApiError> {
        self.armed = false;
        self.section.complete_submit(result)
    }
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.section.abandon_submit();
        }
    }
}
