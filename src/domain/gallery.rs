use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::engagement::{Comment, Like};
use crate::domain::media::Media;
use crate::domain::user::{User, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GalleryId(pub i64);

impl fmt::Display for GalleryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: GalleryId,
    pub caption: Option<String>,
    pub media: Vec<Media>,
    pub likes: Vec<Like>,
    /// Authoritative like count as reported by the server.
    pub likes_count: u32,
    pub comments: Vec<Comment>,
    pub owner: Option<User>,
    pub event_title: Option<String>,
}

impl GalleryItem {
    pub fn is_liked_by(&self, user_id: UserId) -> bool {
        self.likes.iter().any(|like| like.user_id == user_id)
    }
}

/// One page of the gallery listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub items: Vec<GalleryItem>,
    pub has_more: bool,
}

impl FeedPage {
    /// A page shorter than what was asked for marks the end of the data.
    pub fn from_items(items: Vec<GalleryItem>, requested: usize) -> Self {
        let has_more = items.len() >= requested;
        Self { items, has_more }
    }
}
