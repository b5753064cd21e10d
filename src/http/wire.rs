//! JSON shapes spoken by the gallery API and their validation into domain types.
//!
//! Every response is decoded into the structs below first, then checked and
//! converted. Nothing untyped leaves this module.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::engagement::{Comment, CommentId, Like};
use crate::domain::gallery::{FeedPage, GalleryId, GalleryItem};
use crate::domain::media::{Media, MediaId};
use crate::domain::user::{User, UserId};
use crate::http::ParseError;

/// Responses arrive either bare or wrapped in `{ "data": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(value) => value,
        }
    }
}

pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ParseError> {
    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    Ok(envelope.into_inner())
}

#[derive(Debug, Deserialize)]
pub struct GalleryPageWire {
    pub items: Vec<GalleryWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryWire {
    pub id: i64,
    pub caption: Option<String>,
    #[serde(default)]
    pub media: Option<Vec<MediaWire>>,
    #[serde(default)]
    pub likes: Option<Vec<LikeWire>>,
    #[serde(default, rename = "_count")]
    pub count: Option<CountWire>,
    #[serde(default)]
    pub comments: Option<Vec<CommentWire>>,
    #[serde(default)]
    pub user: Option<UserWire>,
    #[serde(default)]
    pub event: Option<EventWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaWire {
    pub id: i64,
    pub media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeWire {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CountWire {
    pub likes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct EventWire {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWire {
    pub id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
    pub user: Option<UserWire>,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWire {
    pub id: i64,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest<'a> {
    pub content: &'a str,
    pub parent_id: Option<i64>,
}

fn positive_id(entity: &'static str, value: i64) -> Result<i64, ParseError> {
    if value <= 0 {
        return Err(ParseError::InvalidId { entity, value });
    }
    Ok(value)
}

impl TryFrom<UserWire> for User {
    type Error = ParseError;

    fn try_from(wire: UserWire) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId(positive_id("user", wire.id)?),
            full_name: wire.full_name.unwrap_or_default(),
            email: wire.email,
            profile_picture: wire.profile_picture.filter(|url| !url.trim().is_empty()),
        })
    }
}

impl TryFrom<CommentWire> for Comment {
    type Error = ParseError;

    fn try_from(wire: CommentWire) -> Result<Self, Self::Error> {
        let id = CommentId(positive_id("comment", wire.id)?);
        let author = wire
            .user
            .ok_or(ParseError::MissingField("comment.user"))?
            .try_into()?;
        // 0 is the top-level sentinel; anything non-positive is treated the same.
        let parent_id = wire.parent_id.filter(|parent| *parent > 0).map(CommentId);
        let created_at = match wire.created_at {
            Some(raw) => Some(
                OffsetDateTime::parse(&raw, &Rfc3339)
                    .map_err(|_| ParseError::InvalidTimestamp(raw))?,
            ),
            None => None,
        };

        Ok(Self {
            id,
            content: wire.content,
            author,
            parent_id,
            created_at,
        })
    }
}

impl TryFrom<GalleryWire> for GalleryItem {
    type Error = ParseError;

    fn try_from(wire: GalleryWire) -> Result<Self, Self::Error> {
        let id = GalleryId(positive_id("gallery", wire.id)?);

        let mut media = Vec::new();
        for (position, slide) in wire.media.unwrap_or_default().into_iter().enumerate() {
            let media_id = positive_id("media", slide.id)?;
            let url = slide
                .media_url
                .filter(|url| !url.trim().is_empty())
                .ok_or(ParseError::EmptyMediaUrl(media_id))?;
            media.push(Media {
                id: MediaId(media_id),
                url,
                position,
            });
        }

        let likes = wire
            .likes
            .unwrap_or_default()
            .into_iter()
            .map(|like| {
                Ok(Like {
                    user_id: UserId(positive_id("user", like.user_id)?),
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        // The aggregate wins; the likes array may be filtered to the viewer.
        let likes_count = wire
            .count
            .and_then(|count| count.likes)
            .unwrap_or(likes.len() as u32);

        let comments = wire
            .comments
            .unwrap_or_default()
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let owner = wire.user.map(User::try_from).transpose()?;

        Ok(Self {
            id,
            caption: wire.caption,
            media,
            likes,
            likes_count,
            comments,
            owner,
            event_title: wire.event.and_then(|event| event.title),
        })
    }
}

pub fn parse_gallery_page(body: &[u8], requested: usize) -> Result<FeedPage, ParseError> {
    let page: GalleryPageWire = decode(body)?;
    let items = page
        .items
        .into_iter()
        .map(GalleryItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FeedPage::from_items(items, requested))
}

pub fn parse_gallery(body: &[u8]) -> Result<GalleryItem, ParseError> {
    let wire: GalleryWire = decode(body)?;
    wire.try_into()
}

pub fn parse_comment(body: &[u8]) -> Result<Comment, ParseError> {
    let wire: CommentWire = decode(body)?;
    wire.try_into()
}
